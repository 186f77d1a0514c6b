use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::sources::Track;

/// Standard colour palette for the bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 tunequeue";

pub fn track_added_message(track: &Track) -> String {
    format!("✅ **{}** added to queue", track.title())
}

/// Reply to a successful `/play`.
pub fn track_added_embed(track: &Track) -> CreateEmbed {
    let duration = match track.duration() {
        Some(duration) => format_duration(duration),
        None => "🔴 Live".to_string(),
    };

    let mut embed = CreateEmbed::default()
        .description(track_added_message(track))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duration", duration, true)
        .field("👤 Requested by", format!("<@{}>", track.requested_by()), true)
        .field("🔗 Source", track.source_type().as_str(), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if track.url().starts_with("http") {
        embed = embed.url(track.url());
    }

    embed
}

/// Reply to `/queue`. `tracks` is the whole queue, head first.
pub fn queue_embed(tracks: &[Track], limit: usize) -> CreateEmbed {
    let count = match tracks.len() {
        1 => "1 track in queue".to_string(),
        n => format!("{n} tracks in queue"),
    };

    CreateEmbed::default()
        .title("📋 Queue")
        .description(format_queue_listing(tracks, limit))
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!("{count} • {STANDARD_FOOTER}")))
}

/// Plain status reply (skip, stop).
pub fn success_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

pub fn error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(description)
        .color(colors::ERROR_RED)
}

/// Informational reply for outcomes that are not failures, like an empty queue.
pub fn info_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(description)
        .color(colors::NEUTRAL_GRAY)
}

/// Head is labelled as now playing, the rest are numbered from 1.
/// At most `limit` lines are listed, followed by a line counting the rest.
pub fn format_queue_listing(tracks: &[Track], limit: usize) -> String {
    let mut lines: Vec<String> = tracks
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, track)| {
            let duration = track
                .duration()
                .map(|d| format!(" `[{}]`", format_duration(d)))
                .unwrap_or_default();

            if i == 0 {
                format!("**Now playing:** {}{}", track.title(), duration)
            } else {
                format!("**{}.** {}{}", i, track.title(), duration)
            }
        })
        .collect();

    if tracks.len() > limit {
        lines.push(format!("...and {} more", tracks.len() - limit));
    }

    lines.join("\n")
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
