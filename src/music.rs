use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    audio::{player::Enqueued, AudioPlayer},
    error::MusicError,
    sources::{Track, TrackResolver},
};

/// Who issued a command and where they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// Voice channel the caller is connected to, if any
    pub voice_channel_id: Option<ChannelId>,
}

/// Command layer between Discord interactions and the playback driver.
pub struct MusicController {
    resolver: Arc<dyn TrackResolver>,
    player: Arc<AudioPlayer>,
}

impl MusicController {
    pub fn new(resolver: Arc<dyn TrackResolver>, player: Arc<AudioPlayer>) -> Self {
        Self { resolver, player }
    }

    /// Resolves `query` and appends it to the caller's guild queue,
    /// starting playback when the queue was empty.
    pub async fn play(&self, caller: &Caller, query: &str) -> Result<Track, MusicError> {
        let channel_id = caller.voice_channel_id.ok_or(MusicError::NotInVoiceChannel)?;

        debug!("Resolving '{}' for user {} in guild {}", query, caller.user_id, caller.guild_id);
        let resolved = self.resolver.resolve(query).await?;

        let track = Track::new(resolved, caller.guild_id, channel_id, caller.user_id);
        match self.player.enqueue(track.clone()).await? {
            Enqueued::Started => info!("▶️ {} started in guild {}", track.title(), caller.guild_id),
            Enqueued::Queued { position } => {
                debug!("{} waits at position {} in guild {}", track.title(), position, caller.guild_id)
            }
        }

        Ok(track)
    }

    /// Tracks of a guild in play order, head first.
    pub fn queue(&self, guild_id: GuildId) -> Result<Vec<Track>, MusicError> {
        self.player.tracks(guild_id).ok_or(MusicError::QueueEmpty)
    }

    pub fn skip(&self, caller: &Caller) -> Result<(), MusicError> {
        self.require_queue(caller)?;
        self.player.skip(caller.guild_id)
    }

    pub async fn stop(&self, caller: &Caller) -> Result<usize, MusicError> {
        self.require_queue(caller)?;
        self.player.stop(caller.guild_id).await
    }

    /// Hard reset after the bot lost its voice connection in a guild.
    ///
    /// `current_channel` is the channel the voice backend is still bound to.
    /// When it is set, the event is the late echo of a leave the bot made
    /// itself and a newer session owns the guild, so nothing is reset.
    pub async fn disconnect(&self, guild_id: GuildId, current_channel: Option<ChannelId>) {
        if let Some(channel_id) = current_channel {
            debug!("Guild {} is still bound to channel {}, keeping its queue", guild_id, channel_id);
            return;
        }

        if let Ok(cleared) = self.player.stop(guild_id).await {
            info!("🔌 Voice connection lost in guild {}, {} tracks cleared", guild_id, cleared);
        }
    }

    /// A queue must exist before the caller's voice channel is looked at.
    fn require_queue(&self, caller: &Caller) -> Result<(), MusicError> {
        if !self.player.store().exists(caller.guild_id) {
            return Err(MusicError::NothingPlaying);
        }
        if caller.voice_channel_id.is_none() {
            return Err(MusicError::NotInVoiceChannel);
        }
        Ok(())
    }
}
