use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{AudioSink, PlayerHandle, TrackEndNotifier, VoiceConnection};
use crate::{
    error::MusicError,
    sources::{SourceType, Track},
};

/// [`AudioSink`] backed by the songbird voice manager.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    ytdlp: &'static str,
}

impl SongbirdSink {
    /// `ytdlp` is the yt-dlp executable used to stream YouTube tracks.
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client, ytdlp: &'static str) -> Self {
        Self {
            manager,
            http,
            ytdlp,
        }
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, MusicError> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("❌ Could not join channel {} in guild {}: {}", channel_id, guild_id, e);
            MusicError::StreamUnavailable(format!("could not join the voice channel: {e}"))
        })?;

        {
            let mut call = call.lock().await;
            if let Err(e) = call.deafen(true).await {
                warn!("⚠️ Could not self-deafen in guild {}: {}", guild_id, e);
            }
        }

        info!("🔊 Joined channel {} in guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdConnection {
            manager: self.manager.clone(),
            http: self.http.clone(),
            ytdlp: self.ytdlp,
            guild_id,
            channel_id,
            call,
        }))
    }
}

struct SongbirdConnection {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    ytdlp: &'static str,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
}

impl SongbirdConnection {
    fn input_for(&self, track: &Track) -> Input {
        match track.source_type() {
            SourceType::YouTube => {
                YoutubeDl::new_ytdl_like(self.ytdlp, self.http.clone(), track.url().to_string())
                    .into()
            }
            SourceType::DirectUrl => HttpRequest::new(self.http.clone(), track.url().to_string()).into(),
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn open_stream(
        &self,
        track: &Track,
        on_end: TrackEndNotifier,
    ) -> Result<Arc<dyn PlayerHandle>, MusicError> {
        let input = self.input_for(track);

        let handle = {
            let mut call = self.call.lock().await;
            call.stop();
            call.play_input(input)
        };

        // Both edges share the same notifier; the driver ignores the second one.
        for event in [TrackEvent::End, TrackEvent::Error] {
            let handler = TrackEndHandler {
                notifier: on_end.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), handler) {
                let _ = handle.stop();
                return Err(MusicError::StreamUnavailable(e.to_string()));
            }
        }

        debug!("Streaming {} from {}", track.title(), track.url());
        Ok(Arc::new(SongbirdPlayer(handle)))
    }

    async fn release(&self) {
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("👋 Left voice in guild {}", self.guild_id),
            Err(e) => debug!("Voice connection of guild {} already gone: {}", self.guild_id, e),
        }
    }
}

struct SongbirdPlayer(TrackHandle);

impl PlayerHandle for SongbirdPlayer {
    fn stop(&self) {
        if let Err(e) = self.0.stop() {
            debug!("Track already finished: {}", e);
        }
    }
}

/// Forwards songbird track end and track error events to the driver.
struct TrackEndHandler {
    notifier: TrackEndNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                debug!(
                    "Track {} in guild {} ended: {:?}",
                    self.notifier.entry(),
                    self.notifier.guild_id(),
                    state.playing
                );
            }
        }

        self.notifier.notify().await;

        None
    }
}
