//! # Audio Module
//!
//! Per-guild queueing and playback.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue Store
//! - One [`queue::GuildQueue`] per guild with pending or active playback
//! - Atomic per-guild operations on a [`dashmap::DashMap`]
//! - A queue is deleted as soon as it runs dry
//!
//! ### [`player`] - Playback Driver
//! - Starts the head of a queue on an [`AudioSink`]
//! - Advances on track end or track error (both edges share one path)
//! - Drops failing tracks without retrying
//!
//! ### [`voice`] - Songbird backend
//! - [`AudioSink`] implementation joining voice channels through songbird
//! - yt-dlp and HTTP inputs
//!
//! The traits below are the seam between the driver and the voice backend, so
//! the driver can be exercised without a Discord gateway.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

use crate::{error::MusicError, sources::Track};

pub mod player;
pub mod queue;
pub mod voice;

#[cfg(test)]
pub mod testing;

pub use player::{AudioPlayer, TrackEndNotifier};

/// Opens voice connections.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Joins `channel_id` in `guild_id`.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, MusicError>;
}

/// An established voice connection for one guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Voice channel the connection was opened for.
    fn channel_id(&self) -> ChannelId;

    /// Starts streaming `track`. `on_end` must be notified when the stream
    /// ends, whether it finished, failed or was stopped.
    async fn open_stream(
        &self,
        track: &Track,
        on_end: TrackEndNotifier,
    ) -> Result<Arc<dyn PlayerHandle>, MusicError>;

    /// Leaves the voice channel.
    async fn release(&self);
}

/// Control over the stream of the current track.
pub trait PlayerHandle: Send + Sync {
    /// Stops the stream. The end notification still fires.
    fn stop(&self);
}
