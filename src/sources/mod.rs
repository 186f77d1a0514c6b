pub mod direct_url;
pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use direct_url::DirectUrlClient;
pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

use crate::{config::Config, error::MusicError};

/// Resolves user input (a link or free text) into a playable track.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, MusicError>;
}

/// Where the playable reference of a track points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Anything yt-dlp can stream (YouTube and the other extractors)
    YouTube,
    /// A plain HTTP link to an audio file
    DirectUrl,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::YouTube => "youtube",
            SourceType::DirectUrl => "direct",
        }
    }
}

/// Result of a successful resolution, not yet bound to a guild.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub source_type: SourceType,
}

impl ResolvedTrack {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration: None,
            source_type,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A queued track. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    url: String,
    source_type: SourceType,
    duration: Option<Duration>,
    guild_id: GuildId,
    voice_channel_id: ChannelId,
    requested_by: UserId,
}

impl Track {
    pub fn new(
        resolved: ResolvedTrack,
        guild_id: GuildId,
        voice_channel_id: ChannelId,
        requested_by: UserId,
    ) -> Self {
        Self {
            title: resolved.title,
            url: resolved.url,
            source_type: resolved.source_type,
            duration: resolved.duration,
            guild_id,
            voice_channel_id,
            requested_by,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }
    pub fn voice_channel_id(&self) -> ChannelId {
        self.voice_channel_id
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
}

/// Entry point for track resolution across all sources.
///
/// Dispatch order:
/// 1. Spotify links are turned into a search query and searched on YouTube
/// 2. Links to audio files are played directly over HTTP
/// 3. Any other link goes through yt-dlp
/// 4. Free text is searched on YouTube
pub struct SourceManager {
    youtube: YouTubeClient,
    spotify: SpotifyClient,
    direct_url: DirectUrlClient,
    timeout: Duration,
}

impl SourceManager {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            youtube: YouTubeClient::new(config.ytdlp_path.clone()),
            spotify: SpotifyClient::new(
                http,
                config.spotify_client_id.clone(),
                config.spotify_client_secret.clone(),
            ),
            direct_url: DirectUrlClient::new(),
            timeout: Duration::from_secs(config.resolve_timeout_secs),
        }
    }

    async fn resolve_inner(&self, query: &str) -> Result<ResolvedTrack, MusicError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::NoResultsFound(String::new()));
        }

        if SpotifyClient::is_spotify_url(query) {
            let search = self.spotify.search_query(query).await?;
            info!("🟢 Spotify link mapped to search: {}", search);
            return self.youtube.search_first(&search).await;
        }

        if is_link(query) {
            if self.direct_url.is_valid_url(query) {
                return self.direct_url.get_track(query);
            }
            return self.youtube.get_track(query).await;
        }

        self.youtube.search_first(query).await
    }
}

#[async_trait]
impl TrackResolver for SourceManager {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, MusicError> {
        debug!("Resolving query: {}", query);

        match tokio::time::timeout(self.timeout, self.resolve_inner(query)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ Resolution timed out after {:?}: {}", self.timeout, query);
                Err(MusicError::Unknown(format!(
                    "resolution timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

fn is_link(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}
