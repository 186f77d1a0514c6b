use async_process::Command;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ResolvedTrack, SourceType};
use crate::error::MusicError;

/// Client for YouTube (and every other extractor yt-dlp knows).
pub struct YouTubeClient {
    ytdlp_path: String,
    // Keeps concurrent yt-dlp processes bounded
    rate_limiter: tokio::sync::Semaphore,
}

/// Subset of the `--dump-json` output we care about
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    is_live: Option<bool>,
}

impl YouTubeClient {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    /// Resolves a link through yt-dlp.
    pub async fn get_track(&self, url: &str) -> Result<ResolvedTrack, MusicError> {
        debug!("📊 Fetching info for: {}", url);

        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", url])
            .await?;

        let info = stdout
            .lines()
            .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
            .ok_or_else(|| MusicError::Unknown(format!("unreadable yt-dlp output for {url}")))?;

        info_to_track(info, Some(url))
    }

    /// Returns the best match for a free-text search.
    pub async fn search_first(&self, query: &str) -> Result<ResolvedTrack, MusicError> {
        info!("🔍 Searching YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);
        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", &search_query])
            .await?;

        let info = stdout
            .lines()
            .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
            .ok_or_else(|| MusicError::NoResultsFound(query.to_string()))?;

        info_to_track(info, None)
    }

    /// Checks that yt-dlp can be executed.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.ytdlp_path).arg("--version").output().await?;

        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.ytdlp_path, output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<String, MusicError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| MusicError::Unknown(e.to_string()))?;

        let output = Command::new(&self.ytdlp_path)
            .args(args)
            .output()
            .await
            .map_err(|e| MusicError::Unknown(format!("failed to run {}: {}", self.ytdlp_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp error: {}", stderr.trim());
            return Err(MusicError::classify(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn info_to_track(info: YtDlpInfo, requested_url: Option<&str>) -> Result<ResolvedTrack, MusicError> {
    let live = info.is_live.unwrap_or(false);
    if live {
        debug!("Resolved a live stream, duration left empty");
    }

    let url = info
        .webpage_url
        .or(info.original_url)
        .or_else(|| {
            info.id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/watch?v={}", id))
        })
        .or_else(|| requested_url.map(str::to_string))
        .ok_or_else(|| MusicError::Unknown("yt-dlp returned no url".to_string()))?;

    let title = info.title.unwrap_or_else(|| url.clone());

    let mut track = ResolvedTrack::new(title, url, SourceType::YouTube);
    if let Some(seconds) = info.duration.filter(|d| !live && d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(seconds));
    }

    Ok(track)
}
