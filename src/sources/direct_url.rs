use url::Url;

use super::{ResolvedTrack, SourceType};
use crate::error::MusicError;

const AUDIO_EXTENSIONS: [&str; 7] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus", ".aac"];

/// Client for plain links to audio files, streamed over HTTP without yt-dlp.
pub struct DirectUrlClient {}

impl DirectUrlClient {
    pub fn new() -> Self {
        Self {}
    }

    /// True for http(s) links whose path ends with a known audio extension.
    pub fn is_valid_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        let path = parsed.path().to_lowercase();
        AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }

    /// Builds a track from the link alone; the title is the decoded file name.
    pub fn get_track(&self, url: &str) -> Result<ResolvedTrack, MusicError> {
        let parsed =
            Url::parse(url).map_err(|e| MusicError::InvalidSourceReference(format!("{url}: {e}")))?;

        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| MusicError::InvalidSourceReference(url.to_string()))?;

        let title = urlencoding::decode(file_name)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| file_name.to_string());

        Ok(ResolvedTrack::new(title, url, SourceType::DirectUrl))
    }
}

impl Default for DirectUrlClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_audio_file_links() {
        let client = DirectUrlClient::new();

        assert!(client.is_valid_url("https://cdn.example.com/music/song.mp3"));
        assert!(client.is_valid_url("http://example.com/a/B.FLAC?token=1"));
        assert!(!client.is_valid_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!client.is_valid_url("file:///home/me/song.mp3"));
        assert!(!client.is_valid_url("song.mp3"));
    }

    #[test]
    fn title_is_decoded_file_name() {
        let client = DirectUrlClient::new();
        let track = client
            .get_track("https://cdn.example.com/music/My%20Song.ogg")
            .unwrap();

        assert_eq!(track.title, "My Song.ogg");
        assert_eq!(track.url, "https://cdn.example.com/music/My%20Song.ogg");
        assert_eq!(track.source_type, SourceType::DirectUrl);
        assert_eq!(track.duration, None);
    }
}
