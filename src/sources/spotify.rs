use parking_lot::Mutex;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::error::MusicError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";
/// Tokens are refreshed this long before Spotify says they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

static SPOTIFY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?:open|play)\.spotify\.com/(?:intl-[a-zA-Z-]+/)?|^spotify:)(track|album|playlist)[/:]([a-zA-Z0-9]+)",
    )
    .expect("valid Spotify regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
}

/// Spotify Web API client using the client-credentials flow.
///
/// Spotify has no playable audio for bots, so a link is only used to build a
/// "name artist" query that is then searched on YouTube. Albums and
/// playlists contribute their first track.
pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct AlbumTracks {
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracks {
    items: Vec<PlaylistItem>,
}

impl SpotifyTrack {
    fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist.name),
            None => self.name.clone(),
        }
    }
}

impl SpotifyClient {
    pub fn new(
        http: reqwest::Client,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        let credentials = match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        };

        if credentials.is_none() {
            warn!("⚠️ Spotify credentials missing, Spotify links will be rejected");
        }

        Self {
            http,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Any spotify.com link or `spotify:` URI. Unsupported kinds are
    /// rejected later by [`SpotifyClient::parse_url`].
    pub fn is_spotify_url(url: &str) -> bool {
        url.contains("spotify.com") || url.starts_with("spotify:")
    }

    /// Extracts the kind and id from a Spotify link or `spotify:kind:id` URI,
    /// ignoring query strings and localized `intl-xx` path prefixes.
    pub fn parse_url(url: &str) -> Option<(SpotifyKind, String)> {
        let clean = url.split('?').next().unwrap_or(url);
        let captures = SPOTIFY_URL.captures(clean)?;

        let kind = match &captures[1] {
            "track" => SpotifyKind::Track,
            "album" => SpotifyKind::Album,
            "playlist" => SpotifyKind::Playlist,
            _ => return None,
        };

        Some((kind, captures[2].to_string()))
    }

    /// Turns a Spotify link into a YouTube search query.
    pub async fn search_query(&self, url: &str) -> Result<String, MusicError> {
        let (kind, id) = Self::parse_url(url)
            .ok_or_else(|| MusicError::InvalidSourceReference(url.to_string()))?;

        let token = self.access_token().await?;

        let track = match kind {
            SpotifyKind::Track => {
                self.get::<SpotifyTrack>(&token, &format!("{API_URL}/tracks/{id}"))
                    .await?
            }
            SpotifyKind::Album => self
                .get::<AlbumTracks>(&token, &format!("{API_URL}/albums/{id}/tracks?limit=1"))
                .await?
                .items
                .into_iter()
                .next()
                .ok_or_else(|| MusicError::NoResultsFound(url.to_string()))?,
            SpotifyKind::Playlist => self
                .get::<PlaylistTracks>(&token, &format!("{API_URL}/playlists/{id}/tracks?limit=5"))
                .await?
                .items
                .into_iter()
                .find_map(|item| item.track)
                .ok_or_else(|| MusicError::NoResultsFound(url.to_string()))?,
        };

        Ok(track.search_query())
    }

    async fn access_token(&self) -> Result<String, MusicError> {
        let (client_id, client_secret) = self.credentials.as_ref().ok_or(MusicError::AuthRequired)?;

        let cached = self.token.lock().clone();
        if let Some(cached) = cached {
            if Instant::now() + TOKEN_REFRESH_MARGIN < cached.expires_at {
                return Ok(cached.access_token);
            }
        }

        debug!("Requesting a new Spotify access token");
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| MusicError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            warn!("Spotify token request failed: {}", response.status());
            return Err(MusicError::AuthRequired);
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| MusicError::Unknown(e.to_string()))?;

        *self.token.lock() = Some(CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        info!("✅ Spotify token refreshed");

        Ok(body.access_token)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
    ) -> Result<T, MusicError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MusicError::Unknown(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| MusicError::Unknown(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.token.lock().take();
                Err(MusicError::AuthRequired)
            }
            StatusCode::NOT_FOUND => Err(MusicError::NoResultsFound(url.to_string())),
            StatusCode::BAD_REQUEST => Err(MusicError::InvalidSourceReference(url.to_string())),
            status => Err(MusicError::Unknown(format!("Spotify API returned {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_spotify_links() {
        assert_eq!(
            SpotifyClient::parse_url("https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh"),
            Some((SpotifyKind::Track, "4iV5W9uYEdYUVa79Axb7Rh".to_string()))
        );
        assert_eq!(
            SpotifyClient::parse_url(
                "https://open.spotify.com/intl-fr/track/0eaVIYo2zeOaGJeqZ5TwYz?si=9036d71b44164db2"
            ),
            Some((SpotifyKind::Track, "0eaVIYo2zeOaGJeqZ5TwYz".to_string()))
        );
        assert_eq!(
            SpotifyClient::parse_url("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3"),
            Some((SpotifyKind::Album, "1DFixLWuPkv3KT3TnV35m3".to_string()))
        );
        assert_eq!(
            SpotifyClient::parse_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some((SpotifyKind::Playlist, "37i9dQZF1DXcBWIGoYBM5M".to_string()))
        );
        assert_eq!(
            SpotifyClient::parse_url("spotify:track:4iV5W9uYEdYUVa79Axb7Rh"),
            Some((SpotifyKind::Track, "4iV5W9uYEdYUVa79Axb7Rh".to_string()))
        );
        assert_eq!(
            SpotifyClient::parse_url("https://play.spotify.com/album/1DFixLWuPkv3KT3TnV35m3"),
            Some((SpotifyKind::Album, "1DFixLWuPkv3KT3TnV35m3".to_string()))
        );
        assert_eq!(SpotifyClient::parse_url("https://open.spotify.com/artist/abc"), None);
        assert_eq!(SpotifyClient::parse_url("spotify:artist:abc"), None);
        assert_eq!(SpotifyClient::parse_url("https://example.com/track/abc"), None);
    }

    #[test]
    fn detects_spotify_links_and_uris() {
        assert!(SpotifyClient::is_spotify_url("https://open.spotify.com/track/abc"));
        assert!(SpotifyClient::is_spotify_url("https://play.spotify.com/track/abc"));
        assert!(SpotifyClient::is_spotify_url("spotify:track:abc"));
        assert!(!SpotifyClient::is_spotify_url("https://www.youtube.com/watch?v=abc"));
        assert!(!SpotifyClient::is_spotify_url("spotify greatest hits"));
    }

    #[test]
    fn query_uses_first_artist() {
        let track: SpotifyTrack = serde_json::from_str(
            r#"{"name":"Get Lucky","artists":[{"name":"Daft Punk"},{"name":"Pharrell Williams"}]}"#,
        )
        .unwrap();

        assert_eq!(track.search_query(), "Get Lucky Daft Punk");
    }

    #[tokio::test]
    async fn missing_credentials_require_auth() {
        let client = SpotifyClient::new(reqwest::Client::new(), None, Some("secret".to_string()));

        let err = client
            .search_query("https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh")
            .await
            .unwrap_err();
        assert_eq!(err, MusicError::AuthRequired);
    }

    #[tokio::test]
    async fn malformed_link_is_rejected_before_any_request() {
        let client = SpotifyClient::new(reqwest::Client::new(), None, None);

        let err = client
            .search_query("https://open.spotify.com/show/xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, MusicError::InvalidSourceReference(_)));
    }
}
