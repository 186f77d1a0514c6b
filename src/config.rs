use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Registers commands on a single guild when set

    // Spotify (optional, Spotify links are rejected without them)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Resolution
    pub ytdlp_path: String,
    pub resolve_timeout_secs: u64,

    // Display
    pub queue_display_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID is not set")?
                .parse()
                .context("APPLICATION_ID must be a number")?,
            guild_id: optional_var("GUILD_ID")
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("GUILD_ID must be a number")?,

            spotify_client_id: optional_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: optional_var("SPOTIFY_CLIENT_SECRET"),

            ytdlp_path: optional_var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            resolve_timeout_secs: match optional_var("RESOLVE_TIMEOUT_SECS") {
                Some(val) => val.parse().context("RESOLVE_TIMEOUT_SECS must be a number")?,
                None => defaults.resolve_timeout_secs,
            },

            queue_display_limit: match optional_var("QUEUE_DISPLAY_LIMIT") {
                Some(val) => val.parse().context("QUEUE_DISPLAY_LIMIT must be a number")?,
                None => defaults.queue_display_limit,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must not be empty
    /// - Discord ids must be non-zero
    /// - The resolve timeout must be between 1 and 300 seconds
    /// - The queue display limit must be between 1 and 50 (embed size limit)
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.application_id == 0 || self.guild_id == Some(0) {
            anyhow::bail!("APPLICATION_ID and GUILD_ID must be non-zero Discord ids");
        }

        if self.resolve_timeout_secs == 0 || self.resolve_timeout_secs > 300 {
            anyhow::bail!(
                "Resolve timeout must be between 1 and 300 seconds, got: {}",
                self.resolve_timeout_secs
            );
        }

        if self.queue_display_limit == 0 || self.queue_display_limit > 50 {
            anyhow::bail!(
                "Queue display limit must be between 1 and 50, got: {}",
                self.queue_display_limit
            );
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging, without
    /// tokens or secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Spotify: {}\n  \
            Resolve: {} with {}s timeout\n  \
            Queue display: {} tracks",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            if self.spotify_client_id.is_some() { "enabled" } else { "disabled" },
            self.ytdlp_path,
            self.resolve_timeout_secs,
            self.queue_display_limit,
        )
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|val| !val.trim().is_empty())
}

/// Fallbacks used when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            spotify_client_id: None,
            spotify_client_secret: None,

            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout_secs: 30,

            queue_display_limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            application_id: 42,
            ..Config::default()
        }
    }

    #[test]
    fn default_values_are_valid_once_token_is_set() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = valid();
        config.resolve_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.queue_display_limit = 51;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.guild_id = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn spotify_credentials_come_in_pairs() {
        let mut config = valid();
        config.spotify_client_id = Some("id".to_string());
        assert!(config.validate().is_err());

        config.spotify_client_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn summary_hides_secrets() {
        let mut config = valid();
        config.spotify_client_id = Some("id".to_string());
        config.spotify_client_secret = Some("very-secret".to_string());

        let summary = config.summary();
        assert!(!summary.contains("token"));
        assert!(!summary.contains("very-secret"));
        assert!(summary.contains("Spotify: enabled"));
    }
}
