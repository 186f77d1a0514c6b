//! Error types for queueing and playback.

use thiserror::Error;

/// Errors surfaced by the music commands.
///
/// The first group classifies why a track could not be resolved or streamed;
/// the last three are command outcomes that are reported to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MusicError {
    /// The caller is not connected to a voice channel
    #[error("caller is not in a voice channel")]
    NotInVoiceChannel,

    /// The link is malformed or not supported by any source
    #[error("invalid source reference: {0}")]
    InvalidSourceReference(String),

    /// The search or the playlist returned nothing playable
    #[error("no results found for: {0}")]
    NoResultsFound(String),

    #[error("track is private or unavailable")]
    PrivateOrUnavailable,

    #[error("track is age restricted")]
    AgeRestricted,

    #[error("track is not available in this region")]
    RegionRestricted,

    /// The upstream provider wants credentials we do not have
    #[error("authentication required by the source")]
    AuthRequired,

    /// The audio stream for a resolved track could not be opened
    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("unknown error: {0}")]
    Unknown(String),

    /// No queue exists for the guild
    #[error("nothing is playing")]
    NothingPlaying,

    /// Skip was requested on the last track of the queue
    #[error("no next track in the queue")]
    NoNextTrack,

    #[error("the queue is empty")]
    QueueEmpty,
}

impl MusicError {
    /// Maps the error text of a source (yt-dlp stderr, HTTP error bodies) to
    /// a variant of the taxonomy.
    ///
    /// Age checks run before the generic sign-in check because yt-dlp words
    /// both as "Sign in to confirm ...".
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("age restricted")
            || lower.contains("age-restricted")
            || lower.contains("confirm your age")
            || lower.contains("inappropriate for some users")
        {
            MusicError::AgeRestricted
        } else if lower.contains("region restricted")
            || lower.contains("available in your country")
            || lower.contains("geo restriction")
            || lower.contains("geo-restricted")
            || lower.contains("blocked it in your country")
        {
            MusicError::RegionRestricted
        } else if lower.contains("private video")
            || lower.contains("video unavailable")
            || lower.contains("this video is unavailable")
            || lower.contains("has been removed")
            || lower.contains("members-only")
        {
            MusicError::PrivateOrUnavailable
        } else if lower.contains("sign in")
            || lower.contains("login required")
            || lower.contains("use --cookies")
            || lower.contains("unauthorized")
            || lower.contains("http error 401")
            || lower.contains("http error 403")
        {
            MusicError::AuthRequired
        } else if lower.contains("unsupported url")
            || lower.contains("is not a valid url")
            || lower.contains("invalid url")
        {
            MusicError::InvalidSourceReference(first_line(message))
        } else if lower.contains("no video results")
            || lower.contains("no results")
            || lower.contains("http error 404")
        {
            MusicError::NoResultsFound(first_line(message))
        } else {
            MusicError::Unknown(first_line(message))
        }
    }

    /// Reply shown to the user who ran the command.
    pub fn user_message(&self) -> String {
        match self {
            MusicError::NotInVoiceChannel => {
                "❌ You must be in a voice channel to use this command.".to_string()
            }
            MusicError::InvalidSourceReference(_) => {
                "❌ That link is invalid or not supported.".to_string()
            }
            MusicError::NoResultsFound(_) => "❌ No track found for that query.".to_string(),
            MusicError::PrivateOrUnavailable => {
                "❌ This track is private or unavailable.".to_string()
            }
            MusicError::AgeRestricted => "❌ This track is age restricted.".to_string(),
            MusicError::RegionRestricted => {
                "❌ This track is not available in this region.".to_string()
            }
            MusicError::AuthRequired => {
                "❌ The source requires authentication for this track.".to_string()
            }
            MusicError::StreamUnavailable(_) => {
                "❌ The audio stream for this track could not be opened.".to_string()
            }
            MusicError::Unknown(_) => {
                "❌ Something went wrong while playing this track.".to_string()
            }
            MusicError::NothingPlaying => "❌ Nothing is playing right now.".to_string(),
            MusicError::NoNextTrack => "🎵 There is no next track in the queue.".to_string(),
            MusicError::QueueEmpty => "❌ The queue is empty.".to_string(),
        }
    }
}

fn first_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_ytdlp_messages() {
        assert_eq!(
            MusicError::classify("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            MusicError::PrivateOrUnavailable
        );
        assert_eq!(
            MusicError::classify("ERROR: [youtube] abc: Sign in to confirm your age. This video may be inappropriate for some users."),
            MusicError::AgeRestricted
        );
        assert_eq!(
            MusicError::classify("ERROR: [youtube] abc: The uploader has not made this video available in your country"),
            MusicError::RegionRestricted
        );
        assert_eq!(
            MusicError::classify("ERROR: [youtube] abc: Video unavailable. This video is not available in your country"),
            MusicError::RegionRestricted
        );
        assert_eq!(
            MusicError::classify("ERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies-from-browser"),
            MusicError::AuthRequired
        );
        assert_eq!(
            MusicError::classify("ERROR: Unsupported URL: https://example.com/page"),
            MusicError::InvalidSourceReference("ERROR: Unsupported URL: https://example.com/page".to_string())
        );
    }

    #[test]
    fn unknown_keeps_first_non_empty_line() {
        assert_eq!(
            MusicError::classify("\n  boom  \nsecond line"),
            MusicError::Unknown("boom".to_string())
        );
    }

    #[test]
    fn command_outcomes_have_replies() {
        assert_eq!(MusicError::NothingPlaying.user_message(), "❌ Nothing is playing right now.");
        assert_eq!(MusicError::NoNextTrack.user_message(), "🎵 There is no next track in the queue.");
        assert_eq!(MusicError::QueueEmpty.user_message(), "❌ The queue is empty.");
    }
}
