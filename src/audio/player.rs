use serenity::model::id::GuildId;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

use super::{
    queue::{Advance, Attach, EntryId, QueueEntry, QueueStore},
    AudioSink,
};
use crate::{error::MusicError, sources::Track};

/// What happened to a freshly enqueued track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The queue was empty and the track started playing
    Started,
    /// The track waits behind `position` other tracks
    Queued { position: usize },
}

/// Playback driver: owns the queue store and moves each guild between
/// Idle, Playing and Advancing.
///
/// - Idle: no queue in the store
/// - Playing: the head entry has a player attached
/// - Advancing: the head just ended, [`AudioPlayer::advance`] pops it and
///   either starts the next entry or deletes the queue
pub struct AudioPlayer {
    store: QueueStore,
    sink: Arc<dyn AudioSink>,
    me: Weak<AudioPlayer>,
}

impl AudioPlayer {
    pub fn new(sink: Arc<dyn AudioSink>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            store: QueueStore::new(),
            sink,
            me: me.clone(),
        })
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    /// Appends a track and starts it if the queue was empty.
    ///
    /// A track that fails to start is dropped through the regular advance
    /// path before the error is returned, so the queue is never left stuck.
    pub async fn enqueue(&self, track: Track) -> Result<Enqueued, MusicError> {
        let guild_id = track.guild_id();
        let (entry, len) = self.store.push(track);

        if len > 1 {
            return Ok(Enqueued::Queued { position: len - 1 });
        }

        match self.start(guild_id, &entry).await {
            Ok(()) => Ok(Enqueued::Started),
            Err(e) => {
                warn!("⚠️ Could not start {} in guild {}: {}", entry.track.title(), guild_id, e);
                self.advance(guild_id, entry.id).await;
                Err(e)
            }
        }
    }

    /// Stops the current track so the queue moves on to the next one.
    ///
    /// The queue itself is only touched by the end notification of the
    /// stopped track.
    pub fn skip(&self, guild_id: GuildId) -> Result<(), MusicError> {
        match self.store.len(guild_id) {
            0 => return Err(MusicError::NothingPlaying),
            1 => return Err(MusicError::NoNextTrack),
            _ => {}
        }

        let player = self.store.player(guild_id).ok_or(MusicError::NothingPlaying)?;
        player.stop();

        info!("⏭️ Skipped current track in guild {}", guild_id);
        Ok(())
    }

    /// Hard reset: deletes the queue, then stops the player and leaves the
    /// voice channel. Returns how many tracks were dropped.
    pub async fn stop(&self, guild_id: GuildId) -> Result<usize, MusicError> {
        let queue = self.store.delete(guild_id).ok_or(MusicError::NothingPlaying)?;

        if let Some(player) = &queue.player {
            player.stop();
        }
        if let Some(connection) = &queue.connection {
            connection.release().await;
        }

        info!("⏹️ Playback stopped in guild {}, {} tracks cleared", guild_id, queue.len());
        Ok(queue.len())
    }

    pub fn tracks(&self, guild_id: GuildId) -> Option<Vec<Track>> {
        self.store.tracks(guild_id)
    }

    /// Advancing state: pops `finished` and starts whatever comes next.
    ///
    /// Start failures pop the failed entry and keep looping, so a run of bad
    /// tracks is skipped iteratively until one plays or the queue is empty.
    async fn advance(&self, guild_id: GuildId, finished: EntryId) {
        let mut step = self.store.advance(guild_id, finished);

        loop {
            match step {
                Advance::Next(entry) => match self.start(guild_id, &entry).await {
                    Ok(()) => return,
                    Err(e) => {
                        warn!("⚠️ Dropping {} in guild {}: {}", entry.track.title(), guild_id, e);
                        step = self.store.advance(guild_id, entry.id);
                    }
                },
                Advance::Idle(connection) => {
                    if let Some(connection) = connection {
                        connection.release().await;
                    }
                    info!("💤 Guild {} is idle", guild_id);
                    return;
                }
                Advance::Stale => return,
            }
        }
    }

    /// Idle/Advancing to Playing: binds the guild's connection to the track's
    /// voice channel and starts streaming the entry.
    ///
    /// A connection already bound to that channel is reused; otherwise the
    /// sink joins the channel, which moves an existing call.
    async fn start(&self, guild_id: GuildId, entry: &QueueEntry) -> Result<(), MusicError> {
        let channel_id = entry.track.voice_channel_id();

        let connection = match self.store.connection(guild_id) {
            Some(connection) if connection.channel_id() == channel_id => connection,
            current => {
                if let Some(current) = current {
                    debug!(
                        "Moving guild {} from channel {} to {}",
                        guild_id,
                        current.channel_id(),
                        channel_id
                    );
                }

                let connection = self.sink.connect(guild_id, channel_id).await?;

                if !self.store.attach_connection(guild_id, connection.clone()) {
                    debug!("Queue of guild {} stopped while joining", guild_id);
                    connection.release().await;
                    return Ok(());
                }
                connection
            }
        };

        let notifier = TrackEndNotifier {
            player: self.me.clone(),
            guild_id,
            entry: entry.id,
        };
        let player = connection.open_stream(&entry.track, notifier).await?;

        match self.store.attach_player(guild_id, entry.id, player.clone()) {
            Attach::Attached => {
                info!("🎵 Playing {} {} in guild {}", entry.id, entry.track.title(), guild_id);
            }
            Attach::QueueGone => {
                // the stop that deleted the queue already released the connection
                debug!("Queue of guild {} stopped while starting {}", guild_id, entry.id);
                player.stop();
            }
            Attach::NotHead => {
                debug!("Entry {} ended before it was attached in guild {}", entry.id, guild_id);
                player.stop();
            }
        }

        Ok(())
    }
}

/// Completion callback handed to the voice backend with every stream.
///
/// Track end and track error both call [`TrackEndNotifier::notify`]; the
/// entry id makes repeated notifications for one stream harmless.
#[derive(Clone)]
pub struct TrackEndNotifier {
    player: Weak<AudioPlayer>,
    guild_id: GuildId,
    entry: EntryId,
}

impl TrackEndNotifier {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }

    pub async fn notify(&self) {
        match self.player.upgrade() {
            Some(player) => player.advance(self.guild_id, self.entry).await,
            None => error!("Track {} ended after the player was dropped", self.entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{track, track_in, FakeSink};
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<FakeSink>, Arc<AudioPlayer>) {
        let sink = Arc::new(FakeSink::default());
        let player = AudioPlayer::new(sink.clone());
        (sink, player)
    }

    /// Lets spawned tasks run until they block on a gate.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn titles(player: &AudioPlayer, guild: u64) -> Vec<String> {
        player
            .tracks(GuildId::new(guild))
            .unwrap_or_default()
            .iter()
            .map(|t| t.title().to_string())
            .collect()
    }

    #[tokio::test]
    async fn first_enqueue_starts_and_later_ones_only_append() {
        let (sink, player) = setup();

        assert_eq!(player.enqueue(track(1, "a")).await, Ok(Enqueued::Started));
        assert_eq!(player.enqueue(track(1, "b")).await, Ok(Enqueued::Queued { position: 1 }));
        assert_eq!(player.enqueue(track(1, "c")).await, Ok(Enqueued::Queued { position: 2 }));

        assert_eq!(sink.connects(), 1);
        assert_eq!(sink.streams(), vec!["a"]);
        assert_eq!(titles(&player, 1), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn natural_end_plays_next_then_goes_idle() {
        let (sink, player) = setup();
        player.enqueue(track(1, "a")).await.unwrap();
        player.enqueue(track(1, "b")).await.unwrap();

        sink.finish("a").await;
        assert_eq!(titles(&player, 1), vec!["b"]);
        assert_eq!(sink.streams(), vec!["a", "b"]);
        // the connection is reused between tracks
        assert_eq!(sink.connects(), 1);

        sink.finish("b").await;
        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.releases(), 1);
    }

    #[tokio::test]
    async fn skip_on_last_track_is_a_noop() {
        let (sink, player) = setup();
        player.enqueue(track(1, "a")).await.unwrap();

        assert_eq!(player.skip(GuildId::new(1)), Err(MusicError::NoNextTrack));
        assert!(sink.stops().is_empty());
        assert_eq!(titles(&player, 1), vec!["a"]);
    }

    #[tokio::test]
    async fn skip_stops_player_and_end_event_advances() {
        let (sink, player) = setup();
        for title in ["a", "b", "c"] {
            player.enqueue(track(1, title)).await.unwrap();
        }

        player.skip(GuildId::new(1)).unwrap();
        assert_eq!(sink.stops(), vec!["a"]);
        // nothing moves until the stopped track reports its end
        assert_eq!(titles(&player, 1), vec!["a", "b", "c"]);

        sink.finish("a").await;
        assert_eq!(titles(&player, 1), vec!["b", "c"]);
        assert_eq!(sink.streams(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn skip_and_stop_without_queue_report_nothing_playing() {
        let (_, player) = setup();

        assert_eq!(player.skip(GuildId::new(1)), Err(MusicError::NothingPlaying));
        assert_eq!(player.stop(GuildId::new(1)).await, Err(MusicError::NothingPlaying));
        assert!(player.tracks(GuildId::new(1)).is_none());
    }

    #[tokio::test]
    async fn stop_clears_queue_and_ignores_late_end_event() {
        let (sink, player) = setup();
        player.enqueue(track(1, "a")).await.unwrap();
        player.enqueue(track(1, "b")).await.unwrap();

        assert_eq!(player.stop(GuildId::new(1)).await, Ok(2));
        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.stops(), vec!["a"]);
        assert_eq!(sink.releases(), 1);

        sink.finish("a").await;
        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.streams(), vec!["a"]);
    }

    #[tokio::test]
    async fn failing_stream_is_dropped_and_next_track_plays() {
        let (sink, player) = setup();
        sink.fail_stream("bad");

        player.enqueue(track(1, "a")).await.unwrap();
        player.enqueue(track(1, "bad")).await.unwrap();
        player.enqueue(track(1, "also-bad")).await.unwrap();
        player.enqueue(track(1, "c")).await.unwrap();
        sink.fail_stream("also-bad");

        sink.finish("a").await;
        assert_eq!(titles(&player, 1), vec!["c"]);
        assert_eq!(sink.streams(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn failing_only_track_reports_error_and_deletes_queue() {
        let (sink, player) = setup();
        sink.fail_stream("bad");

        let err = player.enqueue(track(1, "bad")).await.unwrap_err();
        assert!(matches!(err, MusicError::StreamUnavailable(_)));
        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.releases(), 1);
    }

    #[tokio::test]
    async fn failed_connect_drops_the_track() {
        let (sink, player) = setup();
        sink.fail_connect();

        assert!(player.enqueue(track(1, "a")).await.is_err());
        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.releases(), 0);
    }

    #[tokio::test]
    async fn duplicate_end_events_advance_once() {
        let (sink, player) = setup();
        for title in ["a", "b", "c"] {
            player.enqueue(track(1, title)).await.unwrap();
        }

        sink.finish("a").await;
        sink.finish("a").await;
        assert_eq!(titles(&player, 1), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn guilds_play_independently() {
        let (sink, player) = setup();
        player.enqueue(track(1, "a")).await.unwrap();
        player.enqueue(track(2, "x")).await.unwrap();

        assert_eq!(sink.connects(), 2);
        player.stop(GuildId::new(1)).await.unwrap();

        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(titles(&player, 2), vec!["x"]);
    }

    #[tokio::test]
    async fn next_track_plays_in_the_channel_it_was_requested_from() {
        let (sink, player) = setup();
        player.enqueue(track_in(1, 10, "a")).await.unwrap();
        player.enqueue(track_in(1, 11, "b")).await.unwrap();
        player.enqueue(track_in(1, 11, "c")).await.unwrap();

        sink.finish("a").await;
        assert_eq!(
            sink.streams_by_channel(),
            vec![(10, "a".to_string()), (11, "b".to_string())]
        );

        // same channel as the previous track, no new join
        sink.finish("b").await;
        assert_eq!(sink.joins(), vec![10, 11]);
        assert_eq!(sink.streams_by_channel().last(), Some(&(11, "c".to_string())));
    }

    #[tokio::test]
    async fn stop_while_joining_releases_the_late_connection() {
        let (sink, player) = setup();
        let gate = sink.gate_connect();

        let task = tokio::spawn({
            let player = player.clone();
            async move { player.enqueue(track(1, "a")).await }
        });
        settle().await;

        assert_eq!(player.stop(GuildId::new(1)).await, Ok(1));
        assert_eq!(sink.releases(), 0);

        gate.notify_one();
        task.await.unwrap().unwrap();

        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.connects(), 1);
        assert_eq!(sink.releases(), 1);
        assert!(sink.streams().is_empty());
    }

    #[tokio::test]
    async fn stop_while_stream_opens_stops_the_late_player() {
        let (sink, player) = setup();
        let gate = sink.gate_stream("a");

        let task = tokio::spawn({
            let player = player.clone();
            async move { player.enqueue(track(1, "a")).await }
        });
        settle().await;

        assert_eq!(player.stop(GuildId::new(1)).await, Ok(1));
        assert_eq!(sink.releases(), 1);

        gate.notify_one();
        task.await.unwrap().unwrap();

        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.streams(), vec!["a"]);
        assert_eq!(sink.stops(), vec!["a"]);
        // released once, by the stop
        assert_eq!(sink.releases(), 1);
    }

    #[tokio::test]
    async fn replaced_head_stops_its_late_player() {
        let (sink, player) = setup();
        let gate = sink.gate_stream("a");

        let task = tokio::spawn({
            let player = player.clone();
            async move { player.enqueue(track(1, "a")).await }
        });
        settle().await;

        player.stop(GuildId::new(1)).await.unwrap();
        assert_eq!(player.enqueue(track(1, "b")).await, Ok(Enqueued::Started));

        gate.notify_one();
        task.await.unwrap().unwrap();

        assert_eq!(titles(&player, 1), vec!["b"]);
        assert_eq!(sink.streams(), vec!["b", "a"]);
        assert_eq!(sink.stops(), vec!["a"]);
        assert_eq!(sink.releases(), 1);

        // b still owns the guild and finishes normally
        sink.finish("b").await;
        assert!(!player.store().exists(GuildId::new(1)));
        assert_eq!(sink.releases(), 2);
    }
}
