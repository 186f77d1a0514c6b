use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

use super::{PlayerHandle, VoiceConnection};
use crate::sources::Track;

/// Identifies one queued occurrence of a track.
///
/// The same song queued twice gets two ids, so a late completion event for
/// the first one can never pop the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: EntryId,
    pub track: Track,
}

/// Per-guild queue record. Head of `entries` is playing or about to play.
#[derive(Clone, Default)]
pub struct GuildQueue {
    pub entries: VecDeque<QueueEntry>,
    pub connection: Option<Arc<dyn VoiceConnection>>,
    pub player: Option<Arc<dyn PlayerHandle>>,
}

impl GuildQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }
}

impl fmt::Debug for GuildQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuildQueue")
            .field("entries", &self.entries)
            .field("connected", &self.connection.is_some())
            .field("playing", &self.player.is_some())
            .finish()
    }
}

/// Outcome of popping a finished entry.
pub enum Advance {
    /// The queue continues with this entry
    Next(QueueEntry),
    /// The queue ran dry and was deleted; the connection must be released
    Idle(Option<Arc<dyn VoiceConnection>>),
    /// The finished entry is not the head (or the queue is gone); nothing to do
    Stale,
}

/// Outcome of recording the handles of a freshly started entry.
pub enum Attach {
    Attached,
    /// The queue was deleted while the entry was starting
    QueueGone,
    /// The queue exists but its head is another entry now
    NotHead,
}

/// Process-wide mapping from guild to its queue.
///
/// Every method is one short critical section on the guild's shard and never
/// holds a lock across an `.await`, so each operation is atomic per guild.
/// Compound operations (`push`, `attach_*`, `advance`) exist so callers never
/// need a read-modify-write spanning two calls.
pub struct QueueStore {
    queues: DashMap<GuildId, GuildQueue>,
    next_entry: AtomicU64,
}

impl QueueStore {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            next_entry: AtomicU64::new(1),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<GuildQueue> {
        self.queues.get(&guild_id).map(|queue| queue.clone())
    }

    /// Replaces the queue of a guild. An empty queue deletes the entry instead.
    ///
    /// Playback only goes through the atomic operations below; this is used
    /// to seed a queue in tests.
    #[cfg(test)]
    pub fn set(&self, guild_id: GuildId, queue: GuildQueue) {
        if queue.is_empty() {
            self.queues.remove(&guild_id);
        } else {
            self.queues.insert(guild_id, queue);
        }
    }

    pub fn delete(&self, guild_id: GuildId) -> Option<GuildQueue> {
        self.queues.remove(&guild_id).map(|(_, queue)| queue)
    }

    pub fn exists(&self, guild_id: GuildId) -> bool {
        self.queues.contains_key(&guild_id)
    }

    /// Appends a track to its guild's queue, creating the queue if needed.
    /// Returns the new entry id and the queue length after the push.
    pub fn push(&self, track: Track) -> (QueueEntry, usize) {
        let entry = QueueEntry {
            id: EntryId(self.next_entry.fetch_add(1, Ordering::Relaxed)),
            track,
        };
        let guild_id = entry.track.guild_id();

        let mut queue = self.queues.entry(guild_id).or_default();
        queue.entries.push_back(entry.clone());
        let len = queue.len();

        info!("➕ Queued {} {} in guild {} ({} in queue)", entry.id, entry.track.title(), guild_id, len);
        (entry, len)
    }

    /// Records the voice connection of a guild. Returns false when the queue
    /// no longer exists, in which case the caller owns the connection.
    pub fn attach_connection(&self, guild_id: GuildId, connection: Arc<dyn VoiceConnection>) -> bool {
        match self.queues.get_mut(&guild_id) {
            Some(mut queue) => {
                queue.connection = Some(connection);
                true
            }
            None => false,
        }
    }

    /// Records the player of `entry` if it is still the head.
    pub fn attach_player(&self, guild_id: GuildId, entry: EntryId, player: Arc<dyn PlayerHandle>) -> Attach {
        let Some(mut queue) = self.queues.get_mut(&guild_id) else {
            return Attach::QueueGone;
        };

        if queue.head().map(|head| head.id) != Some(entry) {
            return Attach::NotHead;
        }

        queue.player = Some(player);
        Attach::Attached
    }

    /// Pops the head if it is `finished`. Deletes the queue when it becomes
    /// empty, handing back the connection to release.
    pub fn advance(&self, guild_id: GuildId, finished: EntryId) -> Advance {
        let Entry::Occupied(mut occupied) = self.queues.entry(guild_id) else {
            debug!("Advance {} ignored, no queue for guild {}", finished, guild_id);
            return Advance::Stale;
        };

        let queue = occupied.get_mut();
        if queue.head().map(|head| head.id) != Some(finished) {
            debug!("Advance {} ignored, not the head in guild {}", finished, guild_id);
            return Advance::Stale;
        }

        queue.entries.pop_front();
        queue.player = None;

        if queue.is_empty() {
            let (_, queue) = occupied.remove_entry();
            info!("📭 Queue finished in guild {}", guild_id);
            return Advance::Idle(queue.connection);
        }

        Advance::Next(queue.entries[0].clone())
    }

    pub fn tracks(&self, guild_id: GuildId) -> Option<Vec<Track>> {
        self.get(guild_id)
            .map(|queue| queue.entries.into_iter().map(|entry| entry.track).collect())
    }

    pub fn len(&self, guild_id: GuildId) -> usize {
        self.queues.get(&guild_id).map_or(0, |queue| queue.len())
    }

    pub fn player(&self, guild_id: GuildId) -> Option<Arc<dyn PlayerHandle>> {
        self.queues.get(&guild_id).and_then(|queue| queue.player.clone())
    }

    pub fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnection>> {
        self.queues.get(&guild_id).and_then(|queue| queue.connection.clone())
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}
