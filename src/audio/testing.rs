//! In-memory voice backend for driver tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Notify;

use super::{AudioSink, PlayerHandle, TrackEndNotifier, VoiceConnection};
use crate::{
    error::MusicError,
    sources::{ResolvedTrack, SourceType, Track},
};

pub fn track(guild: u64, title: &str) -> Track {
    track_in(guild, 10, title)
}

/// Track requested from voice channel `channel`.
pub fn track_in(guild: u64, channel: u64, title: &str) -> Track {
    Track::new(
        ResolvedTrack::new(title, format!("https://youtu.be/{title}"), SourceType::YouTube),
        GuildId::new(guild),
        ChannelId::new(channel),
        UserId::new(20),
    )
}

#[derive(Default)]
struct FakeState {
    joins: Vec<u64>,
    releases: usize,
    streams: Vec<(u64, String)>,
    stops: Vec<String>,
    notifiers: Vec<(String, TrackEndNotifier)>,
    failing: HashSet<String>,
    fail_connect: bool,
    connect_gate: Option<Arc<Notify>>,
    stream_gates: HashMap<String, Arc<Notify>>,
}

/// Records every call and lets tests fire track end events by title.
///
/// Gates suspend `connect` or `open_stream` until the test releases them, so
/// a stop can be interleaved with a track start.
#[derive(Default)]
pub struct FakeSink {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSink {
    pub fn connects(&self) -> usize {
        self.state.lock().joins.len()
    }

    /// Channels joined, in order.
    pub fn joins(&self) -> Vec<u64> {
        self.state.lock().joins.clone()
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn streams(&self) -> Vec<String> {
        self.state.lock().streams.iter().map(|(_, title)| title.clone()).collect()
    }

    /// Streams with the channel their connection was bound to.
    pub fn streams_by_channel(&self) -> Vec<(u64, String)> {
        self.state.lock().streams.clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.state.lock().stops.clone()
    }

    pub fn fail_stream(&self, title: &str) {
        self.state.lock().failing.insert(title.to_string());
    }

    pub fn fail_connect(&self) {
        self.state.lock().fail_connect = true;
    }

    /// Holds every `connect` until the returned gate is notified.
    pub fn gate_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().connect_gate = Some(gate.clone());
        gate
    }

    /// Holds the stream of `title` until the returned gate is notified.
    pub fn gate_stream(&self, title: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().stream_gates.insert(title.to_string(), gate.clone());
        gate
    }

    /// Fires the end event of the latest stream opened for `title`.
    pub async fn finish(&self, title: &str) {
        let notifier = self
            .state
            .lock()
            .notifiers
            .iter()
            .rev()
            .find(|(t, _)| t == title)
            .map(|(_, notifier)| notifier.clone());

        if let Some(notifier) = notifier {
            notifier.notify().await;
        }
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, MusicError> {
        let gate = self.state.lock().connect_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(MusicError::StreamUnavailable("cannot join".to_string()));
        }
        state.joins.push(channel_id.get());

        Ok(Arc::new(FakeConnection {
            channel_id,
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    channel_id: ChannelId,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn open_stream(
        &self,
        track: &Track,
        on_end: TrackEndNotifier,
    ) -> Result<Arc<dyn PlayerHandle>, MusicError> {
        let title = track.title().to_string();

        let gate = self.state.lock().stream_gates.get(&title).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if state.failing.contains(&title) {
            return Err(MusicError::StreamUnavailable(title));
        }

        state.streams.push((self.channel_id.get(), title.clone()));
        state.notifiers.push((title.clone(), on_end));

        Ok(Arc::new(FakePlayer {
            title,
            state: self.state.clone(),
        }))
    }

    async fn release(&self) {
        self.state.lock().releases += 1;
    }
}

struct FakePlayer {
    title: String,
    state: Arc<Mutex<FakeState>>,
}

impl PlayerHandle for FakePlayer {
    fn stop(&self) {
        self.state.lock().stops.push(self.title.clone());
    }
}
