use crate::data::{PlayerEvent, PlayerSnapshots, SharedSnapshots, SONG_EVENT_KEYS};
use crate::error::{BridgeError, BridgeResult};
use std::collections::BTreeSet;
use std::sync::{MutexGuard, RwLock, Weak};
use log::{debug, trace, warn};

/// Receiver of dispatched player events
pub trait EventSink: Send + Sync {
    /// Called once per event, in dispatch order
    fn on_event(&self, event: &PlayerEvent);
}

/// The kinds of event the dispatcher can emit on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Song,
    PlaybackState,
    Elapsed,
    Volume,
    PlayMode,
    SingleMode,
}

impl EventKind {
    /// All kinds, in dispatch order
    pub fn all() -> [EventKind; 6] {
        [
            EventKind::Song,
            EventKind::PlaybackState,
            EventKind::Elapsed,
            EventKind::Volume,
            EventKind::PlayMode,
            EventKind::SingleMode,
        ]
    }

    /// Whether a cycle with these change sets triggers this kind
    fn is_triggered(&self, status_changes: &BTreeSet<String>, item_changes: &BTreeSet<String>) -> bool {
        let any = |set: &BTreeSet<String>, keys: &[&str]| keys.iter().any(|k| set.contains(*k));
        match self {
            EventKind::Song => any(item_changes, &["title", "artist", "album"]),
            EventKind::PlaybackState => status_changes.contains("state"),
            EventKind::Elapsed => status_changes.contains("elapsed"),
            EventKind::Volume => status_changes.contains("volume"),
            EventKind::PlayMode => any(status_changes, &["repeat", "random"]),
            EventKind::SingleMode => status_changes.contains("single"),
        }
    }

    /// Build the event from the current snapshot state
    fn current_event(&self, snapshots: &PlayerSnapshots) -> BridgeResult<PlayerEvent> {
        let status = &snapshots.status;
        Ok(match self {
            EventKind::Song => {
                let song = snapshots.item.subset(&SONG_EVENT_KEYS);
                if song.is_empty() {
                    return Err(BridgeError::MissingAttribute("song".to_string()));
                }
                PlayerEvent::SongChanged { song }
            },
            EventKind::PlaybackState => PlayerEvent::PlaybackStateChanged {
                state: status.read("state")?.clone(),
            },
            EventKind::Elapsed => PlayerEvent::ElapsedChanged {
                elapsed: status.read("elapsed")?.clone(),
            },
            EventKind::Volume => PlayerEvent::VolumeChanged {
                volume: status.read("volume")?.clone(),
            },
            EventKind::PlayMode => PlayerEvent::PlayModeChanged {
                repeat: status.read("repeat")?.clone(),
                random: status.read("random")?.clone(),
            },
            EventKind::SingleMode => PlayerEvent::SingleModeChanged {
                single: status.read("single")?.clone(),
            },
        })
    }
}

/// Events implied by one refresh cycle's change sets
///
/// A trigger whose attribute is no longer reported (e.g. elapsed time after
/// a stop) yields no event, except for song changes, which carry whatever
/// song attributes remain.
pub fn events_for(
    snapshots: &PlayerSnapshots,
    status_changes: &BTreeSet<String>,
    item_changes: &BTreeSet<String>,
) -> Vec<PlayerEvent> {
    EventKind::all().iter()
        .filter(|kind| kind.is_triggered(status_changes, item_changes))
        .filter_map(|kind| match kind {
            EventKind::Song => Some(PlayerEvent::SongChanged {
                song: snapshots.item.subset(&SONG_EVENT_KEYS),
            }),
            _ => match kind.current_event(snapshots) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!("Skipping {:?} event: {}", kind, e);
                    None
                }
            },
        })
        .collect()
}

/// Turns attribute change sets into player events and fans them out to sinks
pub struct ChangeDispatcher {
    snapshots: SharedSnapshots,
    sinks: RwLock<Vec<Weak<dyn EventSink>>>,
}

impl ChangeDispatcher {
    pub fn new(snapshots: SharedSnapshots) -> Self {
        Self {
            snapshots,
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn snapshots(&self) -> &SharedSnapshots {
        &self.snapshots
    }

    /// Register a sink; it is dropped from the list once its owner goes away
    pub fn register_sink(&self, sink: Weak<dyn EventSink>) {
        match self.sinks.write() {
            Ok(mut sinks) => sinks.push(sink),
            Err(_) => warn!("Failed to acquire write lock when registering event sink"),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.prune_dead_sinks();
        self.sinks.read().map(|sinks| sinks.len()).unwrap_or(0)
    }

    /// Dispatch the events implied by one refresh cycle
    pub fn dispatch(&self, status_changes: &BTreeSet<String>, item_changes: &BTreeSet<String>) -> usize {
        debug!("Dispatching changes: status={:?}, item={:?}", status_changes, item_changes);
        let events = {
            let snapshots = self.lock_snapshots();
            events_for(&snapshots, status_changes, item_changes)
        };
        for event in &events {
            self.notify(event);
        }
        events.len()
    }

    /// Emit the current value of one event kind without waiting for a change
    ///
    /// Returns false, without raising, when the attribute is not available.
    pub fn emit(&self, kind: EventKind) -> bool {
        let event = {
            let snapshots = self.lock_snapshots();
            kind.current_event(&snapshots)
        };
        match event {
            Ok(event) => {
                self.notify(&event);
                true
            },
            Err(e) => {
                debug!("Nothing to emit for {:?}: {}", kind, e);
                false
            }
        }
    }

    pub fn emit_song(&self) -> bool {
        self.emit(EventKind::Song)
    }

    pub fn emit_state(&self) -> bool {
        self.emit(EventKind::PlaybackState)
    }

    pub fn emit_elapsed(&self) -> bool {
        self.emit(EventKind::Elapsed)
    }

    pub fn emit_volume(&self) -> bool {
        self.emit(EventKind::Volume)
    }

    pub fn emit_play_mode(&self) -> bool {
        self.emit(EventKind::PlayMode)
    }

    pub fn emit_single(&self) -> bool {
        self.emit(EventKind::SingleMode)
    }

    /// Emit every event kind, in dispatch order; returns how many were sent
    pub fn emit_all(&self) -> usize {
        EventKind::all().iter()
            .filter(|kind| self.emit(**kind))
            .count()
    }

    fn notify(&self, event: &PlayerEvent) {
        self.prune_dead_sinks();
        trace!("Notifying sinks of {}", event);
        if let Ok(sinks) = self.sinks.read() {
            for sink in sinks.iter() {
                if let Some(sink) = sink.upgrade() {
                    sink.on_event(event);
                }
            }
        } else {
            warn!("Failed to acquire read lock for event sinks");
        }
    }

    fn prune_dead_sinks(&self) {
        if let Ok(mut sinks) = self.sinks.write() {
            sinks.retain(|sink| sink.strong_count() > 0);
        }
    }

    fn lock_snapshots(&self) -> MutexGuard<'_, PlayerSnapshots> {
        match self.snapshots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
