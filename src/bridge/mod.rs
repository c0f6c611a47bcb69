//! Wiring between the player core and a publish/subscribe bus
//!
//! Dispatcher events are rendered to topic/payload pairs and published;
//! messages arriving on the command topics are parsed and handed to a
//! [`CommandHandler`].

pub mod memory;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod queued;
pub mod topics;

use crate::data::{PlayerCommand, PlayerEvent};
use crate::error::{BridgeError, BridgeResult};
use crate::players::{ChangeDispatcher, CommandHandler, EventSink};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use log::{debug, info, warn};

pub use memory::MemoryBus;
pub use queued::QueuedBus;
pub use topics::{join_topic, TopicScheme};

/// Minimal publish/subscribe client
pub trait BusClient: Send + Sync {
    /// Publish with the highest available delivery guarantee
    fn publish(&self, topic: &str, payload: &str) -> BridgeResult<()>;

    fn subscribe(&self, topic: &str) -> BridgeResult<()>;
}

/// Topic/payload pairs for one event
pub fn messages_for(topics: &TopicScheme, event: &PlayerEvent) -> Vec<(String, String)> {
    match event {
        PlayerEvent::SongChanged { song } => song.iter()
            .map(|(attr, value)| (topics.song(attr), value.to_payload()))
            .collect(),
        PlayerEvent::PlaybackStateChanged { state } => {
            vec![(topics.player("state"), state.to_payload())]
        },
        PlayerEvent::ElapsedChanged { elapsed } => {
            vec![(topics.player("elapsed"), elapsed.to_payload())]
        },
        PlayerEvent::VolumeChanged { volume } => {
            vec![(topics.player("volume"), volume.to_payload())]
        },
        PlayerEvent::PlayModeChanged { repeat, random } => vec![
            (topics.player("repeat"), repeat.to_payload()),
            (topics.player("random"), random.to_payload()),
        ],
        PlayerEvent::SingleModeChanged { single } => {
            vec![(topics.player("single"), single.to_payload())]
        },
    }
}

/// Event sink that publishes every event on the bus
pub struct BusPublisher {
    bus: Arc<dyn BusClient>,
    topics: TopicScheme,
}

impl BusPublisher {
    pub fn new(bus: Arc<dyn BusClient>, topics: TopicScheme) -> Self {
        Self { bus, topics }
    }
}

impl EventSink for BusPublisher {
    fn on_event(&self, event: &PlayerEvent) {
        for (topic, payload) in messages_for(&self.topics, event) {
            debug!("Publishing {} = {}", topic, payload);
            if let Err(e) = self.bus.publish(&topic, &payload) {
                warn!("Failed to publish {}: {}", topic, e);
            }
        }
    }
}

/// What an inbound topic is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Payload is a command name
    Command,
    /// Payload is a volume level
    Volume,
}

/// Inbound topics and the handler their messages go to
pub struct SubscriptionTable {
    routes: BTreeMap<String, Route>,
    handler: Arc<dyn CommandHandler>,
}

impl SubscriptionTable {
    pub fn new(topics: &TopicScheme, handler: Arc<dyn CommandHandler>) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(topics.command(), Route::Command);
        routes.insert(topics.volume_command(), Route::Volume);
        Self { routes, handler }
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(|topic| topic.as_str())
    }

    pub fn route(&self, topic: &str) -> Option<Route> {
        self.routes.get(topic).copied()
    }

    pub fn subscribe_all(&self, bus: &dyn BusClient) -> BridgeResult<()> {
        for topic in self.topics() {
            info!("Subscribing to {}", topic);
            bus.subscribe(topic)?;
        }
        Ok(())
    }

    /// Parse and run one inbound message
    ///
    /// Messages on unknown topics are ignored. Failures are logged and
    /// returned; the message is dropped either way.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> BridgeResult<()> {
        let route = match self.route(topic) {
            Some(route) => route,
            None => {
                debug!("Ignoring message on unrouted topic {}", topic);
                return Ok(());
            }
        };
        let payload = String::from_utf8_lossy(payload);

        let result = match route {
            Route::Command => PlayerCommand::from_payload(&payload)
                .and_then(|command| self.handler.execute(command)),
            Route::Volume => self.handler.execute(PlayerCommand::SetVolume(payload.trim().to_string())),
        };

        if let Err(e) = &result {
            match e {
                BridgeError::InvalidArgument(_) => warn!("Dropping command on {}: {}", topic, e),
                _ => warn!("Command on {} failed: {}", topic, e),
            }
        }
        result
    }
}

/// The bridge wiring: publisher sink plus subscription table
pub struct Bridge {
    publisher: Arc<BusPublisher>,
    subscriptions: Arc<SubscriptionTable>,
}

impl Bridge {
    /// Register a publisher for `bus` with the dispatcher and route the
    /// command topics to `handler`
    pub fn new(
        bus: Arc<dyn BusClient>,
        topics: &TopicScheme,
        dispatcher: &ChangeDispatcher,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        let publisher = Arc::new(BusPublisher::new(bus, topics.clone()));
        let sink: Weak<dyn EventSink> = Arc::downgrade(&publisher) as Weak<dyn EventSink>;
        dispatcher.register_sink(sink);

        Self {
            publisher,
            subscriptions: Arc::new(SubscriptionTable::new(topics, handler)),
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionTable> {
        &self.subscriptions
    }

    pub fn publisher(&self) -> &Arc<BusPublisher> {
        &self.publisher
    }
}
