use crate::bridge::BusClient;
use crate::error::{BridgeError, BridgeResult};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread;
use log::{debug, warn};

/// Default number of publishes waiting for the bus
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Bus wrapper that publishes from its own thread
///
/// `publish` only enqueues and never blocks. When the queue is full the
/// message is dropped with a warning. Subscriptions go straight to the
/// wrapped bus.
pub struct QueuedBus {
    inner: Arc<dyn BusClient>,
    sender: Sender<(String, String)>,
}

impl QueuedBus {
    pub fn new(inner: Arc<dyn BusClient>, capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = bounded(capacity.max(1));
        let target = inner.clone();
        thread::Builder::new()
            .name("bus-publisher".to_string())
            .spawn(move || drain(receiver, target))?;
        Ok(Self { inner, sender })
    }

    /// Publishes waiting to be handed to the wrapped bus
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

impl BusClient for QueuedBus {
    fn publish(&self, topic: &str, payload: &str) -> BridgeResult<()> {
        match self.sender.try_send((topic.to_string(), payload.to_string())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Publish queue full, dropping {} = {}", topic, payload);
                Err(BridgeError::Bus(format!("publish queue full, dropped {}", topic)))
            },
            Err(TrySendError::Disconnected(_)) => {
                Err(BridgeError::Bus("publisher thread is gone".to_string()))
            },
        }
    }

    fn subscribe(&self, topic: &str) -> BridgeResult<()> {
        self.inner.subscribe(topic)
    }
}

fn drain(receiver: Receiver<(String, String)>, bus: Arc<dyn BusClient>) {
    for (topic, payload) in receiver.iter() {
        if let Err(e) = bus.publish(&topic, &payload) {
            warn!("Failed to publish {}: {}", topic, e);
        }
    }
    debug!("Bus publisher thread exiting");
}
