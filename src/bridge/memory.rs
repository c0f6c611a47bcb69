use crate::bridge::{BusClient, SubscriptionTable};
use crate::error::BridgeResult;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use log::{info, warn};

/// In-process bus that keeps everything published on it
///
/// Used for dry runs, where publishes are logged instead of sent, and by
/// tests.
#[derive(Default)]
pub struct MemoryBus {
    published: Mutex<Vec<(String, String)>>,
    subscriptions: Mutex<Vec<String>>,
    log_publishes: bool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that also logs every publish at info level
    pub fn logging() -> Self {
        Self {
            log_publishes: true,
            ..Self::default()
        }
    }

    /// Everything published so far, in order
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Remove and return everything published so far
    pub fn take_published(&self) -> Vec<(String, String)> {
        self.published.lock().map(|mut p| std::mem::take(&mut *p)).unwrap_or_default()
    }

    /// Last payload published on `topic`
    pub fn last_payload(&self, topic: &str) -> Option<String> {
        self.published().into_iter()
            .rev()
            .find(|(t, _)| t == topic)
            .map(|(_, payload)| payload)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl BusClient for MemoryBus {
    fn publish(&self, topic: &str, payload: &str) -> BridgeResult<()> {
        if self.log_publishes {
            info!("{} = {}", topic, payload);
        }
        if let Ok(mut published) = self.published.lock() {
            published.push((topic.to_string(), payload.to_string()));
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> BridgeResult<()> {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            if !subscriptions.iter().any(|t| t == topic) {
                subscriptions.push(topic.to_string());
            }
        }
        Ok(())
    }
}

/// Route "topic payload" lines through `table` until EOF or `running` is cleared
///
/// Returns the number of lines routed. A blocked read is not interrupted by
/// clearing `running`.
pub fn route_lines<R: BufRead>(table: &SubscriptionTable, reader: R, running: &AtomicBool) -> usize {
    let mut routed = 0;
    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (topic, payload) = line.split_once(' ').unwrap_or((line, ""));
        // Errors are logged by the subscription table
        let _ = table.handle_message(topic, payload.trim().as_bytes());
        routed += 1;
    }
    routed
}
