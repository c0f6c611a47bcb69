use crate::bridge::{BusClient, SubscriptionTable};
use crate::config::MqttSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::helpers::retry::RetryHandler;
use crossbeam::channel::{unbounded, Receiver};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use log::{debug, error, info, warn};

/// Capacity of the request queue between the client handle and the event loop
const REQUEST_CAPACITY: usize = 64;

/// MQTT client handle
///
/// Publishes and subscriptions use QoS 2. Every subscribed topic is
/// remembered so it can be subscribed again after the broker connection
/// was re-established.
#[derive(Clone)]
pub struct MqttBus {
    client: Client,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

/// The half of the MQTT connection that has to be polled
pub struct MqttEventLoop {
    connection: Connection,
    bus: MqttBus,
}

impl MqttBus {
    /// Create the client handle and its event loop; nothing is sent until
    /// the event loop runs
    pub fn connect(settings: &MqttSettings) -> (MqttBus, MqttEventLoop) {
        let mut options = MqttOptions::new(settings.client_id.clone(), settings.host.clone(), settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(5)));
        if let Some(username) = &settings.username {
            options.set_credentials(username.clone(), settings.password.clone().unwrap_or_default());
        }

        info!("Connecting to MQTT broker at {}:{}", settings.host, settings.port);
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let bus = MqttBus {
            client,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        };
        let event_loop = MqttEventLoop {
            connection,
            bus: bus.clone(),
        };
        (bus, event_loop)
    }

    fn remembered_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn resubscribe(&self) {
        for topic in self.remembered_subscriptions() {
            debug!("Subscribing to {}", topic);
            if let Err(e) = self.client.try_subscribe(topic.clone(), QoS::ExactlyOnce) {
                warn!("Failed to subscribe to {}: {}", topic, e);
            }
        }
    }

    /// Ask the broker to close the session; the event loop ends afterwards
    pub fn disconnect(&self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect request failed: {}", e);
        }
    }
}

impl BusClient for MqttBus {
    /// Never waits for the event loop; fails when its request queue is full
    fn publish(&self, topic: &str, payload: &str) -> BridgeResult<()> {
        self.client
            .try_publish(topic, QoS::ExactlyOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| BridgeError::Bus(format!("publish to {} failed: {}", topic, e)))
    }

    fn subscribe(&self, topic: &str) -> BridgeResult<()> {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            if !subscriptions.iter().any(|t| t == topic) {
                subscriptions.push(topic.to_string());
            }
        }
        self.client
            .try_subscribe(topic, QoS::ExactlyOnce)
            .map_err(|e| BridgeError::Bus(format!("subscribe to {} failed: {}", topic, e)))
    }
}

impl MqttEventLoop {
    /// Poll the broker connection until `running` is cleared
    ///
    /// Inbound messages are handed to a worker thread, so a command that
    /// publishes (such as `query`) never waits on this loop.
    pub fn run(mut self, table: Arc<SubscriptionTable>, running: Arc<AtomicBool>) {
        let (sender, receiver) = unbounded::<(String, Vec<u8>)>();
        let worker = thread::Builder::new()
            .name("mqtt-commands".to_string())
            .spawn(move || command_worker(receiver, table));
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to start MQTT command worker: {}", e);
                return;
            }
        };

        let mut retry = RetryHandler::connection_retry();
        for notification in self.connection.iter() {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            match notification {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    retry.reset();
                    self.bus.resubscribe();
                },
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("Received message on {}", publish.topic);
                    if sender.send((publish.topic.clone(), publish.payload.to_vec())).is_err() {
                        error!("MQTT command worker is gone, stopping event loop");
                        break;
                    }
                },
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    info!("MQTT broker closed the session");
                },
                Ok(_) => {},
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    if !retry.wait(Some(&running)) {
                        break;
                    }
                }
            }
        }

        drop(sender);
        if worker.join().is_err() {
            error!("MQTT command worker panicked");
        }
        info!("MQTT event loop stopped");
    }
}

fn command_worker(receiver: Receiver<(String, Vec<u8>)>, table: Arc<SubscriptionTable>) {
    for (topic, payload) in receiver.iter() {
        // Errors are already logged by the table
        let _ = table.handle_message(&topic, &payload);
    }
    debug!("MQTT command worker exiting");
}
