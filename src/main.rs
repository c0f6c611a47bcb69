use mpdbridge::bridge::{Bridge, BusClient, MemoryBus};
use mpdbridge::bridge::memory::route_lines;
use mpdbridge::config::BridgeConfig;
use mpdbridge::data::PlayerSnapshots;
use mpdbridge::logging::initialize_logging;
use mpdbridge::players::{ChangeDispatcher, CommandExecutor, CommandHandler, ConnectionPool, MpdConnector, Watcher};
use clap::Parser;
use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Publishes MPD player state to MQTT and runs commands received from it", long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[clap(short = 'c', long = "config")]
    config: Option<String>,

    #[clap(long)]
    mpdhost: Option<String>,

    #[clap(long)]
    mpdport: Option<u16>,

    #[clap(long)]
    mpdpassword: Option<String>,

    #[clap(long)]
    mqtthost: Option<String>,

    #[clap(long)]
    mqttport: Option<u16>,

    /// Prefix for every published and subscribed topic
    #[clap(long)]
    topic: Option<String>,

    /// Tag used to find the favourite item in the queue
    #[clap(long = "fav-tag")]
    fav_tag: Option<String>,

    /// Value the favourite tag must have
    #[clap(long = "fav-text")]
    fav_text: Option<String>,

    /// Log publishes and read "topic payload" lines from stdin instead of using MQTT
    #[clap(long = "dry-run")]
    dry_run: bool,

    /// Print a sample configuration and exit
    #[clap(long = "sample-config")]
    sample_config: bool,

    #[clap(short = 'd', long)]
    debug: bool,

    #[clap(short = 'v', long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.mpdhost {
            config.mpd.host = host.clone();
        }
        if let Some(port) = self.mpdport {
            config.mpd.port = port;
        }
        if let Some(password) = &self.mpdpassword {
            config.mpd.password = Some(password.clone());
        }
        if let Some(host) = &self.mqtthost {
            config.mqtt.host = host.clone();
        }
        if let Some(port) = self.mqttport {
            config.mqtt.port = port;
        }
        if let Some(prefix) = &self.topic {
            config.topics.prefix = prefix.clone();
        }
        if let Some(tag) = &self.fav_tag {
            config.favourite.tag = tag.clone();
        }
        if let Some(text) = &self.fav_text {
            config.favourite.text = text.clone();
        }
    }
}

fn load_config(args: &Args) -> Result<BridgeConfig, String> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path).map_err(|e| e.to_string())?,
        None => BridgeConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Route "topic payload" lines from stdin until EOF
fn run_stdin_loop(bridge: &Bridge, running: &AtomicBool) {
    info!("Dry run: enter \"<topic> <payload>\" lines, Ctrl+D or Ctrl+C to exit");
    let routed = route_lines(bridge.subscriptions(), io::stdin().lock(), running);
    info!("Routed {} lines from stdin", routed);
}

fn main() {
    let args = Args::parse();

    if args.sample_config {
        match serde_json::to_string_pretty(&BridgeConfig::sample()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize sample configuration: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = initialize_logging(&config.logging, args.debug, args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("mpdbridge {} starting", env!("CARGO_PKG_VERSION"));

    let connector = MpdConnector::new(&config.mpd.host, config.mpd.port)
        .with_password(config.mpd.password.clone())
        .with_timeout(Duration::from_millis(config.mpd.timeout_ms));
    let pool = Arc::new(ConnectionPool::with_settings(connector, config.pool.clone()));
    let snapshots = PlayerSnapshots::shared(config.snapshot_change_policy);
    let dispatcher = Arc::new(ChangeDispatcher::new(snapshots));
    let executor: Arc<dyn CommandHandler> = Arc::new(
        CommandExecutor::new(pool.clone(), dispatcher.clone()).with_favourite(config.favourite.clone()),
    );

    let running = Arc::new(AtomicBool::new(true));

    if args.dry_run {
        let bus: Arc<dyn BusClient> = Arc::new(MemoryBus::logging());
        let bridge = Bridge::new(bus.clone(), &config.topics, &dispatcher, executor);
        if let Err(e) = bridge.subscriptions().subscribe_all(bus.as_ref()) {
            error!("Failed to subscribe: {}", e);
        }

        let r = running.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Received Ctrl+C, shutting down");
            r.store(false, Ordering::SeqCst);
            // The stdin loop is blocked in a read
            process::exit(0);
        }) {
            warn!("Failed to install Ctrl+C handler: {}", e);
        }

        let watcher = Arc::new(Watcher::new(pool, dispatcher));
        let handle = match watcher.start(running.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to start watcher thread: {}", e);
                process::exit(1);
            }
        };

        run_stdin_loop(&bridge, &running);
        running.store(false, Ordering::SeqCst);
        // The watcher may be blocked in an idle call; don't wait for it
        drop(handle);
        info!("Exiting application");
        return;
    }

    run_mqtt(config, pool, dispatcher, executor, running);
}

#[cfg(feature = "mqtt")]
fn run_mqtt(
    config: BridgeConfig,
    pool: Arc<ConnectionPool<MpdConnector>>,
    dispatcher: Arc<ChangeDispatcher>,
    executor: Arc<dyn CommandHandler>,
    running: Arc<AtomicBool>,
) {
    use mpdbridge::bridge::mqtt::MqttBus;
    use mpdbridge::bridge::queued::{QueuedBus, DEFAULT_QUEUE_CAPACITY};

    let (mqtt, event_loop) = MqttBus::connect(&config.mqtt);
    let bus: Arc<dyn BusClient> = match QueuedBus::new(Arc::new(mqtt.clone()), DEFAULT_QUEUE_CAPACITY) {
        Ok(queued) => Arc::new(queued),
        Err(e) => {
            error!("Failed to start bus publisher thread: {}", e);
            process::exit(1);
        }
    };
    let bridge = Bridge::new(bus.clone(), &config.topics, &dispatcher, executor);
    if let Err(e) = bridge.subscriptions().subscribe_all(bus.as_ref()) {
        error!("Failed to subscribe: {}", e);
    }

    let r = running.clone();
    let shutdown_bus = mqtt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down");
        r.store(false, Ordering::SeqCst);
        shutdown_bus.disconnect();
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let watcher = Arc::new(Watcher::new(pool, dispatcher));
    if let Err(e) = watcher.start(running.clone()) {
        error!("Failed to start watcher thread: {}", e);
        process::exit(1);
    }

    event_loop.run(bridge.subscriptions().clone(), running);
    info!("Exiting application");
}

#[cfg(not(feature = "mqtt"))]
fn run_mqtt(
    _config: BridgeConfig,
    _pool: Arc<ConnectionPool<MpdConnector>>,
    _dispatcher: Arc<ChangeDispatcher>,
    _executor: Arc<dyn CommandHandler>,
    _running: Arc<AtomicBool>,
) {
    error!("Built without MQTT support; use --dry-run");
    process::exit(1);
}
