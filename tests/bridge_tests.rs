//! Integration tests driving the watcher, dispatcher, executor and bridge
//! against a scripted backend and the in-memory bus

#[path = "common/mod.rs"]
mod common;
use common::*;
use mpdbridge::bridge::{Bridge, BusClient, QueuedBus, TopicScheme};
use mpdbridge::data::{ChangePolicy, PlayerSnapshots, Value};
use mpdbridge::error::{BridgeError, BridgeResult};
use mpdbridge::players::{
    ChangeDispatcher, CommandExecutor, CommandHandler, ConnectionPool, Favourite, PoolSettings, Watcher,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(t, p)| (t.to_string(), p.to_string())).collect()
}

fn baseline_messages() -> Vec<(String, String)> {
    pairs(&[
        ("MPD/song/artist", "Y"),
        ("MPD/song/file", "music/x.flac"),
        ("MPD/song/time", "180"),
        ("MPD/song/title", "X"),
        ("MPD/player/state", "play"),
        ("MPD/player/elapsed", "12.000"),
        ("MPD/player/volume", "40"),
        ("MPD/player/repeat", "0"),
        ("MPD/player/random", "0"),
        ("MPD/player/single", "0"),
    ])
}

#[test]
fn test_baseline_refresh_publishes_everything() {
    let harness = Harness::playing();

    assert_eq!(harness.watcher.refresh().unwrap(), 6);
    assert_eq!(harness.bus.published(), baseline_messages());
}

#[test]
fn test_refresh_publishes_only_changes() {
    let harness = Harness::playing();
    harness.watcher.refresh().unwrap();
    harness.bus.take_published();

    harness.backend.set_status("volume", Value::Int(57));
    assert_eq!(harness.watcher.refresh().unwrap(), 1);
    assert_eq!(harness.bus.published(), pairs(&[("MPD/player/volume", "57")]));

    // Nothing changed since
    assert_eq!(harness.watcher.refresh().unwrap(), 0);
    assert_eq!(harness.bus.published().len(), 1);
}

#[test]
fn test_file_change_alone_is_not_a_song_change() {
    let harness = Harness::playing();
    harness.watcher.refresh().unwrap();
    harness.bus.take_published();

    harness.backend.set_item("file", Value::from("music/other.flac"));
    assert_eq!(harness.watcher.refresh().unwrap(), 0);
    assert!(harness.bus.published().is_empty());
}

#[test]
fn test_title_change_publishes_song_attributes() {
    let harness = Harness::playing();
    harness.watcher.refresh().unwrap();
    harness.bus.take_published();

    harness.backend.set_item("title", Value::from("Z"));
    harness.backend.set_item("album", Value::from("W"));
    harness.backend.set_item("name", Value::from("not published"));
    assert_eq!(harness.watcher.refresh().unwrap(), 1);
    assert_eq!(harness.published_topics(), vec![
        "MPD/song/album",
        "MPD/song/artist",
        "MPD/song/file",
        "MPD/song/time",
        "MPD/song/title",
    ]);
    assert_eq!(harness.bus.last_payload("MPD/song/title"), Some("Z".to_string()));
}

#[test]
fn test_stop_skips_vanished_elapsed() {
    let harness = Harness::playing();
    harness.watcher.refresh().unwrap();
    harness.bus.take_published();

    harness.backend.set_status("state", Value::from("stop"));
    harness.backend.remove_status("elapsed");
    assert_eq!(harness.watcher.refresh().unwrap(), 1);
    assert_eq!(harness.bus.published(), pairs(&[("MPD/player/state", "stop")]));
}

#[test]
fn test_status_failure_still_dispatches_item_changes() {
    let harness = Harness::playing();
    harness.backend.state().fail_status = true;

    assert!(harness.watcher.refresh().is_err());
    assert_eq!(harness.published_topics(), vec![
        "MPD/song/artist",
        "MPD/song/file",
        "MPD/song/time",
        "MPD/song/title",
    ]);

    harness.backend.state().fail_status = false;
    harness.bus.take_published();
    assert_eq!(harness.watcher.refresh().unwrap(), 5);
}

#[test]
#[serial]
fn test_watcher_survives_wait_errors() {
    let harness = Harness::playing();
    harness.backend.state().fail_wait = true;

    let running = Arc::new(AtomicBool::new(true));
    let handle = harness.watcher.clone().start(running.clone()).unwrap();

    let backend = harness.backend.clone();
    assert!(wait_until(Duration::from_secs(5), || backend.state().status_queries >= 3));
    assert!(wait_until(Duration::from_secs(5), || {
        harness.bus.last_payload("MPD/player/state") == Some("play".to_string())
    }));

    harness.backend.set_status("volume", Value::Int(57));
    assert!(wait_until(Duration::from_secs(5), || {
        harness.bus.last_payload("MPD/player/volume") == Some("57".to_string())
    }));

    running.store(false, Ordering::SeqCst);
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_watcher_stops_when_flag_cleared() {
    let harness = Harness::playing();
    let running = Arc::new(AtomicBool::new(true));
    let handle = harness.watcher.clone().start(running.clone()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !harness.bus.published().is_empty()));
    running.store(false, Ordering::SeqCst);
    handle.join().unwrap();

    let queries = harness.backend.state().status_queries;
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.backend.state().status_queries, queries);
}

#[test]
fn test_invalid_volume_makes_no_backend_call() {
    let harness = Harness::playing();

    assert!(matches!(
        harness.send("MPD/CMD/volume", "abc"),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(harness.backend.calls().is_empty());

    harness.send("MPD/CMD/volume", "57").unwrap();
    assert_eq!(harness.backend.calls(), vec!["set_volume(57)"]);
}

#[test]
fn test_volume_is_clamped() {
    let harness = Harness::playing();
    harness.send("MPD/CMD/volume", "150").unwrap();
    harness.send("MPD/CMD/volume", "-3").unwrap();
    assert_eq!(harness.backend.calls(), vec!["set_volume(100)", "set_volume(0)"]);
}

#[test]
fn test_player_commands() {
    let harness = Harness::playing();
    for payload in ["play", "PAUSE", "stop", "stop after", "next"] {
        harness.send("MPD/CMD", payload).unwrap();
    }
    assert_eq!(harness.backend.calls(), vec![
        "play(single=false)",
        "pause",
        "stop",
        "single(true)",
        "next",
    ]);
}

#[test]
fn test_unknown_command_is_dropped() {
    let harness = Harness::playing();
    assert!(matches!(harness.send("MPD/CMD", "rewind"), Err(BridgeError::InvalidArgument(_))));
    assert!(harness.backend.calls().is_empty());

    // Unrouted topics are ignored
    harness.send("MPD/player/state", "play").unwrap();
    assert!(harness.backend.calls().is_empty());
}

#[test]
fn test_play_favourite_switches_to_first_match() {
    let harness = Harness::with_favourite(Favourite::new("name", "Radio Paradise"));
    {
        let mut state = harness.backend.state();
        state.queue.push(QueueEntry::new(1, "music/a.flac", &[("title", "A")]));
        state.queue.push(QueueEntry::new(7, "http://stream.example/rp", &[("name", "Radio Paradise")]));
        state.queue.push(QueueEntry::new(9, "http://stream.example/rp2", &[("name", "Radio Paradise")]));
    }

    harness.send("MPD/CMD", "fav").unwrap();
    assert_eq!(harness.backend.calls(), vec!["consume(false)", "play_item(7)"]);
}

#[test]
fn test_play_favourite_without_match() {
    let harness = Harness::with_favourite(Favourite::new("name", "Radio Paradise"));
    harness.backend.state().queue.push(QueueEntry::new(1, "music/a.flac", &[("name", "Other")]));

    harness.send("MPD/CMD", "fav").unwrap();
    assert!(harness.backend.calls().is_empty());
}

#[test]
fn test_play_favourite_unconfigured() {
    let harness = Harness::new();
    harness.send("MPD/CMD", "fav").unwrap();
    assert!(harness.backend.calls().is_empty());
    assert_eq!(harness.backend.state().connects, 0);
}

#[test]
fn test_query_republishes_current_state() {
    let harness = Harness::playing();
    harness.watcher.refresh().unwrap();
    harness.bus.take_published();

    harness.send("MPD/CMD", "query").unwrap();
    assert_eq!(harness.bus.take_published(), baseline_messages());

    harness.send("MPD/CMD", "Query").unwrap();
    assert_eq!(harness.bus.published().len(), 10);
    assert!(harness.backend.calls().is_empty());
}

#[test]
fn test_query_before_first_refresh_publishes_nothing() {
    let harness = Harness::playing();
    harness.send("MPD/CMD", "query").unwrap();
    assert!(harness.bus.published().is_empty());
}

#[test]
fn test_unreachable_backend_uses_retry_budget() {
    let harness = Harness::playing();
    harness.backend.state().fail_connect = true;

    match harness.send("MPD/CMD", "play") {
        Err(BridgeError::BackendUnavailable { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected BackendUnavailable, got {:?}", other),
    }
    assert_eq!(harness.backend.state().connects, 3);
    assert!(harness.backend.calls().is_empty());

    harness.backend.state().fail_connect = false;
    harness.send("MPD/CMD", "play").unwrap();
    assert_eq!(harness.backend.calls(), vec!["play(single=false)"]);
}

#[test]
fn test_connections_are_reused() {
    let harness = Harness::playing();
    harness.watcher.refresh().unwrap();
    harness.send("MPD/CMD", "play").unwrap();
    harness.send("MPD/CMD/volume", "20").unwrap();
    assert_eq!(harness.backend.state().connects, 1);
}

#[test]
fn test_dropped_bridge_stops_publishing() {
    let Harness { backend, bus, dispatcher, watcher, bridge, .. } = Harness::playing();
    assert_eq!(dispatcher.sink_count(), 1);

    drop(bridge);
    assert_eq!(dispatcher.sink_count(), 0);

    backend.set_status("volume", Value::Int(10));
    watcher.refresh().unwrap();
    assert!(bus.published().is_empty());
}

/// Bus whose publishes hang until the gate is opened
#[derive(Default)]
struct StalledBus {
    open: Mutex<bool>,
    published: AtomicUsize,
}

impl StalledBus {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
    }
}

impl BusClient for StalledBus {
    fn publish(&self, _topic: &str, _payload: &str) -> BridgeResult<()> {
        while !*self.open.lock().unwrap() {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self, _topic: &str) -> BridgeResult<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn test_refresh_returns_while_bus_is_stalled() {
    let harness = Harness::playing();
    let pool = Arc::new(ConnectionPool::with_settings(
        harness.backend.clone(),
        PoolSettings::new(3, Duration::from_millis(1)),
    ));
    let dispatcher = Arc::new(ChangeDispatcher::new(PlayerSnapshots::shared(ChangePolicy::Strict)));
    let handler: Arc<dyn CommandHandler> = Arc::new(CommandExecutor::new(pool.clone(), dispatcher.clone()));
    let watcher = Watcher::new(pool, dispatcher.clone());

    let stalled = Arc::new(StalledBus::default());
    let queued: Arc<dyn BusClient> = Arc::new(QueuedBus::new(stalled.clone(), 2).unwrap());
    let _bridge = Bridge::new(queued, &TopicScheme::new("MPD"), &dispatcher, handler);

    // Ten messages against a queue of two and a bus that never returns
    let started = Instant::now();
    assert_eq!(watcher.refresh().unwrap(), 6);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stalled.published.load(Ordering::SeqCst), 0);

    stalled.open();
    assert!(wait_until(Duration::from_secs(5), || stalled.published.load(Ordering::SeqCst) >= 1));
    std::thread::sleep(Duration::from_millis(50));
    assert!(stalled.published.load(Ordering::SeqCst) <= 3);
}
