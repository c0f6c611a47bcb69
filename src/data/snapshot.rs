use crate::data::Value;
use crate::error::{BridgeError, BridgeResult};
use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use log::trace;

/// Rule deciding whether a write counts as a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangePolicy {
    /// A write is a change when the new value differs from the stored one
    #[default]
    Strict,

    /// Compatibility mode: a falsy stored value (0, false, "") is always
    /// reported as changed, even when the new value is identical
    Truthy,
}

impl ChangePolicy {
    fn is_change(&self, old: Option<&Value>, new: &Value) -> bool {
        match (self, old) {
            (_, None) => true,
            (ChangePolicy::Strict, Some(old)) => old != new,
            (ChangePolicy::Truthy, Some(old)) => !old.is_truthy() || old != new,
        }
    }
}

/// Attribute map that remembers which keys changed since the last drain
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: BTreeMap<String, Value>,
    pending: BTreeSet<String>,
    policy: ChangePolicy,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ChangePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ChangePolicy {
        self.policy
    }

    /// Store a value, recording the key as pending if it changed
    ///
    /// Returns true if the write was recorded as a change.
    pub fn write(&mut self, key: &str, value: Value) -> bool {
        let changed = self.policy.is_change(self.values.get(key), &value);
        if changed {
            trace!("Attribute '{}' changed to {}", key, value);
            self.pending.insert(key.to_string());
        }
        self.values.insert(key.to_string(), value);
        changed
    }

    /// Write one complete backend response
    ///
    /// Keys held from the previous response but missing from this one are
    /// dropped and reported as changed.
    pub fn replace_all(&mut self, attributes: BTreeMap<String, Value>) {
        let vanished: Vec<String> = self.values.keys()
            .filter(|key| !attributes.contains_key(*key))
            .cloned()
            .collect();

        for key in vanished {
            trace!("Attribute '{}' no longer reported", key);
            self.values.remove(&key);
            self.pending.insert(key);
        }

        for (key, value) in attributes {
            self.write(&key, value);
        }
    }

    /// Return the keys changed since the last drain and reset the set
    pub fn drain_changes(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.pending)
    }

    pub fn read(&self, key: &str) -> BridgeResult<&Value> {
        self.values.get(key)
            .ok_or_else(|| BridgeError::MissingAttribute(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The stored attributes restricted to `keys`, skipping absent ones
    pub fn subset(&self, keys: &[&str]) -> BTreeMap<String, Value> {
        keys.iter()
            .filter_map(|key| self.values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// The two snapshots mirrored from the backend
#[derive(Debug, Clone, Default)]
pub struct PlayerSnapshots {
    /// Player-level attributes (state, elapsed, volume, flags)
    pub status: Snapshot,

    /// Attributes of the now-playing item
    pub item: Snapshot,
}

impl PlayerSnapshots {
    pub fn new(policy: ChangePolicy) -> Self {
        Self {
            status: Snapshot::with_policy(policy),
            item: Snapshot::with_policy(policy),
        }
    }

    /// Snapshots shared between the watcher and the command path
    pub fn shared(policy: ChangePolicy) -> SharedSnapshots {
        Arc::new(Mutex::new(Self::new(policy)))
    }
}

pub type SharedSnapshots = Arc<Mutex<PlayerSnapshots>>;
