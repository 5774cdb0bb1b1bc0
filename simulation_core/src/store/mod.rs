//! The state store - owner of the single authoritative state tree.
//!
//! The tree is a nested JSON value addressed by key paths. Callers outside this
//! module should prefer the typed accessors ([`StateStore::resources`],
//! [`StateStore::record_decision`], ...) over raw paths.
//!
//! Every write publishes `state-changed` on the bus. Writes only reach the storage
//! backend when asked to; storage failures are logged and never surface.

mod persistence;

pub use persistence::*;

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use scenario_rules::{
    ChoiceId, DecisionId, EventId, HiddenDebt, OutcomeSummary, PhaseHistoryRecord, PhaseId,
    Relationships, Resources, StateTree,
};

use crate::error::StorageError;
use crate::events::{EventBus, SimEvent};

/// Key paths of the well-known sub-trees.
pub mod paths {
    pub const USER: &[&str] = &["user"];
    pub const RESOURCES: &[&str] = &["resources"];
    pub const DECISIONS: &[&str] = &["decisions"];
    pub const EVENT_CHOICES: &[&str] = &["eventChoices"];
    pub const RELATIONSHIPS: &[&str] = &["relationships"];
    pub const HIDDEN_DEBT: &[&str] = &["hiddenDebt"];
    pub const OUTCOMES: &[&str] = &["outcomes"];
    pub const CURRENT_PHASE: &[&str] = &["session", "currentPhase"];
    pub const ACTIVE_EVENT: &[&str] = &["session", "activeEvent"];
    pub const SEEN_EVENTS: &[&str] = &["session", "seenEvents"];
    pub const PHASE_HISTORY: &[&str] = &["session", "phaseHistory"];
}

/// What a reset restores.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDefaults {
    pub version: String,
    pub resources: Resources,
}

impl Default for StateDefaults {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            resources: Resources::default(),
        }
    }
}

impl StateDefaults {
    fn build(&self) -> Value {
        let tree = StateTree::new(self.version.clone(), self.resources.clone());
        serde_json::to_value(tree).unwrap_or_else(|e| {
            warn!(error = %e, "default state failed to serialize");
            Value::Object(Map::new())
        })
    }
}

/// Owner of the state tree.
pub struct StateStore {
    tree: RefCell<Value>,
    defaults: StateDefaults,
    bus: EventBus,
    storage: Option<Box<dyn StorageBackend>>,
    storage_key: String,
}

impl StateStore {
    /// Create a store holding a fresh default tree, without persistence.
    pub fn new(bus: EventBus, defaults: StateDefaults) -> Self {
        Self {
            tree: RefCell::new(defaults.build()),
            defaults,
            bus,
            storage: None,
            storage_key: "workshop-simulation-state".to_string(),
        }
    }

    /// Attach a storage backend; the whole tree is saved under `key`.
    pub fn with_storage(mut self, storage: Box<dyn StorageBackend>, key: impl Into<String>) -> Self {
        self.storage = Some(storage);
        self.storage_key = key.into();
        self
    }

    /// Read the value at `path`, or `default` if any key along the way is missing.
    pub fn get(&self, path: &[&str], default: Value) -> Value {
        read_path(&self.tree.borrow(), path)
            .cloned()
            .unwrap_or(default)
    }

    /// Write `value` at `path`, creating intermediate objects as needed.
    ///
    /// Publishes `state-changed` before returning, then saves if `persist`.
    /// An empty path replaces the whole tree, which must then be an object.
    pub fn set(&self, path: &[&str], value: Value, persist: bool) {
        if path.is_empty() && !value.is_object() {
            warn!("refusing to replace the state tree with a non-object value");
            return;
        }

        write_path(&mut self.tree.borrow_mut(), path, value.clone());

        self.bus.publish(SimEvent::StateChanged {
            path: path.iter().map(|k| k.to_string()).collect(),
            value,
        });

        if persist {
            self.save();
        }
    }

    /// Replace the tree with fresh defaults and publish `state-reset`.
    pub fn reset(&self, persist: bool) {
        self.reset_with(None, persist);
    }

    /// Like [`StateStore::reset`], but carries the `user` sub-tree over.
    pub fn reset_keeping_user(&self, persist: bool) {
        let user = self.get(paths::USER, Value::Object(Map::new()));
        self.reset_with(Some(user), persist);
    }

    fn reset_with(&self, user: Option<Value>, persist: bool) {
        let mut fresh = self.defaults.build();
        if let Some(user) = user {
            write_path(&mut fresh, paths::USER, user);
        }
        *self.tree.borrow_mut() = fresh;
        info!("state reset to defaults");

        self.bus.publish(SimEvent::StateReset {
            timestamp: Utc::now(),
        });

        if persist {
            self.save();
        }
    }

    /// Deep copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.tree.borrow().clone()
    }

    /// Replace the tree with a previously taken snapshot.
    pub fn restore(&self, snapshot: Value, persist: bool) {
        self.set(&[], snapshot, persist);
    }

    /// Typed view of the whole tree, if it still matches the schema.
    pub fn tree(&self) -> Option<StateTree> {
        self.read(&[])
    }

    /// Replace the tree with the stored document, if there is a usable one.
    ///
    /// Returns false and keeps the current tree when nothing is stored or the
    /// document cannot be read.
    pub fn load(&self) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };

        let loaded = storage.load(&self.storage_key).and_then(|text| {
            text.map(|t| serde_json::from_str::<Value>(&t))
                .transpose()
                .map_err(StorageError::from)
        });

        match loaded {
            Ok(Some(value)) if value.is_object() => {
                *self.tree.borrow_mut() = value;
                info!(key = %self.storage_key, "restored persisted state");
                true
            }
            Ok(Some(_)) => {
                warn!(key = %self.storage_key, "persisted state is not an object, using defaults");
                false
            }
            Ok(None) => {
                debug!(key = %self.storage_key, "no persisted state");
                false
            }
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "failed to load persisted state, using defaults");
                false
            }
        }
    }

    /// Write the whole tree to storage. Returns false on failure or without a backend.
    pub fn save(&self) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };

        let result = serde_json::to_string(&*self.tree.borrow())
            .map_err(StorageError::from)
            .and_then(|text| storage.save(&self.storage_key, &text));

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "failed to persist state");
                false
            }
        }
    }

    /// Deserialize the sub-tree at `path`. Schema mismatches are logged.
    pub fn read<T: DeserializeOwned>(&self, path: &[&str]) -> Option<T> {
        let tree = self.tree.borrow();
        let value = read_path(&tree, path)?;
        match T::deserialize(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(path = %path.join("."), error = %e, "state sub-tree does not match its schema");
                None
            }
        }
    }

    /// Serialize and write a typed value at `path`.
    pub fn write<T: Serialize>(&self, path: &[&str], value: &T, persist: bool) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(path, json, persist),
            Err(e) => warn!(path = %path.join("."), error = %e, "failed to serialize state value"),
        }
    }

    // Typed accessors, one per logical sub-tree.

    pub fn resources(&self) -> Resources {
        self.read(paths::RESOURCES).unwrap_or_default()
    }

    pub fn set_resources(&self, resources: &Resources, persist: bool) {
        self.write(paths::RESOURCES, resources, persist);
    }

    pub fn decisions(&self) -> BTreeMap<DecisionId, ChoiceId> {
        self.read(paths::DECISIONS).unwrap_or_default()
    }

    /// Record the choice taken for a decision, replacing any earlier one.
    pub fn record_decision(&self, decision: &DecisionId, choice: &ChoiceId) {
        self.set(
            &["decisions", decision.as_str()],
            Value::String(choice.to_string()),
            false,
        );
    }

    pub fn event_choices(&self) -> BTreeMap<EventId, ChoiceId> {
        self.read(paths::EVENT_CHOICES).unwrap_or_default()
    }

    pub fn record_event_choice(&self, event: &EventId, choice: &ChoiceId) {
        self.set(
            &["eventChoices", event.as_str()],
            Value::String(choice.to_string()),
            false,
        );
    }

    pub fn relationships(&self) -> Relationships {
        self.read(paths::RELATIONSHIPS).unwrap_or_default()
    }

    pub fn set_relationships(&self, relationships: &Relationships, persist: bool) {
        self.write(paths::RELATIONSHIPS, relationships, persist);
    }

    pub fn hidden_debt(&self) -> HiddenDebt {
        self.read(paths::HIDDEN_DEBT).unwrap_or_default()
    }

    pub fn set_hidden_debt(&self, debt: &HiddenDebt, persist: bool) {
        self.write(paths::HIDDEN_DEBT, debt, persist);
    }

    pub fn current_phase(&self) -> Option<PhaseId> {
        self.read::<Option<PhaseId>>(paths::CURRENT_PHASE).flatten()
    }

    pub fn set_current_phase(&self, phase: &PhaseId, persist: bool) {
        self.write(paths::CURRENT_PHASE, phase, persist);
    }

    pub fn active_event(&self) -> Option<EventId> {
        self.read::<Option<EventId>>(paths::ACTIVE_EVENT).flatten()
    }

    pub fn set_active_event(&self, event: Option<&EventId>) {
        self.write(paths::ACTIVE_EVENT, &event, false);
    }

    pub fn seen_events(&self) -> Vec<EventId> {
        self.read(paths::SEEN_EVENTS).unwrap_or_default()
    }

    pub fn has_seen(&self, event: &EventId) -> bool {
        self.seen_events().contains(event)
    }

    /// Add an event to the seen set. Returns false if it was already there.
    pub fn mark_event_seen(&self, event: &EventId) -> bool {
        let mut seen = self.seen_events();
        if seen.contains(event) {
            return false;
        }
        seen.push(event.clone());
        self.write(paths::SEEN_EVENTS, &seen, false);
        true
    }

    pub fn phase_history(&self) -> Vec<PhaseHistoryRecord> {
        self.read(paths::PHASE_HISTORY).unwrap_or_default()
    }

    pub fn push_phase_history(&self, record: PhaseHistoryRecord) {
        let mut history = self.phase_history();
        history.push(record);
        self.write(paths::PHASE_HISTORY, &history, false);
    }

    pub fn outcomes(&self) -> Option<OutcomeSummary> {
        self.read::<Option<OutcomeSummary>>(paths::OUTCOMES).flatten()
    }

    pub fn set_outcomes(&self, outcomes: &OutcomeSummary, persist: bool) {
        self.write(paths::OUTCOMES, outcomes, persist);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

fn read_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(*key))
}

fn write_path(root: &mut Value, path: &[&str], value: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for key in parents {
        node = as_object(node)
            .entry(key.to_string())
            .or_insert(Value::Null);
    }
    as_object(node).insert(leaf.to_string(), value);
}

/// View `node` as an object, replacing it with an empty one if it is anything else.
fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
