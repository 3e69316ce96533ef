//! Normalized progress events.
//!
//! Engines report progress in their own vocabulary. Adapters translate each
//! native notification into an [`EventData`] and hand it to an
//! [`EventEmitter`], which forwards it to the caller's listener.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

pub const EVENT_TYPE: &str = "event_type";
pub const BACKEND: &str = "backend";
pub const PRIMAL_BOUND: &str = "primalbound";
pub const DUAL_BOUND: &str = "dualbound";
pub const GAP: &str = "gap";

const UNIVERSAL_KEYS: [&str; 5] = [EVENT_TYPE, BACKEND, PRIMAL_BOUND, DUAL_BOUND, GAP];

/// Relative gap in percent between a primal and a dual bound.
///
/// The denominator is padded with `f64::EPSILON`, so a zero primal bound
/// still yields a finite value.
pub fn progress_gap(primal_bound: f64, dual_bound: f64) -> f64 {
    100.0 * (dual_bound - primal_bound).abs() / (f64::EPSILON + primal_bound.abs())
}

/// A single event field value
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl EventValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EventValue::Float(v) => Some(*v),
            EventValue::Int(v) => Some(*v as f64),
            EventValue::Str(_) => None,
        }
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Str(s) => f.write_str(s),
            EventValue::Int(v) => write!(f, "{}", v),
            EventValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::Str(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        EventValue::Str(value)
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        EventValue::Int(value)
    }
}

impl From<i32> for EventValue {
    fn from(value: i32) -> Self {
        EventValue::Int(i64::from(value))
    }
}

impl From<usize> for EventValue {
    fn from(value: usize) -> Self {
        EventValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        EventValue::Float(value)
    }
}

/// Key/value payload of one progress event
///
/// Always carries `event_type` and `backend`. Bound events additionally carry
/// `primalbound`, `dualbound` and `gap`, all set together by
/// [`with_bounds`](Self::with_bounds).
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    fields: BTreeMap<String, EventValue>,
}

impl EventData {
    pub fn new(event_type: impl Into<String>, backend: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(EVENT_TYPE.to_string(), EventValue::Str(event_type.into()));
        fields.insert(BACKEND.to_string(), EventValue::Str(backend.into()));
        Self { fields }
    }

    /// Attach primal/dual bounds and the gap derived from them.
    pub fn with_bounds(mut self, primal_bound: f64, dual_bound: f64) -> Self {
        self.fields
            .insert(PRIMAL_BOUND.to_string(), EventValue::Float(primal_bound));
        self.fields
            .insert(DUAL_BOUND.to_string(), EventValue::Float(dual_bound));
        self.fields.insert(
            GAP.to_string(),
            EventValue::Float(progress_gap(primal_bound, dual_bound)),
        );
        self
    }

    /// Add an engine-specific field.
    ///
    /// Universal keys are owned by the bridge; an attempt to set one here is
    /// ignored and `false` is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EventValue>) -> bool {
        let key = key.into();
        if UNIVERSAL_KEYS.contains(&key.as_str()) {
            return false;
        }
        self.fields.insert(key, value.into());
        true
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&EventValue> {
        self.fields.get(key)
    }

    pub fn event_type(&self) -> &str {
        self.get(EVENT_TYPE).and_then(EventValue::as_str).unwrap_or_default()
    }

    pub fn backend(&self) -> &str {
        self.get(BACKEND).and_then(EventValue::as_str).unwrap_or_default()
    }

    pub fn gap(&self) -> Option<f64> {
        self.get(GAP).and_then(EventValue::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Listener receiving normalized events
pub type EventCallback = Arc<dyn Fn(&EventData) + Send + Sync>;

/// Shared handle through which an adapter publishes events
///
/// Clones share the same listener slot, so a clone can be moved into an
/// engine callback running on another thread. Deliveries are serialized: the
/// listener never runs twice at the same time, and it must not call back into
/// the emitter.
#[derive(Clone, Default)]
pub struct EventEmitter {
    slot: Arc<ListenerSlot>,
}

#[derive(Default)]
struct ListenerSlot {
    listener: Mutex<Option<EventCallback>>,
    // Mirrors `listener.is_some()`; written only while `listener` is locked.
    present: AtomicBool,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback(&self, callback: Option<EventCallback>) {
        let mut listener = self.slot.listener.lock();
        self.slot.present.store(callback.is_some(), Ordering::Release);
        *listener = callback;
    }

    /// Never waits for a delivery in progress.
    pub fn has_listener(&self) -> bool {
        self.slot.present.load(Ordering::Acquire)
    }

    pub fn emit(&self, event: EventData) {
        self.emit_with(|| event);
    }

    /// Build and deliver an event. `build` only runs when a listener is set.
    pub fn emit_with(&self, build: impl FnOnce() -> EventData) {
        if !self.has_listener() {
            return;
        }
        let guard = self.slot.listener.lock();
        let Some(listener) = guard.as_ref() else {
            return;
        };

        let event = build();
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
        if delivered.is_err() {
            warn!(
                component = "events",
                operation = "emit",
                status = "error",
                event_type = event.event_type(),
                backend = event.backend(),
                "Event listener panicked; event dropped"
            );
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("has_listener", &self.has_listener())
            .finish()
    }
}
