//! Structured per-thread message stream to an embedder-provided callback.
//!
//! Model code and the runtime itself report through this sink; the embedder
//! registers one process-wide callback and routes messages to its UI or
//! logs. A message is a `start_message` / payload items / `end_message`
//! bracket; formatting modifiers travel as payload items and adjust the
//! sink's per-thread formatting state until the message ends. The callback
//! may be invoked from any thread concurrently and must self-serialize;
//! this component does no locking around message delivery.

use std::sync::{Arc, RwLock};

use crate::set::{Set, SetValue};
use crate::status::{Complex, Value};


/// Thread id used for messages not tied to any model thread.
pub const NO_THREAD: u32 = u32::MAX;

/// Classification of a console message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageType {
    /// Operational status, e.g. threads starting and stopping.
    Information,
    Data,
    Debug,
    BuildWarning,
    BuildError,
    RuntimeWarning,
    RuntimeError,
}

/// Formatting state adjustments, delivered in-line with the payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Modifier {
    /// Numeric base for subsequent integers.
    Base(u8),
    /// Minimum field width for subsequent items.
    Width(u32),
    /// Pad character used to reach the field width.
    Pad(char),
    UpperCase,
    LowerCase,
    ResetCase,
}

/// Receiver of console messages.
///
/// Typed append methods default to rendering through
/// [`append_text`][Self::append_text]; sinks that track formatting state
/// override them.
#[allow(unused_variables)]
pub trait Callback: Send + Sync {
    /// Called when a model starts, before any worker reports.
    fn initialize(&self, number_threads: u32) {}

    /// Whether the sink wants this message. When false, the payload and
    /// `end_message` are skipped.
    fn start_message(&self, thread_id: u32, message_type: MessageType) -> bool;

    fn end_message(&self, thread_id: u32);

    fn append_text(&self, thread_id: u32, text: &str);

    fn append_boolean(&self, thread_id: u32, value: bool) {
        self.append_text(thread_id, if value { "true" } else { "false" });
    }

    fn append_i32(&self, thread_id: u32, value: i32) {
        self.append_text(thread_id, &value.to_string());
    }

    fn append_u32(&self, thread_id: u32, value: u32) {
        self.append_text(thread_id, &value.to_string());
    }

    fn append_i64(&self, thread_id: u32, value: i64) {
        self.append_text(thread_id, &value.to_string());
    }

    fn append_u64(&self, thread_id: u32, value: u64) {
        self.append_text(thread_id, &value.to_string());
    }

    fn append_real(&self, thread_id: u32, value: f64) {
        self.append_text(thread_id, &value.to_string());
    }

    fn append_complex(&self, thread_id: u32, value: Complex) {
        self.append_text(thread_id, &value.to_string());
    }

    fn append_set(&self, thread_id: u32, value: &Set<Value>) {
        self.append_text(thread_id, &Value::Set(value.clone()).to_string());
    }

    fn append_tuple(&self, thread_id: u32, value: &[Value]) {
        self.append_text(thread_id, &Value::Tuple(value.to_vec()).to_string());
    }

    /// Dispatch a variant to the append method for its kind.
    fn append_variant(&self, thread_id: u32, value: &Value) {
        match value {
            Value::Boolean(v) => self.append_boolean(thread_id, *v),
            Value::Integer(v) => self.append_i64(thread_id, *v),
            Value::Real(v) => self.append_real(thread_id, *v),
            Value::Complex(v) => self.append_complex(thread_id, *v),
            Value::Text(v) => self.append_text(thread_id, v),
            Value::Set(v) => self.append_set(thread_id, v),
            Value::Tuple(v) => self.append_tuple(thread_id, v),
        }
    }

    fn append_modifier(&self, thread_id: u32, modifier: Modifier) {}
}

/// One console payload item.
pub trait Payload {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32);
}

impl Payload for &str {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_text(thread_id, self);
    }
}

impl Payload for String {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_text(thread_id, self);
    }
}

impl Payload for bool {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_boolean(thread_id, *self);
    }
}

impl Payload for i32 {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_i32(thread_id, *self);
    }
}

impl Payload for u32 {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_u32(thread_id, *self);
    }
}

impl Payload for i64 {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_i64(thread_id, *self);
    }
}

impl Payload for u64 {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_u64(thread_id, *self);
    }
}

impl Payload for f64 {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_real(thread_id, *self);
    }
}

impl Payload for Complex {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_complex(thread_id, *self);
    }
}

impl<T: SetValue + Into<Value>> Payload for Set<T> {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        let elements: Set<Value> = self.iter().cloned().map(Into::into).collect();
        callback.append_set(thread_id, &elements);
    }
}

impl Payload for [Value] {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_tuple(thread_id, self);
    }
}

impl Payload for Vec<Value> {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_tuple(thread_id, self);
    }
}

impl Payload for Modifier {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_modifier(thread_id, *self);
    }
}

impl Payload for Value {
    fn append_to(&self, callback: &dyn Callback, thread_id: u32) {
        callback.append_variant(thread_id, self);
    }
}

static REGISTRY: RwLock<Option<Arc<dyn Callback>>> = RwLock::new(None);

/// Install the process-wide console callback.
pub fn register_callback(callback: Arc<dyn Callback>) {
    *REGISTRY.write().expect("console registry") = Some(callback);
}

/// Remove the process-wide console callback.
pub fn release_callback() {
    *REGISTRY.write().expect("console registry") = None;
}

/// The currently registered callback, if any. Worker threads cache this at
/// startup so reporting does not touch the registry lock.
pub fn callback() -> Option<Arc<dyn Callback>> {
    REGISTRY.read().expect("console registry").clone()
}

/// Deliver one message to a specific callback.
pub fn report_to(
    callback: &dyn Callback,
    thread_id: u32,
    message_type: MessageType,
    items: &[&dyn Payload],
) {
    if !callback.start_message(thread_id, message_type) {
        return;
    }
    for item in items {
        item.append_to(callback, thread_id);
    }
    callback.end_message(thread_id);
}

/// Deliver one message to the registered callback, if any.
pub fn report(thread_id: u32, message_type: MessageType, items: &[&dyn Payload]) {
    if let Some(callback) = callback() {
        report_to(callback.as_ref(), thread_id, message_type, items);
    }
}

/// Report a message through the process console.
///
/// ```ignore
/// report!(thread_id, MessageType::Information, "Starting thread ", thread_id, ".");
/// ```
#[macro_export]
macro_rules! report {
    ($thread:expr, $ty:expr $(, $item:expr)* $(,)?) => {
        $crate::console::report($thread, $ty, &[$(&$item),*])
    };
}
