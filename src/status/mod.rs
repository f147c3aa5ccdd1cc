use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::set::Set;
use crate::{IdentifierHandle, OperationHandle};


/// Model operating state.
///
/// Transitions are driven by the embedder's lifecycle calls and by workers
/// reaching safepoints; see [`Runtime`][crate::runtime::Runtime].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum State {
    /// Not running; either never started or completed normally.
    Stopped,
    /// Worker threads are executing.
    Active,
    /// An abort was requested and workers are converging on exit.
    Aborting,
    /// Terminated by an abort.
    Aborted,
    /// Paused by a `pause` request or a run-to hit.
    PausedOnUserRequest,
    /// Paused at an operation breakpoint.
    PausedAtOperation,
    /// Paused because an instrumented variable was updated.
    PausedOnVariableUpdate,
}

impl State {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Stopped,
            1 => Self::Active,
            2 => Self::Aborting,
            3 => Self::Aborted,
            4 => Self::PausedOnUserRequest,
            5 => Self::PausedAtOperation,
            _ => Self::PausedOnVariableUpdate,
        }
    }

    /// True for the three paused states.
    pub fn is_paused(self) -> bool {
        matches!(
            self,
            Self::PausedOnUserRequest | Self::PausedAtOperation | Self::PausedOnVariableUpdate
        )
    }
}

/// Why a run terminated in [`State::Aborted`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AbortReason {
    /// The run has not aborted.
    None,
    /// The embedder called `abort`.
    UserRequest,
    /// A model-side allocation failed.
    MemoryAllocationError,
    /// Uncategorized runtime failure.
    System,
    InvalidNumericValue,
    NumericOverflow,
    NumericUnderflow,
    DivisionByZero,
    NonConvergence,
}

/// Output device addressable from model code through
/// [`ThreadContext::send_to_device`][crate::thread::ThreadContext::send_to_device].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Device {
    Audio,
    Display,
}

/// Complex scalar carried in [`Value`] payloads.
///
/// Comparison and hashing follow the bit patterns of the parts, matching
/// the treatment of [`Value::Real`].
#[derive(Clone, Copy, Debug)]
pub struct Complex {
    pub real: f64,
    pub imaginary: f64,
}

impl Complex {
    pub fn new(real: f64, imaginary: f64) -> Self {
        Self { real, imaginary }
    }
}

impl PartialEq for Complex {
    fn eq(&self, other: &Self) -> bool {
        self.real.to_bits() == other.real.to_bits()
            && self.imaginary.to_bits() == other.imaginary.to_bits()
    }
}

impl Eq for Complex {}

impl Hash for Complex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.real.to_bits().hash(state);
        self.imaginary.to_bits().hash(state);
    }
}

impl PartialOrd for Complex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Complex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.real
            .total_cmp(&other.real)
            .then_with(|| self.imaginary.total_cmp(&other.imaginary))
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.imaginary.is_sign_negative() {
            write!(f, "{}{}i", self.real, self.imaginary)
        } else {
            write!(f, "{}+{}i", self.real, self.imaginary)
        }
    }
}

/// Tagged value carried to devices and console sinks.
///
/// This is the runtime's variant type: every payload kind a model can emit
/// travels as one of these, sets and tuples nesting arbitrarily.
#[derive(Clone, Debug)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Complex(Complex),
    Text(String),
    Set(Set<Value>),
    Tuple(Vec<Value>),
}

// Reals compare and hash by bit pattern so `Value` can live in ordered
// containers; NaN payloads are preserved, not collapsed.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Complex(a), Self::Complex(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Boolean(v) => {
                state.write_u8(0);
                v.hash(state);
            }
            Self::Integer(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            Self::Real(v) => {
                state.write_u8(2);
                v.to_bits().hash(state);
            }
            Self::Complex(v) => {
                state.write_u8(3);
                v.hash(state);
            }
            Self::Text(v) => {
                state.write_u8(4);
                v.hash(state);
            }
            Self::Set(v) => {
                state.write_u8(5);
                v.hash(state);
            }
            Self::Tuple(v) => {
                state.write_u8(6);
                v.hash(state);
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Boolean(_) => 0,
                Value::Integer(_) => 1,
                Value::Real(_) => 2,
                Value::Complex(_) => 3,
                Value::Text(_) => 4,
                Value::Set(_) => 5,
                Value::Tuple(_) => 6,
            }
        }

        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Complex(a), Self::Complex(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Set(a), Self::Set(b)) => a.cmp(b),
            (Self::Tuple(a), Self::Tuple(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Complex(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Set(v) => {
                f.write_str("{")?;
                for (i, element) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("}")
            }
            Self::Tuple(v) => {
                f.write_str("(")?;
                for (i, element) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<Complex> for Value {
    fn from(value: Complex) -> Self {
        Self::Complex(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Set<Value>> for Value {
    fn from(value: Set<Value>) -> Self {
        Self::Set(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Tuple(value)
    }
}

/// Event callbacks fired as a model runs.
///
/// Every method has an empty default so embedders override only what they
/// consume. `thread_*` callbacks are invoked on the worker thread itself;
/// the aggregate callbacks (`started`, `finished`, `aborted`, the pause and
/// resume family) on whichever thread performs the state transition.
/// Implementations must therefore be thread-safe.
#[allow(unused_variables)]
pub trait Status: Send + Sync {
    /// The model transitioned to [`State::Active`].
    fn started(&self) {}

    /// Every worker exited normally.
    fn finished(&self) {}

    /// Every worker exited after an abort.
    ///
    /// `operation_handle` is the safepoint where the triggering condition
    /// was detected.
    fn aborted(&self, reason: AbortReason, operation_handle: OperationHandle) {}

    fn paused_on_user_request(&self, operation_handle: OperationHandle) {}

    fn paused_at_operation(&self, operation_handle: OperationHandle) {}

    fn paused_on_variable_update(
        &self,
        operation_handle: OperationHandle,
        identifier_handle: IdentifierHandle,
    ) {
    }

    fn resumed(&self) {}

    fn thread_started(&self, thread_id: u32) {}

    fn thread_paused(&self, thread_id: u32) {}

    fn thread_resumed(&self, thread_id: u32) {}

    fn thread_finished(&self, thread_id: u32) {}

    fn thread_aborted(&self, thread_id: u32) {}

    /// A model thread pushed a value to an output device.
    fn send_to_device(&self, device: Device, value: Value) {}
}
