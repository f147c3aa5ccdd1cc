use thiserror::Error;

use crate::status::AbortReason;

/// Failure raised inside a running model.
///
/// Worker entry points and the safepoint helpers return this type; an `Err`
/// unwinds the worker's call stack through the model body and is translated
/// by the controller into an abort reason and the safepoint where it was
/// detected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The embedder requested an abort and a safepoint observed it.
    #[error("execution aborted on user request")]
    UserAbort,

    /// A distribution or numeric routine received an out-of-domain argument.
    #[error("invalid numeric value")]
    InvalidNumericValue,

    #[error("numeric overflow")]
    NumericOverflow,

    #[error("numeric underflow")]
    NumericUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    /// An iterative numeric routine failed to converge.
    #[error("failed to converge")]
    NonConvergence,

    /// Memory could not be obtained for a model-side structure.
    #[error("memory allocation failed")]
    Allocation,

    /// Catch-all for uncategorized runtime failures raised by user code.
    #[error("system error: {0}")]
    System(String),
}

impl ModelError {
    /// The abort reason reported to the status sink when this error
    /// terminates a run.
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            Self::UserAbort => AbortReason::UserRequest,
            Self::InvalidNumericValue => AbortReason::InvalidNumericValue,
            Self::NumericOverflow => AbortReason::NumericOverflow,
            Self::NumericUnderflow => AbortReason::NumericUnderflow,
            Self::DivisionByZero => AbortReason::DivisionByZero,
            Self::NonConvergence => AbortReason::NonConvergence,
            Self::Allocation => AbortReason::MemoryAllocationError,
            Self::System(_) => AbortReason::System,
        }
    }
}
