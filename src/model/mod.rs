//! The compiled-model interface: up to 32 worker entry points plus the
//! model-authored constants the controller consumes.

use crate::error::ModelError;
use crate::ident::IdentifierDatabase;
use crate::thread::ThreadContext;
use crate::OperationHandle;

/// Maximum number of worker entry points a model can provide.
pub const MAX_THREADS: u32 = 32;

macro_rules! entry_points {
    ($($name:ident: $number:literal),* $(,)?) => {
        $(
            #[doc = concat!(
                "Entry point for thread ", $number,
                ". Override it when [`number_threads`][Self::number_threads] covers it."
            )]
            fn $name(&self, context: &mut ThreadContext) -> Result<(), ModelError> {
                let _ = context;
                Ok(())
            }
        )*
    };
}

/// A compiled user model.
///
/// Implementations override the first [`number_threads`][Self::number_threads]
/// entry points; `t1` is always required. Entry points run concurrently on
/// their own OS threads against a shared `&self`, so per-run outputs live in
/// interior-mutable fields. The sole suspension points are the safepoint
/// calls ([`ThreadContext::check`]) the compiler plants through the body;
/// propagate their error with `?` so pause and abort requests take effect.
pub trait Model: Send + Sync {
    /// Number of worker threads this model runs, at most [`MAX_THREADS`].
    fn number_threads(&self) -> u32;

    /// Count of safepoint operation handles; handles are dense in
    /// `[0, number_operation_handles)`.
    fn number_operation_handles(&self) -> OperationHandle;

    /// A freshly built database of the model's user-visible identifiers.
    fn identifier_database(&self) -> IdentifierDatabase;

    /// Entry point for thread 1.
    fn t1(&self, context: &mut ThreadContext) -> Result<(), ModelError>;

    entry_points! {
        t2: 2, t3: 3, t4: 4, t5: 5, t6: 6, t7: 7, t8: 8,
        t9: 9, t10: 10, t11: 11, t12: 12, t13: 13, t14: 14, t15: 15, t16: 16,
        t17: 17, t18: 18, t19: 19, t20: 20, t21: 21, t22: 22, t23: 23, t24: 24,
        t25: 25, t26: 26, t27: 27, t28: 28, t29: 29, t30: 30, t31: 31, t32: 32,
    }

    /// Dispatch to the entry point for `thread_id` (zero-based).
    fn execute(&self, context: &mut ThreadContext, thread_id: u32) -> Result<(), ModelError> {
        match thread_id {
            0 => self.t1(context),
            1 => self.t2(context),
            2 => self.t3(context),
            3 => self.t4(context),
            4 => self.t5(context),
            5 => self.t6(context),
            6 => self.t7(context),
            7 => self.t8(context),
            8 => self.t9(context),
            9 => self.t10(context),
            10 => self.t11(context),
            11 => self.t12(context),
            12 => self.t13(context),
            13 => self.t14(context),
            14 => self.t15(context),
            15 => self.t16(context),
            16 => self.t17(context),
            17 => self.t18(context),
            18 => self.t19(context),
            19 => self.t20(context),
            20 => self.t21(context),
            21 => self.t22(context),
            22 => self.t23(context),
            23 => self.t24(context),
            24 => self.t25(context),
            25 => self.t26(context),
            26 => self.t27(context),
            27 => self.t28(context),
            28 => self.t29(context),
            29 => self.t30(context),
            30 => self.t31(context),
            _ => self.t32(context),
        }
    }
}
