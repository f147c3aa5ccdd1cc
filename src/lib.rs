//! Embeddable multi-threaded execution runtime for compiled user models.
//!
//! A *model* is a compiled computation exposing up to 32 worker entry
//! points. The runtime launches one OS thread per entry point, hands each a
//! [`ThreadContext`][thread::ThreadContext] carrying a seedable RNG and the
//! deviate engine, and controls the whole run through a small embedding
//! surface: start, pause, single-step, breakpoints, run-to and abort.
//! Compiler-planted safepoint calls inside the model are the only places
//! execution can pause or cleanly abort.
//!
//! ## Example
//!
//! Run a two-thread model that sums uniform draws and watch it finish.
//!
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use model_host::error::ModelError;
//! use model_host::ident::IdentifierDatabase;
//! use model_host::model::Model;
//! use model_host::rng::RngKind;
//! use model_host::runtime::Runtime;
//! use model_host::status::State;
//! use model_host::thread::ThreadContext;
//!
//! #[derive(Default)]
//! struct SumModel {
//!     totals: [AtomicU64; 2],
//! }
//!
//! impl SumModel {
//!     fn accumulate(&self, ctx: &mut ThreadContext, slot: usize) -> Result<(), ModelError> {
//!         let mut total = 0u64;
//!         for op in 0..1000 {
//!             ctx.check(op)?; // safepoint
//!             total = total.wrapping_add(ctx.next_u64());
//!         }
//!         self.totals[slot].store(total, Ordering::Relaxed);
//!         Ok(())
//!     }
//! }
//!
//! impl Model for SumModel {
//!     fn number_threads(&self) -> u32 {
//!         2
//!     }
//!
//!     fn number_operation_handles(&self) -> u32 {
//!         1000
//!     }
//!
//!     fn identifier_database(&self) -> IdentifierDatabase {
//!         IdentifierDatabase::new()
//!     }
//!
//!     fn t1(&self, ctx: &mut ThreadContext) -> Result<(), ModelError> {
//!         self.accumulate(ctx, 0)
//!     }
//!
//!     fn t2(&self, ctx: &mut ThreadContext) -> Result<(), ModelError> {
//!         self.accumulate(ctx, 1)
//!     }
//! }
//!
//! let runtime = Runtime::new(SumModel::default());
//! assert!(runtime.run(RngKind::Xoshiro256Plus, &[1, 2, 3, 4], None));
//! assert_eq!(runtime.state(), State::Stopped);
//! ```

pub mod console;
pub mod error;
pub(crate) mod exec;
pub mod ffi;
pub mod ident;
pub mod model;
pub mod rng;
pub mod runtime;
pub mod set;
pub mod status;
pub mod thread;

/// Dense integer identifying one safepoint in a compiled model.
pub type OperationHandle = u32;

/// Reserved sentinel: no operation.
pub const INVALID_OPERATION_HANDLE: OperationHandle = OperationHandle::MAX;

/// Dense integer identifying a user variable or function.
pub type IdentifierHandle = u32;

/// Reserved sentinel: no identifier.
pub const INVALID_IDENTIFIER_HANDLE: IdentifierHandle = IdentifierHandle::MAX;
