//! Per-worker execution context: one RNG, the deviate-engine caches, a
//! scratch buffer, the current-operation cursor and cached sink references.

use std::sync::Arc;

use crate::console::{self, Callback};
use crate::error::ModelError;
use crate::exec::ExecControl;
use crate::rng::{entropy_seed, uniform_source, RngKind, Seed, UniformSource};
use crate::status::{Device, Status, Value};
use crate::{OperationHandle, INVALID_OPERATION_HANDLE};

mod deviate;
#[cfg(test)]
mod test;

pub(crate) use deviate::{BinomialTerms, PoissonTerms};

/// Size of the lazily allocated per-thread scratch region, in bytes.
pub const TEMPORARY_BUFFER_BYTES: usize = 64 * 1024;

/// Execution context owned by exactly one model thread.
///
/// Also serves as the product of the standalone RNG factory: the full
/// deviate surface works without a running model.
pub struct ThreadContext {
    thread_id: u32,
    rng: Box<dyn UniformSource>,
    operation_handle: OperationHandle,

    console: Option<Arc<dyn Callback>>,
    status: Option<Arc<dyn Status>>,
    control: Option<Arc<ExecControl>>,

    scratch: Option<Box<[u8]>>,

    // Deviate caches; see the deviate module.
    pub(crate) normal_spare: Option<f64>,
    pub(crate) gamma_last_shape: f64,
    pub(crate) gamma_cached_c: f64,
    pub(crate) poisson_last_rate: f64,
    pub(crate) poisson_terms: PoissonTerms,
    pub(crate) binomial_last_n: i64,
    pub(crate) binomial_last_p: f64,
    pub(crate) binomial_terms: BinomialTerms,
}

impl ThreadContext {
    fn with_parts(
        thread_id: u32,
        rng: Box<dyn UniformSource>,
        console: Option<Arc<dyn Callback>>,
        status: Option<Arc<dyn Status>>,
        control: Option<Arc<ExecControl>>,
    ) -> Self {
        Self {
            thread_id,
            rng,
            operation_handle: INVALID_OPERATION_HANDLE,
            console,
            status,
            control,
            scratch: None,
            normal_spare: None,
            gamma_last_shape: f64::MIN,
            gamma_cached_c: 0.0,
            poisson_last_rate: f64::MIN,
            poisson_terms: PoissonTerms::default(),
            binomial_last_n: -1,
            binomial_last_p: -1.0,
            binomial_terms: BinomialTerms::default(),
        }
    }

    pub(crate) fn for_worker(
        thread_id: u32,
        kind: RngKind,
        seed: &Seed,
        status: Option<Arc<dyn Status>>,
        control: Arc<ExecControl>,
    ) -> Self {
        Self::with_parts(
            thread_id,
            uniform_source(kind, seed, thread_id),
            console::callback(),
            status,
            Some(control),
        )
    }

    /// A context bound to no model run, as produced by the RNG factory.
    pub fn standalone(kind: RngKind, seed: &Seed) -> Self {
        Self::with_parts(0, uniform_source(kind, seed, 0), console::callback(), None, None)
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn operation_handle(&self) -> OperationHandle {
        self.operation_handle
    }

    pub fn set_operation_handle(&mut self, operation_handle: OperationHandle) {
        self.operation_handle = operation_handle;
    }

    /// Fixed-size scratch region, allocated on first use and kept for the
    /// context's lifetime.
    pub fn temporary_buffer(&mut self) -> &mut [u8] {
        self.scratch
            .get_or_insert_with(|| vec![0u8; TEMPORARY_BUFFER_BYTES].into_boxed_slice())
    }

    /// Re-read the process console callback into this context. Called on
    /// worker entry so platforms with awkward dynamic-link thread-locals
    /// see a stable copy.
    pub fn thread_local_setup(&mut self) {
        self.console = console::callback();
    }

    pub(crate) fn console(&self) -> Option<&Arc<dyn Callback>> {
        self.console.as_ref()
    }

    /// Post a console message through this thread's cached callback.
    pub fn report(&self, message_type: console::MessageType, items: &[&dyn console::Payload]) {
        if let Some(callback) = &self.console {
            console::report_to(callback.as_ref(), self.thread_id, message_type, items);
        }
    }

    /// Forward a value to the status sink's device channel.
    pub fn send_to_device(&self, device: Device, value: Value) {
        if let Some(status) = &self.status {
            status.send_to_device(device, value);
        }
    }

    // --- RNG surface ------------------------------------------------------

    /// Replace the generator, keeping the kind's default entropy seeding.
    pub fn set_rng_kind(&mut self, kind: RngKind) {
        self.rng = uniform_source(kind, &entropy_seed(), self.thread_id);
        self.reset_deviate_caches();
    }

    pub fn set_rng_seed(&mut self, seed: &Seed) {
        self.rng.reseed(seed, self.thread_id);
        self.reset_deviate_caches();
    }

    pub fn rng_kind(&self) -> RngKind {
        self.rng.kind()
    }

    pub fn rng_seed(&self) -> &Seed {
        self.rng.seed()
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Bulk uniform fill; see [`UniformSource::fill`].
    pub fn fill(&mut self, out: &mut [u64]) {
        self.rng.fill(out);
    }

    fn reset_deviate_caches(&mut self) {
        self.normal_spare = None;
        self.gamma_last_shape = f64::MIN;
        self.poisson_last_rate = f64::MIN;
        self.binomial_last_n = -1;
        self.binomial_last_p = -1.0;
    }

    // --- safepoints -------------------------------------------------------

    /// Safepoint check. Records the operation cursor unconditionally, then
    /// takes the slow path only when the controller has a pending event.
    #[inline]
    pub fn check(&mut self, operation_handle: OperationHandle) -> Result<(), ModelError> {
        self.operation_handle = operation_handle;
        match &self.control {
            Some(control) if control.has_pending_event() => {
                control.handle_check(self.thread_id, operation_handle)
            }
            _ => Ok(()),
        }
    }

    /// Safepoint check at an identifier-update site.
    #[inline]
    pub fn check_with(
        &mut self,
        operation_handle: OperationHandle,
        identifier_handle: crate::IdentifierHandle,
    ) -> Result<(), ModelError> {
        self.operation_handle = operation_handle;
        match &self.control {
            Some(control) if control.has_pending_event() => {
                control.handle_check_with(self.thread_id, operation_handle, identifier_handle)
            }
            _ => Ok(()),
        }
    }
}
