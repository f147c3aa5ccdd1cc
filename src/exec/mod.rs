//! Shared execution-control block: the pending-event flag read at every
//! safepoint, the pause/single-step/abort machinery, the run-to handle and
//! the operation-breakpoint bitmap.
//!
//! Embedder calls serialize writes through the runtime's surface; workers
//! only read, except for the pause handshake fields. The hot path is a
//! single relaxed load of [`has_pending_event`][ExecControl::has_pending_event].

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread;
use std::time::Duration;

use crate::error::ModelError;
use crate::status::{AbortReason, State, Status};
use crate::{IdentifierHandle, OperationHandle, INVALID_OPERATION_HANDLE};

pub(crate) const NO_PAUSING_THREAD: u32 = u32::MAX;

const BREAKPOINT_GROUP_BITS: u32 = 64;

// Parked workers poll the pausing-thread indicator on this period. A
// condition-variable handshake remains the preferred long-term design.
const PAUSE_POLL_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone, Copy)]
struct AbortRecord {
    reason: AbortReason,
    operation: OperationHandle,
}

pub(crate) struct ExecControl {
    state: AtomicU8,
    // OR of every pause/abort/breakpoint source; the only cross-thread
    // traffic on the safepoint hot path.
    pending_event: AtomicBool,

    pause_requested: AtomicBool,
    single_step_requested: AtomicBool,
    forced_abort: AtomicBool,
    pausing_thread: AtomicU32,
    run_to: AtomicU32,
    breakpoints: OnceLock<Box<[AtomicU64]>>,
    number_operation_handles: u32,

    active_threads: AtomicI32,
    abort: Mutex<AbortRecord>,
    status: RwLock<Option<Arc<dyn Status>>>,
}

impl ExecControl {
    pub fn new(number_operation_handles: OperationHandle) -> Self {
        Self {
            state: AtomicU8::new(State::Stopped as u8),
            pending_event: AtomicBool::new(false),
            pause_requested: AtomicBool::new(false),
            single_step_requested: AtomicBool::new(false),
            forced_abort: AtomicBool::new(false),
            pausing_thread: AtomicU32::new(NO_PAUSING_THREAD),
            run_to: AtomicU32::new(INVALID_OPERATION_HANDLE),
            breakpoints: OnceLock::new(),
            number_operation_handles,
            active_threads: AtomicI32::new(0),
            abort: Mutex::new(AbortRecord {
                reason: AbortReason::None,
                operation: INVALID_OPERATION_HANDLE,
            }),
            status: RwLock::new(None),
        }
    }

    // --- state and status -------------------------------------------------

    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn status(&self) -> Option<Arc<dyn Status>> {
        self.status.read().expect("status sink").clone()
    }

    /// Reset per-run state and transition to ACTIVE. Breakpoints and the
    /// run-to handle deliberately survive across runs.
    pub fn begin_run(&self, worker_count: u32, status: Option<Arc<dyn Status>>) {
        *self.status.write().expect("status sink") = status;
        *self.abort.lock().expect("abort record") = AbortRecord {
            reason: AbortReason::None,
            operation: INVALID_OPERATION_HANDLE,
        };

        self.forced_abort.store(false, Ordering::SeqCst);
        self.pause_requested.store(false, Ordering::SeqCst);
        self.single_step_requested.store(false, Ordering::SeqCst);
        self.pausing_thread.store(NO_PAUSING_THREAD, Ordering::SeqCst);
        self.active_threads.store(worker_count as i32, Ordering::SeqCst);
        self.restore_pending_event();

        self.set_state(State::Active);
    }

    // --- embedder operations ----------------------------------------------

    /// Atomically move a live state to ABORTING. Returns false if the run
    /// already stopped, aborted, or is aborting; the caller must not abort
    /// in that case.
    pub fn try_begin_abort(&self) -> bool {
        loop {
            let current = self.state.load(Ordering::SeqCst);
            if matches!(
                State::from_u8(current),
                State::Stopped | State::Aborted | State::Aborting
            ) {
                return false;
            }
            if self
                .state
                .compare_exchange(
                    current,
                    State::Aborting as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn force_abort(&self) {
        if !self.forced_abort.swap(true, Ordering::SeqCst) {
            self.pause_requested.store(false, Ordering::SeqCst);
            self.single_step_requested.store(false, Ordering::SeqCst);
            self.pausing_thread.store(NO_PAUSING_THREAD, Ordering::SeqCst);
            self.set_pending_event();
        }
    }

    pub fn clear_abort(&self) {
        if self.forced_abort.swap(false, Ordering::SeqCst) {
            self.restore_pending_event();
        }
    }

    pub fn set_user_abort_reason(&self) {
        let mut record = self.abort.lock().expect("abort record");
        if record.reason == AbortReason::None {
            record.reason = AbortReason::UserRequest;
        }
    }

    pub fn request_pause(&self) -> bool {
        if self.pausing_thread.load(Ordering::SeqCst) != NO_PAUSING_THREAD {
            return false;
        }
        if self.pause_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.set_pending_event();
        true
    }

    pub fn single_step(&self) -> bool {
        // Resume with the pause immediately re-armed; the first safepoint
        // reached after the release becomes the next stop point.
        if self.pausing_thread.load(Ordering::SeqCst) == NO_PAUSING_THREAD {
            return false;
        }
        self.single_step_requested.store(true, Ordering::SeqCst);
        self.pausing_thread.store(NO_PAUSING_THREAD, Ordering::SeqCst);
        true
    }

    pub fn resume(&self) -> bool {
        if self.pausing_thread.load(Ordering::SeqCst) == NO_PAUSING_THREAD {
            return false;
        }
        self.pausing_thread.store(NO_PAUSING_THREAD, Ordering::SeqCst);
        self.restore_pending_event();
        true
    }

    pub fn set_run_to_location(&self, operation_handle: OperationHandle) -> bool {
        if operation_handle == INVALID_OPERATION_HANDLE {
            self.run_to.store(INVALID_OPERATION_HANDLE, Ordering::SeqCst);
            self.restore_pending_event();
            return true;
        }
        if operation_handle >= self.number_operation_handles {
            return false;
        }
        self.run_to.store(operation_handle, Ordering::SeqCst);
        self.set_pending_event();
        true
    }

    pub fn run_to_location(&self) -> OperationHandle {
        self.run_to.load(Ordering::SeqCst)
    }

    fn breakpoint_groups(&self) -> &[AtomicU64] {
        self.breakpoints.get_or_init(|| {
            let group_count = self
                .number_operation_handles
                .div_ceil(BREAKPOINT_GROUP_BITS);
            (0..group_count).map(|_| AtomicU64::new(0)).collect()
        })
    }

    pub fn set_break_at_operation(&self, operation_handle: OperationHandle, now_set: bool) -> bool {
        if operation_handle >= self.number_operation_handles {
            return false;
        }

        let groups = self.breakpoint_groups();
        let group = &groups[(operation_handle / BREAKPOINT_GROUP_BITS) as usize];
        let mask = 1u64 << (operation_handle % BREAKPOINT_GROUP_BITS);

        if now_set {
            let changed = group.fetch_or(mask, Ordering::SeqCst) & mask == 0;
            if changed {
                self.set_pending_event();
            }
            changed
        } else {
            let changed = group.fetch_and(!mask, Ordering::SeqCst) & mask != 0;
            if changed {
                self.restore_pending_event();
            }
            changed
        }
    }

    pub fn operation_breakpoints(&self) -> Vec<OperationHandle> {
        let Some(groups) = self.breakpoints.get() else {
            return Vec::new();
        };

        let mut handles = Vec::new();
        for (group_index, group) in groups.iter().enumerate() {
            let mut bits = group.load(Ordering::SeqCst);
            while bits != 0 {
                let offset = bits.trailing_zeros();
                handles.push(group_index as u32 * BREAKPOINT_GROUP_BITS + offset);
                bits &= bits - 1;
            }
        }
        handles
    }

    fn breakpoint_is_set(&self, operation_handle: OperationHandle) -> bool {
        let Some(groups) = self.breakpoints.get() else {
            return false;
        };
        let group = &groups[(operation_handle / BREAKPOINT_GROUP_BITS) as usize];
        group.load(Ordering::SeqCst) & (1u64 << (operation_handle % BREAKPOINT_GROUP_BITS)) != 0
    }

    // --- pending-event flag -----------------------------------------------

    #[inline]
    pub fn has_pending_event(&self) -> bool {
        self.pending_event.load(Ordering::Relaxed)
    }

    fn set_pending_event(&self) {
        self.pending_event.store(true, Ordering::SeqCst);
    }

    /// Recompute the flag from every source; called whenever one of them
    /// clears.
    fn restore_pending_event(&self) {
        let mut pending = self.pause_requested.load(Ordering::SeqCst)
            || self.forced_abort.load(Ordering::SeqCst)
            || self.pausing_thread.load(Ordering::SeqCst) != NO_PAUSING_THREAD
            || self.run_to.load(Ordering::SeqCst) != INVALID_OPERATION_HANDLE;

        if !pending {
            if let Some(groups) = self.breakpoints.get() {
                pending = groups.iter().any(|group| group.load(Ordering::SeqCst) != 0);
            }
        }

        self.pending_event.store(pending, Ordering::SeqCst);
    }

    // --- completion aggregation -------------------------------------------

    /// Record a worker failure; the first writer wins.
    pub fn record_failure(&self, reason: AbortReason, operation: OperationHandle) {
        let mut record = self.abort.lock().expect("abort record");
        if record.reason == AbortReason::None {
            record.reason = reason;
            record.operation = operation;
        }
    }

    /// Record where a worker observed the user abort, keeping the earliest
    /// site.
    pub fn record_abort_site(&self, operation: OperationHandle) {
        let mut record = self.abort.lock().expect("abort record");
        if record.operation == INVALID_OPERATION_HANDLE {
            record.operation = operation;
        }
    }

    pub fn abort_record(&self) -> (AbortReason, OperationHandle) {
        let record = self.abort.lock().expect("abort record");
        (record.reason, record.operation)
    }

    /// Decrement the live-worker count; returns true for the closing
    /// worker.
    pub fn worker_departed(&self) -> bool {
        let past = self.active_threads.fetch_sub(1, Ordering::SeqCst);
        if past < 1 {
            self.active_threads.fetch_add(1, Ordering::SeqCst);
        }
        past == 1
    }

    // --- safepoint slow path ----------------------------------------------

    /// Slow path behind the pending-event flag. May park the calling worker
    /// or convert a forced abort into the distinguished abort error.
    pub fn handle_check(
        &self,
        thread_id: u32,
        operation_handle: OperationHandle,
    ) -> Result<(), ModelError> {
        if self.forced_abort.load(Ordering::SeqCst) {
            return Err(ModelError::UserAbort);
        }

        if self.pause_requested.swap(false, Ordering::SeqCst) {
            self.pausing_thread.store(thread_id, Ordering::SeqCst);
            self.model_paused_on_user_request(operation_handle);
            self.thread_paused(thread_id);
            self.wait_for_resume(thread_id);
            return Ok(());
        }

        if self.run_to.load(Ordering::SeqCst) == operation_handle {
            // One-shot: the handle clears on the hit.
            self.run_to.store(INVALID_OPERATION_HANDLE, Ordering::SeqCst);
            self.pausing_thread.store(thread_id, Ordering::SeqCst);
            self.model_paused_on_user_request(operation_handle);
            self.thread_paused(thread_id);
            self.wait_for_resume(thread_id);
            return Ok(());
        }

        if self.pausing_thread.load(Ordering::SeqCst) != NO_PAUSING_THREAD {
            // Another worker initiated the pause; park alongside it.
            self.thread_paused(thread_id);
            self.wait_for_resume(thread_id);
            return Ok(());
        }

        if self.breakpoint_is_set(operation_handle) {
            self.model_paused_at_operation(operation_handle);
            self.pausing_thread.store(thread_id, Ordering::SeqCst);
            self.thread_paused(thread_id);
            self.wait_for_resume(thread_id);
        }

        Ok(())
    }

    /// Identifier-update variant of the safepoint slow path.
    pub fn handle_check_with(
        &self,
        thread_id: u32,
        operation_handle: OperationHandle,
        identifier_handle: IdentifierHandle,
    ) -> Result<(), ModelError> {
        let _ = identifier_handle;
        self.handle_check(thread_id, operation_handle)
    }

    // Sleep-poll on the pausing-thread indicator. The indicator is written
    // once and cleared once per pause cycle; every parked worker observes
    // the clear within one poll period.
    fn wait_for_resume(&self, thread_id: u32) {
        let pausing_thread = self.pausing_thread.load(Ordering::SeqCst);
        // The abort check covers a forced abort racing the indicator store;
        // the abort itself is raised at the next safepoint.
        while self.pausing_thread.load(Ordering::SeqCst) != NO_PAUSING_THREAD
            && !self.forced_abort.load(Ordering::SeqCst)
        {
            thread::sleep(PAUSE_POLL_DELAY);
        }

        if !self.forced_abort.load(Ordering::SeqCst) {
            if thread_id == pausing_thread {
                self.model_resumed();
            }
            self.thread_resumed(thread_id);
        }

        if self.single_step_requested.swap(false, Ordering::SeqCst) {
            self.pause_requested.store(true, Ordering::SeqCst);
        }
    }

    // --- state transitions fired from workers -----------------------------

    fn model_paused_on_user_request(&self, operation_handle: OperationHandle) {
        self.set_state(State::PausedOnUserRequest);
        if let Some(status) = self.status() {
            status.paused_on_user_request(operation_handle);
        }
    }

    fn model_paused_at_operation(&self, operation_handle: OperationHandle) {
        self.set_state(State::PausedAtOperation);
        if let Some(status) = self.status() {
            status.paused_at_operation(operation_handle);
        }
    }

    #[allow(dead_code)]
    fn model_paused_on_variable_update(
        &self,
        operation_handle: OperationHandle,
        identifier_handle: IdentifierHandle,
    ) {
        self.set_state(State::PausedOnVariableUpdate);
        if let Some(status) = self.status() {
            status.paused_on_variable_update(operation_handle, identifier_handle);
        }
    }

    fn model_resumed(&self) {
        self.set_state(State::Active);
        if let Some(status) = self.status() {
            status.resumed();
        }
    }

    fn thread_paused(&self, thread_id: u32) {
        if let Some(status) = self.status() {
            status.thread_paused(thread_id);
        }
    }

    fn thread_resumed(&self, thread_id: u32) {
        if let Some(status) = self.status() {
            status.thread_resumed(thread_id);
        }
    }

    pub fn fire_thread_started(&self, thread_id: u32) {
        if let Some(status) = self.status() {
            status.thread_started(thread_id);
        }
    }

    pub fn fire_thread_finished(&self, thread_id: u32) {
        if let Some(status) = self.status() {
            status.thread_finished(thread_id);
        }
    }

    pub fn fire_thread_aborted(&self, thread_id: u32) {
        if let Some(status) = self.status() {
            status.thread_aborted(thread_id);
        }
    }

    pub fn fire_started(&self) {
        if let Some(status) = self.status() {
            status.started();
        }
    }

    pub fn fire_finished(&self) {
        if let Some(status) = self.status() {
            status.finished();
        }
    }

    pub fn fire_aborted(&self) {
        let (reason, operation) = self.abort_record();
        if let Some(status) = self.status() {
            status.aborted(reason, operation);
        }
    }
}
