//! The model lifecycle controller: spawns workers, aggregates their
//! outcomes, and exposes the embedding control surface.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use arrayvec::ArrayVec;

use crate::console::{self, MessageType};
use crate::error::ModelError;
use crate::exec::ExecControl;
use crate::ffi::set_round_to_nearest;
use crate::ident::IdentifierDatabase;
use crate::model::{Model, MAX_THREADS};
use crate::rng::{RngKind, Seed};
use crate::status::{State, Status};
use crate::thread::ThreadContext;
use crate::OperationHandle;


// Knuth-Lewis LCG, applied per 32-bit seed word to derive each successive
// worker's seed from the base. Constants from Numerical Recipes.
fn knuth_lewis(word: u32) -> u32 {
    1_664_525u32.wrapping_mul(word).wrapping_add(1_013_904_223)
}

pub(crate) fn advance_seed(seed: &mut Seed) {
    for word in seed.iter_mut() {
        let low = knuth_lewis(*word as u32);
        let high = knuth_lewis((*word >> 32) as u32);
        *word = u64::from(high) << 32 | u64::from(low);
    }
}

struct Shared {
    model: Box<dyn Model>,
    control: Arc<ExecControl>,
}

/// Lifecycle controller and embedding surface for one loaded model.
///
/// Boolean returns report whether the operation was applicable in the
/// current state, not success or failure of an action already underway.
pub struct Runtime {
    shared: Arc<Shared>,
    threads: Mutex<ArrayVec<JoinHandle<()>, { MAX_THREADS as usize }>>,
}

impl Runtime {
    pub fn new(model: impl Model + 'static) -> Self {
        Self::from_boxed(Box::new(model))
    }

    pub fn from_boxed(model: Box<dyn Model>) -> Self {
        let control = Arc::new(ExecControl::new(model.number_operation_handles()));
        Self {
            shared: Arc::new(Shared { model, control }),
            threads: Mutex::new(ArrayVec::new()),
        }
    }

    fn control(&self) -> &ExecControl {
        &self.shared.control
    }

    /// Launch the model in the background. Applicable from `Stopped` or
    /// `Aborted`; fires `started` and one `thread_started` per worker.
    pub fn start(
        &self,
        kind: RngKind,
        seed: &Seed,
        status: Option<Arc<dyn Status>>,
    ) -> bool {
        let state = self.state();
        if state != State::Stopped && state != State::Aborted {
            return false;
        }

        // Workers from the previous run have exited; reap their handles.
        self.join_all();

        let worker_count = self.shared.model.number_threads().min(MAX_THREADS);
        self.control().begin_run(worker_count, status.clone());

        if let Some(callback) = console::callback() {
            callback.initialize(worker_count);
        }
        self.control().fire_started();

        if worker_count == 0 {
            self.control().set_state(State::Stopped);
            self.control().fire_finished();
            return true;
        }

        let mut handles = self.threads.lock().expect("worker handles");
        let mut working_seed = *seed;
        for thread_id in 0..worker_count {
            let context = ThreadContext::for_worker(
                thread_id,
                kind,
                &working_seed,
                status.clone(),
                Arc::clone(&self.shared.control),
            );
            advance_seed(&mut working_seed);

            let shared = Arc::clone(&self.shared);
            let handle = std::thread::Builder::new()
                .name(format!("model-worker-{thread_id}"))
                .spawn(move || worker_body(shared, context, thread_id))
                .expect("spawn model worker");
            handles.push(handle);
        }

        true
    }

    /// Run to completion, blocking the caller.
    pub fn run(&self, kind: RngKind, seed: &Seed, status: Option<Arc<dyn Status>>) -> bool {
        if !self.start(kind, seed, status) {
            return false;
        }
        self.wait_complete();
        true
    }

    pub fn state(&self) -> State {
        self.control().state()
    }

    /// Request termination and block until every worker has exited.
    pub fn abort(&self) -> bool {
        if !self.control().try_begin_abort() {
            return false;
        }

        self.control().set_user_abort_reason();
        self.control().force_abort();
        self.join_all();
        true
    }

    /// Block until the model finishes or aborts.
    pub fn wait_complete(&self) {
        self.join_all();
    }

    fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.threads.lock().expect("worker handles");
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Ask the model to pause at the next safepoint any worker reaches.
    pub fn pause(&self) -> bool {
        self.state() == State::Active && self.control().request_pause()
    }

    /// From a paused state, advance past exactly one safepoint and
    /// re-pause.
    pub fn single_step(&self) -> bool {
        self.control().single_step()
    }

    /// Arm the one-shot run-to breakpoint, or clear it with
    /// [`INVALID_OPERATION_HANDLE`][crate::INVALID_OPERATION_HANDLE].
    pub fn set_run_to_location(&self, operation_handle: OperationHandle) -> bool {
        self.control().set_run_to_location(operation_handle)
    }

    pub fn run_to_location(&self) -> OperationHandle {
        self.control().run_to_location()
    }

    pub fn set_break_at_operation(&self, operation_handle: OperationHandle, now_set: bool) -> bool {
        self.control().set_break_at_operation(operation_handle, now_set)
    }

    /// Currently armed operation breakpoints, ascending.
    pub fn operation_breakpoints(&self) -> Vec<OperationHandle> {
        self.control().operation_breakpoints()
    }

    pub fn resume(&self) -> bool {
        self.state().is_paused() && self.control().resume()
    }

    pub fn number_threads(&self) -> u32 {
        self.shared.model.number_threads()
    }

    pub fn number_operation_handles(&self) -> OperationHandle {
        self.shared.model.number_operation_handles()
    }

    /// A fresh identifier database from the model.
    pub fn identifier_database(&self) -> IdentifierDatabase {
        self.shared.model.identifier_database()
    }

    /// Standalone RNG with the full deviate surface.
    pub fn create_rng(&self, kind: RngKind, seed: &Seed) -> ThreadContext {
        ThreadContext::standalone(kind, seed)
    }

    /// Standalone MT19937 RNG seeded from the wall clock: four consecutive
    /// seconds, one per seed word.
    pub fn create_rng_default(&self) -> ThreadContext {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let seed = [base, base + 1, base + 2, base + 3];
        ThreadContext::standalone(RngKind::Mt19937, &seed)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Do not leave detached workers mutating a model being torn down.
        if self.control().try_begin_abort() {
            self.control().set_user_abort_reason();
            self.control().force_abort();
        }
        self.join_all();
    }
}

fn worker_body(shared: Arc<Shared>, mut context: ThreadContext, thread_id: u32) {
    context.thread_local_setup();
    let console = context.console().cloned();
    let control = Arc::clone(&shared.control);

    if let Some(callback) = &console {
        console::report_to(
            callback.as_ref(),
            thread_id,
            MessageType::Information,
            &[&"Starting thread ", &thread_id, &"."],
        );
    }

    // Reproducibility of deviates requires a known rounding mode.
    set_round_to_nearest();

    control.fire_thread_started(thread_id);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        shared.model.execute(&mut context, thread_id)
    }));
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(_) => Some(ModelError::System("worker panicked".into())),
    };
    let operation_handle = context.operation_handle();
    drop(context);

    match &failure {
        None => {}
        Some(ModelError::UserAbort) => control.record_abort_site(operation_handle),
        Some(error) => {
            // First writer wins; peers converge on the pending-event flag.
            control.record_failure(error.abort_reason(), operation_handle);
            control.set_state(State::Aborting);
            control.force_abort();
        }
    }

    let aborting = control.state() == State::Aborting;
    let closing_worker = control.worker_departed();

    if aborting {
        control.fire_thread_aborted(thread_id);
        if let Some(callback) = &console {
            console::report_to(
                callback.as_ref(),
                thread_id,
                MessageType::Information,
                &[&"Thread ", &thread_id, &" aborted."],
            );
        }
    } else {
        control.fire_thread_finished(thread_id);
        if let Some(callback) = &console {
            console::report_to(
                callback.as_ref(),
                thread_id,
                MessageType::Information,
                &[&"Thread ", &thread_id, &" finished."],
            );
        }
    }

    if closing_worker {
        // Re-read under the post-decrement ordering: a peer's abort store
        // precedes its decrement, so the closing worker sees it.
        if control.state() == State::Aborting {
            control.clear_abort();
            control.set_state(State::Aborted);
            control.fire_aborted();
        } else {
            control.set_state(State::Stopped);
            control.fire_finished();
        }
    }
}
