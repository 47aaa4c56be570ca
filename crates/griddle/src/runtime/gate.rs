//! The process-wide lock around the embedded runtime.

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, error, info};

use super::core_trait::EmbeddedRuntime;
use crate::error::{BackendError, Result};

/// Lifecycle of the embedded runtime behind a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    Started,
    Stopped,
}

/// Exclusive access to a single-threaded embedded runtime.
///
/// One gate exists per process and is shared by reference (usually an
/// `Arc`) between every model instance. Interpreter work only happens while
/// a [`GateGuard`] is alive; buffer marshaling before and after runs without
/// it. Acquisition is reentrant on the owning thread.
///
/// Lock order is always interpreter lock, then lifecycle state.
pub struct InterpreterGate {
    runtime: Box<dyn EmbeddedRuntime>,
    lock: ReentrantMutex<()>,
    state: Mutex<GateState>,
}

impl InterpreterGate {
    pub fn new<R>(runtime: R) -> Self
    where
        R: EmbeddedRuntime + 'static,
    {
        Self {
            runtime: Box::new(runtime),
            lock: ReentrantMutex::new(()),
            state: Mutex::new(GateState::Uninitialized),
        }
    }

    pub fn state(&self) -> GateState {
        let _held = self.lock.lock();
        *self.state.lock()
    }

    /// Load and initialize the runtime. Calling `start` again is a no-op.
    ///
    /// The gate is left unlocked on return so worker threads can each acquire
    /// it. A runtime library that cannot be loaded is fatal for the backend.
    pub fn start(&self) -> Result<()> {
        let _held = self.lock.lock();
        let mut state = self.state.lock();
        match *state {
            GateState::Started => {
                debug!("embedded runtime already started");
                return Ok(());
            }
            GateState::Stopped => return Err(BackendError::GateStopped),
            GateState::Uninitialized => {}
        }

        self.runtime.load_library().map_err(|e| {
            error!(error = %e, "failed to load embedded runtime library");
            match e {
                BackendError::RuntimeLoad(_) => e,
                other => BackendError::RuntimeLoad(other.to_string()),
            }
        })?;
        info!("loaded embedded runtime library");

        self.runtime.initialize()?;
        *state = GateState::Started;
        info!("embedded runtime is initialized");
        Ok(())
    }

    /// Block until the runtime is exclusively held by this thread.
    pub fn acquire(&self) -> Result<GateGuard<'_>> {
        let lock = self.lock.lock();
        match *self.state.lock() {
            GateState::Started => Ok(GateGuard { gate: self, _lock: lock }),
            GateState::Uninitialized => Err(BackendError::GateNotStarted),
            GateState::Stopped => Err(BackendError::GateStopped),
        }
    }

    /// Re-acquire the runtime and finalize it.
    ///
    /// A no-op before `start` and after a previous `stop`. Must run after every
    /// model instance using the gate has been dropped.
    pub fn stop(&self) -> Result<()> {
        let _held = self.lock.lock();
        let mut state = self.state.lock();
        if *state != GateState::Started {
            return Ok(());
        }
        *state = GateState::Stopped;
        self.runtime.finalize().inspect_err(|e| {
            error!(error = %e, "failed to finalize embedded runtime");
        })?;
        info!("embedded runtime is finalized");
        Ok(())
    }
}

impl Drop for InterpreterGate {
    fn drop(&mut self) {
        // errors are already logged by stop
        let _ = self.stop();
    }
}

/// Proof that the current thread holds the interpreter gate.
///
/// Released when dropped, including during unwinding. The guard is not
/// `Send`, so it cannot leave the thread that acquired it.
pub struct GateGuard<'g> {
    gate: &'g InterpreterGate,
    _lock: ReentrantMutexGuard<'g, ()>,
}

impl<'g> GateGuard<'g> {
    pub fn runtime(&self) -> &'g dyn EmbeddedRuntime {
        self.gate.runtime.as_ref()
    }

    pub fn gate(&self) -> &'g InterpreterGate {
        self.gate
    }
}
