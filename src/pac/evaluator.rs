// src/pac/evaluator.rs
use super::engine::{HostError, InterruptReason, Interrupter, ScriptHost, ScriptValue};
use crate::error::{PacError, Result};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

/// Name of the function every PAC script must define.
pub const ENTRY_POINT: &str = "FindProxyForURL";

/// Serializes and time-bounds every call into one script host.
///
/// At most one call (top-level run or entry-point call) is inside the host at
/// a time. With a timeout set, each call runs on a scoped worker thread; when
/// the deadline passes the host is interrupted and the caller waits for the
/// worker to release the lock before returning [`PacError::Timeout`].
pub struct Evaluator<H: ScriptHost> {
    host: Mutex<H>,
    interrupter: Interrupter,
    timeout: Option<Duration>,
}

impl<H: ScriptHost> Evaluator<H> {
    pub fn new(host: H, timeout: Option<Duration>) -> Self {
        let interrupter = host.interrupter();
        Self {
            host: Mutex::new(host),
            interrupter,
            timeout,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs the script's top-level code under the timeout.
    pub fn run_top_level(&self, source: &str) -> Result<()> {
        self.guarded(|host| host.run_top_level(source))
            .map_err(|err| match err {
                HostError::Interrupted(InterruptReason::Timeout) => PacError::Timeout,
                other => PacError::Execute(other.to_string()),
            })
    }

    /// Calls `FindProxyForURL(url, host)` and returns its string result.
    pub fn evaluate(&self, url: &str, host: &str) -> Result<String> {
        let args = [url.to_string(), host.to_string()];
        let value = self
            .guarded(|script| script.call(ENTRY_POINT, &args))
            .map_err(|err| match err {
                HostError::Interrupted(InterruptReason::Timeout) => PacError::Timeout,
                other => PacError::Evaluate(other.to_string()),
            })?;

        match value {
            ScriptValue::String(s) => Ok(s),
            other => Err(PacError::Convert(other.type_name().to_string())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, H> {
        // The interpreter stays usable even if a helper panicked mid-call.
        self.host.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guarded<T, F>(&self, op: F) -> std::result::Result<T, HostError>
    where
        T: Send,
        F: FnOnce(&mut H) -> std::result::Result<T, HostError> + Send,
    {
        let Some(limit) = self.timeout else {
            let mut host = self.lock();
            self.interrupter.arm();
            return op(&mut *host);
        };

        thread::scope(|scope| {
            let (started_tx, started_rx) = mpsc::channel::<u64>();
            let (result_tx, result_rx) = mpsc::channel();

            let worker = thread::Builder::new()
                .name("pac-eval".into())
                .spawn_scoped(scope, move || {
                    let mut host = self.lock();
                    let token = self.interrupter.arm();
                    let _ = started_tx.send(token);
                    let _ = result_tx.send(op(&mut *host));
                })
                .map_err(|e| HostError::Exception(format!("failed to start evaluation: {e}")))?;

            // The deadline only starts once the worker holds the lock.
            let Ok(token) = started_rx.recv() else {
                return Err(worker_lost(worker));
            };

            match result_rx.recv_timeout(limit) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Disconnected) => return Err(worker_lost(worker)),
                Err(RecvTimeoutError::Timeout) => {}
            }

            if let Ok(result) = result_rx.try_recv() {
                return result;
            }

            self.interrupter.interrupt(token, InterruptReason::Timeout);
            match result_rx.recv() {
                Ok(Ok(_)) => Err(HostError::Interrupted(InterruptReason::Timeout)),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(worker_lost(worker)),
            }
        })
    }
}

/// Joins a worker that hung up without a result. Joining here keeps a worker
/// panic from being re-raised when the scope ends.
fn worker_lost(worker: ScopedJoinHandle<'_, ()>) -> HostError {
    let _ = worker.join();
    HostError::Exception("evaluation worker exited without a result".to_string())
}
