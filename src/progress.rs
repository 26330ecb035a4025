/*!
Cancellation and progress plumbing for long-running computations.

Closure, principal-congruence generation and lattice construction can run
for a long time on larger algebras. Callers hand those entry points a
[`TaskContext`] carrying an optional [`CancelToken`] and an optional
[`ProgressSink`]; the algorithms poll the token at phase boundaries and
report advisory `(fraction, message)` pairs to the sink. A default context
does neither.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CalcError, CalcResult};

/// A cloneable cancellation flag.
///
/// All clones share the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Receiver for advisory progress reports.
///
/// `fraction` lies in `[0, 1]`; the reporting frequency is unspecified.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64, message: &str);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64, _message: &str) {}
}

/// Bundle of cancellation and progress passed into long-running entry
/// points. The default context has neither.
#[derive(Clone, Default)]
pub struct TaskContext {
    cancel: Option<CancelToken>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fail with [`CalcError::Cancelled`] if the token has been signalled.
    pub fn check_cancelled(&self) -> CalcResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(CalcError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Report progress to the sink, if one was supplied.
    pub fn report(&self, fraction: f64, message: &str) {
        if let Some(sink) = &self.sink {
            sink.report(fraction.clamp(0.0, 1.0), message);
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancel", &self.cancel)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
