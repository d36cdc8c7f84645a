/// Single-shot result delivery.
///
/// A `ResultReporter` is consumed by `report`, so a workflow holding one can
/// deliver at most one result. Dropping it unreported (worker panic) is
/// observed by the `PendingResult` as `ReportError::Dropped`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    #[error("Workflow ended without reporting a result")]
    Dropped,
}

enum Sink<T> {
    Channel(oneshot::Sender<T>),
    Callback(Box<dyn FnOnce(T) + Send + 'static>),
}

/// Write side. Not `Clone`.
pub struct ResultReporter<T> {
    sink: Sink<T>,
}

impl<T> ResultReporter<T> {
    /// Deliver to a plain callback, invoked on the worker that finishes.
    pub fn from_callback<F>(callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        ResultReporter {
            sink: Sink::Callback(Box::new(callback)),
        }
    }

    pub fn report(self, result: T) {
        match self.sink {
            Sink::Channel(tx) => {
                // Receiver gone means the caller stopped caring.
                if tx.send(result).is_err() {
                    log::debug!("Result receiver dropped before delivery");
                }
            }
            Sink::Callback(callback) => callback(result),
        }
    }
}

impl<T> fmt::Debug for ResultReporter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Channel(_) => "channel",
            Sink::Callback(_) => "callback",
        };
        write!(f, "ResultReporter({})", kind)
    }
}

/// Read side. Resolves once with the reported result.
#[derive(Debug)]
pub struct PendingResult<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T, ReportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| ReportError::Dropped))
    }
}

/// Create a connected reporter / pending-result pair.
pub fn result_channel<T>() -> (ResultReporter<T>, PendingResult<T>) {
    let (tx, rx) = oneshot::channel();
    (
        ResultReporter {
            sink: Sink::Channel(tx),
        },
        PendingResult { rx },
    )
}
