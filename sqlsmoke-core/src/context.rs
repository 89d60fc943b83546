//! Shared cancellable context and scoped deadlines.
//!
//! The driver runs one operation at a time, but any deadline-scoped call
//! must also unwind when the process receives an interrupt. The context is
//! passed explicitly to each operation rather than living in a global.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::warn;

use crate::error::{Result, SessionError};

/// Cancellation state shared by every deadline-scoped call in one run.
#[derive(Clone)]
pub struct SessionContext {
    cancelled: watch::Receiver<bool>,
}

impl SessionContext {
    /// Install the interrupt listener and return the context. The listener
    /// runs until the first signal and then flips the shared flag.
    pub fn install() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            interrupt_signal().await;
            let _ = tx.send(true);
        });
        Self::from_receiver(rx)
    }

    /// Context with no listener attached; never cancels. Intended for tests
    /// and embedding in harnesses that manage signals themselves.
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::from_receiver(rx)
    }

    fn from_receiver(cancelled: watch::Receiver<bool>) -> Self {
        Self { cancelled }
    }

    /// Resolves once the interrupt listener fires. A closed channel means
    /// no listener is attached, which reads as "never cancelled".
    async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        if rx.wait_for(|flag| *flag).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` under a fresh deadline derived from this context. The
    /// deadline is released when the call returns regardless of outcome.
    pub async fn scoped<T, F>(&self, op: &'static str, timeout: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            _ = self.cancelled() => Err(SessionError::Interrupted { op }),
            res = tokio::time::timeout(timeout, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(SessionError::Deadline { op, timeout }),
            },
        }
    }

    /// [`scoped`](Self::scoped) for futures that return raw driver errors.
    pub async fn scoped_db<T, F>(&self, op: &'static str, timeout: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        self.scoped(op, timeout, async {
            fut.await.map_err(|source| SessionError::db(op, source))
        })
        .await
    }
}

/// Wait for an interrupt (ctrl-c, plus SIGTERM on unix).
async fn interrupt_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, cancelling in-flight work...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, cancelling in-flight work...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scoped_passes_value_through() {
        let ctx = SessionContext::detached();
        let value = ctx
            .scoped("noop", Duration::from_secs(1), async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_scoped_reports_deadline() {
        let ctx = SessionContext::detached();
        let err = ctx
            .scoped::<(), _>(
                "stalled call",
                Duration::from_millis(10),
                std::future::pending(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Deadline {
                op: "stalled call",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_scoped_observes_cancellation() {
        let (tx, rx) = watch::channel(false);
        let ctx = SessionContext::from_receiver(rx);
        tx.send(true).unwrap();

        let err = ctx
            .scoped::<(), _>(
                "stalled call",
                Duration::from_secs(5),
                std::future::pending(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Interrupted { op: "stalled call" }));
    }

    #[tokio::test]
    async fn test_scoped_db_labels_driver_errors() {
        let ctx = SessionContext::detached();
        let err = ctx
            .scoped_db::<(), _>("probe", Duration::from_secs(1), async {
                Err(sqlx::Error::PoolTimedOut)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Db { op: "probe", .. }));
    }
}
