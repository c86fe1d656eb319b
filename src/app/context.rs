use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::model::AppConfig;
use crate::infra::random::MutexRng;
use crate::ports::http::Http;

/// Shared dependency bundle handed to trackers and senders.
pub struct AppContext<H: Http> {
    pub cfg: Arc<AppConfig>,
    pub http: Arc<H>,
    pub rng: Arc<MutexRng>,
    pub shutdown: Shutdown,
}

impl<H: Http> Clone for AppContext<H> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            http: self.http.clone(),
            rng: self.rng.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Triggering side of the shutdown signal, held by the process entrypoint.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cancellation signal threaded through every sleep so trackers exit after
/// the current cycle and senders abort pending retries.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (ShutdownHandle, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownHandle { tx }, Shutdown { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleeps for `d` unless shutdown fires first. Returns true when the full
    /// duration elapsed.
    pub async fn sleep(&self, d: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(d) => true,
            _ = self.cancelled() => false,
        }
    }

    /// Resolves once shutdown is triggered (or the handle is gone).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
