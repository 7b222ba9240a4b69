//! services/api/src/composer/timer.rs
//!
//! Cancellable one-shot timers. Each slot holds at most one pending callback;
//! arming the slot again cancels whatever was pending in it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct TimerSlot {
    token: Option<CancellationToken>,
}

impl TimerSlot {
    /// Cancels the pending callback, if any, and returns the token for a new one.
    pub fn arm(&mut self) -> CancellationToken {
        self.cancel();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        token
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `fire` after `delay` unless `token` is cancelled first.
///
/// Cancellation can race with expiry, so `fire` must re-check the token under
/// the same lock that `TimerSlot::arm` is called under.
pub fn schedule<F>(token: CancellationToken, delay: Duration, fire: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => fire.await,
        }
    })
}
