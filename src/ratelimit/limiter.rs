//! Fixed-window rate limiter with timer-driven resets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::backend::AdmissionControl;
use super::window::{LimiterState, Window};
use crate::error::{CrptError, Result};

/// State shared between callers and the reset task.
struct Shared {
    window: Window,
    state: Mutex<LimiterState>,
    /// Broadcast to every suspended caller on reset and on close
    reset: Notify,
}

impl Shared {
    /// Check-and-increment under the lock.
    fn try_admit(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if state.is_closed() {
            return Err(CrptError::Cancelled);
        }

        let admitted = state.try_admit(self.window.max_calls());
        debug!(
            admitted,
            count = state.count(),
            max_calls = self.window.max_calls(),
            "Admission check"
        );
        Ok(admitted)
    }

    fn reset_window(&self) {
        let previous = {
            let mut state = self.state.lock();
            let previous = state.count();
            state.reset();
            previous
        };
        self.reset.notify_waiters();
        trace!(previous_count = previous, "Window reset");
    }
}

/// Caps the number of calls admitted per window.
///
/// The counter is cleared by a background task on a fixed schedule, one
/// window after construction and every window after that, regardless of
/// when calls arrive. Callers that find the window exhausted suspend until
/// the next reset and then re-check. Admission is never released early:
/// a call counts against its window even if it finishes immediately.
///
/// The limiter must be created inside a tokio runtime. Share it behind an
/// `Arc`; call [`RateLimiter::shutdown`] to release suspended callers.
pub struct RateLimiter {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.shared.window)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter for `window` and start its reset timer.
    pub fn new(window: Window) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CrptError::InvalidConfiguration(
                "rate limiter must be created inside a tokio runtime".to_string(),
            )
        })?;

        let shared = Arc::new(Shared {
            window,
            state: Mutex::new(LimiterState::new()),
            reset: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let timer = runtime.spawn(run_reset_timer(Arc::clone(&shared), shutdown_rx));

        info!(
            window = ?window.duration(),
            max_calls = window.max_calls(),
            "Rate limiter started"
        );

        Ok(Self {
            shared,
            shutdown_tx,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Validate `duration` and `max_calls` and create a limiter.
    pub fn configure(duration: Duration, max_calls: i64) -> Result<Self> {
        Self::new(Window::new(duration, max_calls)?)
    }

    /// Wait until this call is admitted.
    ///
    /// Returns immediately while the window has capacity. Otherwise waits
    /// for resets, re-checking after each one, until admitted. Fails with
    /// [`CrptError::Cancelled`] once the limiter is shut down.
    pub async fn acquire(&self) -> Result<()> {
        loop {
            // Register before checking so a reset between the check and the
            // await still wakes us.
            let notified = self.shared.reset.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.try_admit()? {
                return Ok(());
            }

            trace!("Window quota exhausted, waiting for reset");
            notified.await;
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `timeout`.
    ///
    /// A timed-out caller is not counted against any window.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout = ?timeout, "Timed out waiting for admission");
                Err(CrptError::TimedOut(timeout))
            }
        }
    }

    /// Admit a call only if the current window has capacity.
    pub fn try_acquire(&self) -> Result<bool> {
        self.shared.try_admit()
    }

    /// Get the window this limiter enforces.
    pub fn window(&self) -> Window {
        self.shared.window
    }

    /// Get the number of calls admitted in the current window.
    pub fn current_count(&self) -> u32 {
        self.shared.state.lock().count()
    }

    /// Get the remaining quota in the current window.
    pub fn remaining(&self) -> u32 {
        self.shared
            .window
            .max_calls()
            .saturating_sub(self.current_count())
    }

    /// Get the number of window resets performed so far.
    pub fn resets(&self) -> u64 {
        self.shared.state.lock().resets()
    }

    /// Get the time left until the next scheduled reset.
    pub fn duration_until_reset(&self) -> Duration {
        let last_reset = self.shared.state.lock().last_reset();
        self.shared
            .window
            .duration()
            .saturating_sub(last_reset.elapsed())
    }

    /// Whether the limiter has been shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().is_closed()
    }

    /// Shut the limiter down.
    ///
    /// Every suspended and future caller of `acquire` receives
    /// [`CrptError::Cancelled`]. Waits for the reset task to exit. Calling
    /// this more than once is harmless.
    pub async fn shutdown(&self) {
        if self.close() {
            info!("Rate limiter shutting down");
        }

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                warn!(error = %e, "Reset timer task ended abnormally");
            }
        }
    }

    /// Mark the limiter closed, stop the timer and wake all waiters.
    ///
    /// Returns `true` the first time it is called.
    fn close(&self) -> bool {
        let first = self.shared.state.lock().close();
        if first {
            self.shutdown_tx.send_replace(true);
            self.shared.reset.notify_waiters();
        }
        first
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl AdmissionControl for RateLimiter {
    async fn acquire(&self) -> Result<()> {
        RateLimiter::acquire(self).await
    }
}

/// Reset the window on a fixed schedule until shutdown is signalled.
async fn run_reset_timer(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let period = shared.window.duration();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => shared.reset_window(),
            _ = shutdown_rx.changed() => break,
        }
    }

    trace!("Reset timer stopped");
}
