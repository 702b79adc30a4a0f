//! Request pacing against the service's fixed quota windows.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Time source for the throttle.
///
/// The engine sleeps through this trait so tests can drive simulated time
/// instead of waiting out real windows.
pub trait Clock: Send {
    /// Seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64;

    fn sleep(&self, duration: Duration);
}

/// Wall clock; sleeping parks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests and simulations: `sleep` advances the
/// simulated time instead of parking the thread. Clones share one timeline.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn at(epoch_secs: i64) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(epoch_secs)),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn epoch_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.secs
            .fetch_add(duration.as_secs() as i64, Ordering::SeqCst);
    }
}

/// Requests admitted per window before the throttle intervenes. Held below
/// the service's true per-100-second limit as a safety margin.
pub const WINDOW_BUDGET: u32 = 90;

/// Window length in seconds. Windows start on multiples of this on the
/// epoch, the boundary the service resets its quota on.
pub const WINDOW_SECS: i64 = 100;

/// Advisory request budget over fixed wall-clock windows.
///
/// Accounting is local only: the service stays the final arbiter and may
/// still reject calls, which surface as
/// [`BackendError::Rejected`](crate::BackendError::Rejected) without retry.
pub struct QuotaThrottle {
    used: u32,
    window_start: i64,
    clock: Box<dyn Clock>,
}

impl QuotaThrottle {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        let window_start = align(clock.epoch_secs());
        Self {
            used: 0,
            window_start,
            clock,
        }
    }

    /// Account for `cost` upcoming requests.
    ///
    /// Rolls the window when wall time has moved past its end. When the
    /// budget would be exceeded: blocking mode sleeps until the window ends
    /// and starts the next one fresh; non-blocking mode starts the next
    /// window immediately and lets the service arbitrate.
    pub fn reserve(&mut self, cost: u32, blocking: bool) {
        let now = self.clock.epoch_secs();
        if now >= self.window_start + WINDOW_SECS {
            self.window_start = align(now);
            self.used = 0;
        }
        if self.used + cost > WINDOW_BUDGET {
            if blocking {
                let wait = self.window_start + WINDOW_SECS - now;
                if wait > 0 {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        wait_secs = wait,
                        used = self.used,
                        "quota window exhausted; blocking until rollover"
                    );
                    self.clock.sleep(Duration::from_secs(wait as u64));
                }
            }
            self.window_start += WINDOW_SECS;
            self.used = 0;
        }
        self.used += cost;
    }

    /// Requests accounted in the current window.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Epoch second the current window started on.
    pub fn window_start(&self) -> i64 {
        self.window_start
    }
}

impl Default for QuotaThrottle {
    fn default() -> Self {
        Self::new()
    }
}

fn align(epoch: i64) -> i64 {
    epoch - epoch.rem_euclid(WINDOW_SECS)
}
