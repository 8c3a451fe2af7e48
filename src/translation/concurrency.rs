/*!
 * Shared throttling and cancellation for translator calls.
 *
 * The rate limiter spaces call starts across every worker, independently of
 * the file and unit concurrency bounds. The cancellation flag is checked before
 * each new call; in-flight calls are left to finish or time out.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::info;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Global requests-per-minute limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// `None` or zero disables throttling
    pub fn new(requests_per_minute: Option<u32>) -> Self {
        let interval = requests_per_minute
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_millis(60_000 / rpm as u64));
        Self {
            interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Minimum spacing between call starts
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Wait for the next free slot
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

/// Run-wide cancellation, set by Ctrl-C or the run timeout
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested; no new translator calls will start");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel on Ctrl-C
    pub fn cancel_on_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.cancel();
            }
        });
    }

    /// Cancel once `timeout` has elapsed
    pub fn cancel_after(&self, timeout: Duration) {
        let flag = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            flag.cancel();
        });
    }
}
