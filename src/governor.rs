//! Admission governor for backend-calling requests.
//!
//! A compare-and-swap counter bounds the number of in-flight model calls.
//! [`AdmissionGovernor::try_enter`] never waits: it either hands out a
//! [`Ticket`] or returns [`Rejected`] straight away. The ticket gives its
//! slot back when dropped, which covers success, error, panic and request
//! cancellation alike.
//!
//! Every admission also runs [`AdmissionGovernor::maintenance_tick`], which
//! fires the reclaim hook when the reclaim interval has elapsed.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Minimum time between two reclaim runs.
pub const RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Called from the maintenance tick when the interval has elapsed.
pub type ReclaimHook = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("too many concurrent requests (limit {limit})")]
pub struct Rejected {
    pub limit: usize,
}

pub struct AdmissionGovernor {
    max_concurrent: usize,
    in_flight: AtomicUsize,
    reclaim_interval: Duration,
    last_reclaim: Mutex<Instant>,
    reclaim_hook: ReclaimHook,
    reclaim_count: AtomicU64,
}

impl AdmissionGovernor {
    /// Governor with the default 60 s reclaim interval and a hook that only
    /// logs. A cap of 0 is raised to 1.
    pub fn new(max_concurrent: usize) -> Self {
        Self::with_reclaim(
            max_concurrent,
            RECLAIM_INTERVAL,
            Box::new(|| debug!("reclaim tick")),
        )
    }

    pub fn with_reclaim(max_concurrent: usize, reclaim_interval: Duration, reclaim_hook: ReclaimHook) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            in_flight: AtomicUsize::new(0),
            reclaim_interval,
            last_reclaim: Mutex::new(Instant::now()),
            reclaim_hook,
            reclaim_count: AtomicU64::new(0),
        }
    }

    /// Take a slot, or fail immediately when all are in use.
    pub fn try_enter(self: &Arc<Self>) -> Result<Ticket, Rejected> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.max_concurrent {
                warn!(in_flight = current, limit = self.max_concurrent, "admission rejected");
                return Err(Rejected { limit: self.max_concurrent });
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let ticket = Ticket { governor: self.clone() };
        self.maintenance_tick();
        Ok(ticket)
    }

    /// Run the reclaim hook if the interval has elapsed since the last run.
    ///
    /// Skips without waiting when another thread holds the clock. Returns
    /// `true` when the hook ran.
    pub fn maintenance_tick(&self) -> bool {
        let Ok(mut last) = self.last_reclaim.try_lock() else {
            return false;
        };
        if last.elapsed() < self.reclaim_interval {
            return false;
        }

        (self.reclaim_hook)();
        *last = Instant::now();
        let runs = self.reclaim_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(runs, "maintenance tick reclaimed");
        true
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn reclaim_count(&self) -> u64 {
        self.reclaim_count.load(Ordering::Relaxed)
    }
}

/// One admitted request. Dropping it releases the slot.
#[derive(Debug)]
pub struct Ticket {
    governor: Arc<AdmissionGovernor>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.governor.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for AdmissionGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGovernor")
            .field("max_concurrent", &self.max_concurrent)
            .field("in_flight", &self.in_flight())
            .field("reclaim_count", &self.reclaim_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_plus_one_yields_exactly_one_rejection() {
        let gov = Arc::new(AdmissionGovernor::new(2));
        let results: Vec<_> = (0..3).map(|_| gov.try_enter()).collect();
        let rejected = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(rejected, 1);
        assert_eq!(gov.in_flight(), 2);
    }

    #[test]
    fn concurrent_entries_never_exceed_cap() {
        let gov = Arc::new(AdmissionGovernor::new(3));
        let barrier = Arc::new(std::sync::Barrier::new(4));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let gov = gov.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let ticket = gov.try_enter();
                    barrier.wait();
                    ticket.is_ok()
                })
            })
            .collect();
        let admitted = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 3);
        assert_eq!(gov.in_flight(), 0);
    }

    #[test]
    fn drop_releases_slot() {
        let gov = Arc::new(AdmissionGovernor::new(1));
        let ticket = gov.try_enter().unwrap();
        assert_eq!(gov.try_enter().unwrap_err(), Rejected { limit: 1 });
        drop(ticket);
        assert!(gov.try_enter().is_ok());
        assert_eq!(gov.in_flight(), 0);
    }

    #[test]
    fn panic_while_holding_ticket_releases_slot() {
        let gov = Arc::new(AdmissionGovernor::new(1));
        let g = gov.clone();
        let result = std::thread::spawn(move || {
            let _ticket = g.try_enter().unwrap();
            panic!("handler blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(gov.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelled_task_releases_slot() {
        let gov = Arc::new(AdmissionGovernor::new(1));
        let g = gov.clone();
        let task = tokio::spawn(async move {
            let _ticket = g.try_enter().unwrap();
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        task.abort();
        let _ = task.await;
        assert_eq!(gov.in_flight(), 0);
    }

    #[test]
    fn zero_cap_is_raised_to_one() {
        let gov = Arc::new(AdmissionGovernor::new(0));
        assert_eq!(gov.max_concurrent(), 1);
        assert!(gov.try_enter().is_ok());
    }

    #[test]
    fn tick_waits_for_interval() {
        let gov = Arc::new(AdmissionGovernor::with_reclaim(
            4,
            Duration::from_secs(3600),
            Box::new(|| {}),
        ));
        assert!(!gov.maintenance_tick());
        let _t = gov.try_enter().unwrap();
        assert_eq!(gov.reclaim_count(), 0);
    }

    #[test]
    fn tick_runs_hook_once_interval_elapsed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let gov = Arc::new(AdmissionGovernor::with_reclaim(
            4,
            Duration::ZERO,
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        let _a = gov.try_enter().unwrap();
        let _b = gov.try_enter().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(gov.reclaim_count(), 2);
    }

    #[test]
    fn tick_skips_when_clock_is_held() {
        let gov = AdmissionGovernor::with_reclaim(1, Duration::ZERO, Box::new(|| {}));
        let _held = gov.last_reclaim.lock().unwrap();
        assert!(!gov.maintenance_tick());
    }
}
