use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Usage metrics for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub loans_created: Arc<AtomicUsize>,
    pub loans_returned: Arc<AtomicUsize>,
    pub loans_marked_overdue: Arc<AtomicUsize>,
    pub fines_assessed_cents: Arc<AtomicU64>,
    pub books_added: Arc<AtomicUsize>,
    pub users_registered: Arc<AtomicUsize>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            loans_created: Arc::new(AtomicUsize::new(0)),
            loans_returned: Arc::new(AtomicUsize::new(0)),
            loans_marked_overdue: Arc::new(AtomicUsize::new(0)),
            fines_assessed_cents: Arc::new(AtomicU64::new(0)),
            books_added: Arc::new(AtomicUsize::new(0)),
            users_registered: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_loans_created(&self) {
        self.loans_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_loans_returned(&self) {
        self.loans_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_loans_marked_overdue(&self, count: usize) {
        self.loans_marked_overdue.fetch_add(count, Ordering::Relaxed);
    }

    /// Fines are tracked in integer cents so the counter stays atomic.
    pub fn add_fine_assessed(&self, amount: f64) {
        let cents = (amount * 100.0).round().max(0.0) as u64;
        self.fines_assessed_cents.fetch_add(cents, Ordering::Relaxed);
    }

    pub fn inc_books_added(&self) {
        self.books_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_users_registered(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            loans_created: self.loans_created.load(Ordering::Relaxed),
            loans_returned: self.loans_returned.load(Ordering::Relaxed),
            loans_marked_overdue: self.loans_marked_overdue.load(Ordering::Relaxed),
            fines_assessed_cents: self.fines_assessed_cents.load(Ordering::Relaxed),
            books_added: self.books_added.load(Ordering::Relaxed),
            users_registered: self.users_registered.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub loans_created: usize,
    pub loans_returned: usize,
    pub loans_marked_overdue: usize,
    pub fines_assessed_cents: u64,
    pub books_added: usize,
    pub users_registered: usize,
    pub uptime_seconds: u64,
}
