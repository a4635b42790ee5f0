use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
        Mutex,
        PoisonError,
    },
    time::Duration,
};

use crate::{
    buckets::{BucketCounts, DonationBucket},
    db::traits::{ConnectionHealth, CounterStore, CounterStoreError},
};

#[derive(Default)]
struct Inner {
    rows: Mutex<BTreeMap<i64, i64>>,
    failing_increments: AtomicU32,
    failing_loads: AtomicBool,
    increment_calls: AtomicU32,
    increment_delay_ms: AtomicU64,
}

/// An in-memory [`CounterStore`] with failure injection. Clones share the same counters.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    inner: Arc<Inner>,
}

impl MemoryCounterStore {
    /// An empty store, as if the counter table had never been created.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counts(counts: BucketCounts) -> Self {
        let store = Self::new();
        store.set_counts(counts);
        store
    }

    pub fn set_counts(&self, counts: BucketCounts) {
        let mut rows = self.rows();
        rows.clear();
        rows.extend(counts.iter().map(|(b, c)| (b.id(), c)));
    }

    /// The raw `(bucket id, count)` rows.
    pub fn counts(&self) -> BTreeMap<i64, i64> {
        self.rows().clone()
    }

    pub fn count(&self, bucket: DonationBucket) -> Option<i64> {
        self.rows().get(&bucket.id()).copied()
    }

    /// The next `n` calls to `increment` fail with a transient error.
    pub fn fail_next_increments(&self, n: u32) {
        self.inner.failing_increments.store(n, Ordering::SeqCst);
    }

    /// Every call to `increment` takes `delay` to complete, whether it fails or not.
    pub fn delay_increments(&self, delay: Duration) {
        self.inner.increment_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// While set, `load_all` fails with a transient error.
    pub fn fail_loads(&self, fail: bool) {
        self.inner.failing_loads.store(fail, Ordering::SeqCst);
    }

    pub fn increment_calls(&self) -> u32 {
        self.inner.increment_calls.load(Ordering::SeqCst)
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, BTreeMap<i64, i64>> {
        self.inner.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seed_if_empty(&self) {
        let mut rows = self.rows();
        if rows.is_empty() {
            rows.extend(BucketCounts::seeded().iter().map(|(b, c)| (b.id(), c)));
        }
    }
}

impl CounterStore for MemoryCounterStore {
    async fn ensure_schema(&self) -> Result<(), CounterStoreError> {
        self.seed_if_empty();
        Ok(())
    }

    async fn load_all(&self) -> Result<BucketCounts, CounterStoreError> {
        if self.inner.failing_loads.load(Ordering::SeqCst) {
            return Err(CounterStoreError::Unavailable("injected load failure".into()));
        }
        self.seed_if_empty();
        let rows = self.counts();
        Ok(BucketCounts::try_from_rows(rows)?)
    }

    async fn increment(&self, bucket: DonationBucket, delta: i64) -> Result<i64, CounterStoreError> {
        self.inner.increment_calls.fetch_add(1, Ordering::SeqCst);
        if delta <= 0 {
            return Err(CounterStoreError::InvalidDelta(delta));
        }
        let failed = self
            .inner
            .failing_increments
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let delay = self.inner.increment_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if failed {
            return Err(CounterStoreError::Unavailable("injected increment failure".into()));
        }
        let mut rows = self.rows();
        let count = rows.get_mut(&bucket.id()).ok_or(CounterStoreError::BucketNotFound(bucket))?;
        *count += delta;
        Ok(*count)
    }

    async fn check_connection(&self) -> Result<ConnectionHealth, CounterStoreError> {
        Ok(ConnectionHealth::Healthy)
    }
}
