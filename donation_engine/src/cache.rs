//! In-memory mirror of the counter store.
//!
//! The cache is the single piece of shared mutable state in the engine. It is only mutated by
//! [`AggregationCache::apply_batch`], [`AggregationCache::finish_batch`] and [`AggregationCache::reload`], and never
//! holds its lock across an await point.
use std::sync::{PoisonError, RwLock};

use log::*;

use crate::{
    buckets::{AggregationSnapshot, BucketCounts, BucketDeltas},
    classifier::PurchasedItem,
};

/// The result of applying one batch of purchased items to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// The cache state immediately after the batch was applied
    pub snapshot: AggregationSnapshot,
    /// What the batch changed, per bucket
    pub deltas: BucketDeltas,
}

impl BatchOutcome {
    pub fn changed(&self) -> bool {
        !self.deltas.is_empty()
    }
}

/// Identifies the point at which a reload from the store was requested. See [`AggregationCache::reload_ticket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    batches_started: u64,
}

#[derive(Debug)]
struct CacheState {
    counts: BucketCounts,
    /// Batches applied to the cache whose store writes have not finished yet
    in_flight: usize,
    batches_started: u64,
    /// Set when the cache may disagree with the store and a reload is still owed
    stale: bool,
}

/// The in-memory counts.
///
/// Batches are applied here before they are written to the store, so while a batch is in flight the cache is ahead
/// of the store. A reload is therefore only accepted when no batch is in flight and none started since the counts
/// were read. Otherwise the cache stays stale and the last in-flight batch to finish asks for the reload again.
#[derive(Debug)]
pub struct AggregationCache {
    state: RwLock<CacheState>,
}

impl AggregationCache {
    pub fn new(counts: BucketCounts) -> Self {
        let state = CacheState { counts, in_flight: 0, batches_started: 0, stale: false };
        Self { state: RwLock::new(state) }
    }

    pub fn snapshot(&self) -> AggregationSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        AggregationSnapshot::new(state.counts)
    }

    /// Applies every classifiable item, in order, to the cache. Items that do not fund a bucket are skipped, as are
    /// items whose quantity would overflow a count.
    ///
    /// A batch that changed anything is in flight until it is passed to [`Self::finish_batch`].
    pub fn apply_batch(&self, items: &[PurchasedItem]) -> BatchOutcome {
        let mut deltas = BucketDeltas::default();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for item in items {
            let Some(bucket) = item.bucket() else {
                debug!("🧮️ '{}' does not fund any donation bucket", item.name);
                continue;
            };
            let mut counts = state.counts;
            let mut next_deltas = deltas;
            match (counts.try_add(bucket, item.quantity), next_deltas.try_record(bucket, item.quantity)) {
                (Some(()), Some(())) => {
                    state.counts = counts;
                    deltas = next_deltas;
                    debug!("🧮️ {} x '{}' added to bucket {bucket} and the total", item.quantity, item.name);
                },
                _ => warn!("🧮️ Skipping {} x '{}'. Bucket {bucket} would overflow.", item.quantity, item.name),
            }
        }
        if !deltas.is_empty() {
            state.in_flight += 1;
            state.batches_started += 1;
        }
        BatchOutcome { snapshot: AggregationSnapshot::new(state.counts), deltas }
    }

    /// Marks a batch from [`Self::apply_batch`] as written to the store. `write_failed` means the cache may now be
    /// ahead of the store.
    ///
    /// Returns a ticket when a reload is owed and no batch is in flight any more.
    pub fn finish_batch(&self, write_failed: bool) -> Option<ReloadTicket> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = state.in_flight.saturating_sub(1);
        state.stale |= write_failed;
        (state.stale && state.in_flight == 0).then_some(ReloadTicket { batches_started: state.batches_started })
    }

    /// Takes a ticket for a reload that is about to read the store.
    pub fn reload_ticket(&self) -> ReloadTicket {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        ReloadTicket { batches_started: state.batches_started }
    }

    /// Replaces the entire cache state with `counts` read from the store after `ticket` was taken.
    ///
    /// The counts are rejected, and `false` returned, if any batch was in flight or started since then, because the
    /// store may not have held all of them yet. The cache is then marked stale and reloaded when those batches finish.
    pub fn reload(&self, ticket: ReloadTicket, counts: BucketCounts) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight > 0 || state.batches_started != ticket.batches_started {
            debug!("🧮️ Batches are in flight. Deferring the cache reload until they are written.");
            state.stale = true;
            return false;
        }
        if state.counts != counts {
            info!("🧮️ Cache reloaded. {} -> {}", AggregationSnapshot::new(state.counts), AggregationSnapshot::new(counts));
        }
        state.counts = counts;
        state.stale = false;
        true
    }
}

impl Default for AggregationCache {
    fn default() -> Self {
        Self::new(BucketCounts::seeded())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buckets::DonationBucket::*;

    #[test]
    fn pizza_batch_on_fresh_state() {
        let cache = AggregationCache::default();
        let outcome = cache.apply_batch(&[PurchasedItem::new("Пицца Маргарита", 2)]);
        assert!(outcome.changed());
        let snapshot = outcome.snapshot;
        assert_eq!(snapshot.get(Total), 22);
        assert_eq!(snapshot.get(Pizza), 9);
        assert_eq!(snapshot.get(Cola), 10);
        assert_eq!(snapshot.get(Burger), 3);
        assert_eq!(cache.snapshot(), snapshot);
        assert_eq!(outcome.deltas.changed().collect::<Vec<_>>(), vec![(Total, 2), (Pizza, 2)]);
    }

    #[test]
    fn unmatched_items_are_ignored() {
        let cache = AggregationCache::default();
        let outcome = cache.apply_batch(&[PurchasedItem::new("Кола", 1), PurchasedItem::new("Компот", 5)]);
        assert_eq!(outcome.snapshot.get(Total), 21);
        assert_eq!(outcome.snapshot.get(Cola), 11);
        assert_eq!(outcome.snapshot.get(Pizza), 7);
        assert_eq!(outcome.snapshot.get(Burger), 3);
    }

    #[test]
    fn batch_without_matches_changes_nothing() {
        let cache = AggregationCache::default();
        let before = cache.snapshot();
        let outcome = cache.apply_batch(&[PurchasedItem::new("Компот", 5)]);
        assert!(!outcome.changed());
        assert_eq!(outcome.snapshot, before);
    }

    #[test]
    fn total_tracks_every_matched_item() {
        let cache = AggregationCache::default();
        let items = [
            PurchasedItem::new("Пицца", 1),
            PurchasedItem::new("Кат Бургер", 4),
            PurchasedItem::new("кола", 2),
            PurchasedItem::new("Двойной Кат", 1),
        ];
        let outcome = cache.apply_batch(&items);
        assert_eq!(outcome.snapshot.get(Total), 28);
        assert_eq!(outcome.snapshot.get(Burger), 8);
        assert_eq!(outcome.deltas.get(Total), 8);
    }

    #[test]
    fn reload_replaces_state() {
        let cache = AggregationCache::default();
        cache.apply_batch(&[PurchasedItem::new("Пицца", 10)]);
        cache.finish_batch(false);
        let counts = BucketCounts::try_from_rows([(1, 100), (2, 50), (3, 30), (4, 20)]).unwrap();
        assert!(cache.reload(cache.reload_ticket(), counts));
        assert_eq!(cache.snapshot().counts(), counts);
    }

    #[test]
    fn overflowing_quantities_are_skipped() {
        let cache = AggregationCache::default();
        let items = [PurchasedItem::new("Пицца", i64::MAX), PurchasedItem::new("Кола", 2)];
        let outcome = cache.apply_batch(&items);
        assert_eq!(outcome.snapshot.get(Pizza), 7);
        assert_eq!(outcome.snapshot.get(Cola), 12);
        assert_eq!(outcome.snapshot.get(Total), 22);
        assert_eq!(outcome.deltas.changed().collect::<Vec<_>>(), vec![(Total, 2), (Cola, 2)]);
    }

    #[test]
    fn reload_waits_for_batches_in_flight() {
        let cache = AggregationCache::default();
        let stored = BucketCounts::seeded();
        cache.apply_batch(&[PurchasedItem::new("Пицца", 1)]);
        cache.apply_batch(&[PurchasedItem::new("Пицца", 1)]);
        // The first batch failed to write while the second is still being written
        assert_eq!(cache.finish_batch(true), None);
        assert!(!cache.reload(cache.reload_ticket(), stored));
        assert_eq!(cache.snapshot().get(Pizza), 9);
        let ticket = cache.finish_batch(false).expect("A reload is owed");
        let stored = BucketCounts::try_from_rows([(1, 21), (2, 8), (3, 10), (4, 3)]).unwrap();
        assert!(cache.reload(ticket, stored));
        assert_eq!(cache.snapshot().counts(), stored);
    }

    #[test]
    fn reload_is_rejected_if_a_batch_started_meanwhile() {
        let cache = AggregationCache::default();
        let ticket = cache.reload_ticket();
        cache.apply_batch(&[PurchasedItem::new("Кола", 1)]);
        cache.finish_batch(false);
        assert!(!cache.reload(ticket, BucketCounts::seeded()));
        assert_eq!(cache.snapshot().get(Cola), 11);
        // The stale cache is reloaded by the next batch to finish
        cache.apply_batch(&[PurchasedItem::new("Кола", 1)]);
        assert!(cache.finish_batch(false).is_some());
    }
}
