//! The donation flow: payment events in, counter updates and broadcasts out.
use std::fmt::Debug;

use log::*;
use serde_json::Value;
use thiserror::Error;

use crate::{
    buckets::AggregationSnapshot,
    cache::{AggregationCache, ReloadTicket},
    classifier::{parse_batch, BatchError, PurchasedItem},
    db::traits::{CounterStore, CounterStoreError},
    events::{BroadcastGateway, Subscription},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DonationApiError {
    #[error("Invalid batch. {0}")]
    InvalidBatch(#[from] BatchError),
    #[error("Counter store error: {0}")]
    StoreError(#[from] CounterStoreError),
}

/// `DonationFlowApi` turns "payment completed" events into donation counter updates.
///
/// It owns the [`AggregationCache`] and pushes every change through the [`BroadcastGateway`]. The backend `B` is the
/// source of truth: the cache is built from it at start-up, and rebuilt from it whenever a write to it fails.
pub struct DonationFlowApi<B> {
    db: B,
    cache: AggregationCache,
    gateway: BroadcastGateway,
}

impl<B> Debug for DonationFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DonationFlowApi ({})", self.cache.snapshot())
    }
}

impl<B> DonationFlowApi<B> {
    /// Creates a new API instance around an existing cache. Prefer [`Self::initialize`], which loads the cache from
    /// the store.
    pub fn new(db: B, cache: AggregationCache, gateway: BroadcastGateway) -> Self {
        Self { db, cache, gateway }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &BroadcastGateway {
        &self.gateway
    }

    /// The current counts. Never touches the store.
    pub fn snapshot(&self) -> AggregationSnapshot {
        self.cache.snapshot()
    }

    /// Connects a new viewer. The current snapshot is returned alongside the subscription so that the viewer can be
    /// brought up to date straight away.
    pub fn subscribe(&self) -> (AggregationSnapshot, Subscription) {
        let subscription = self.gateway.subscribe();
        (self.cache.snapshot(), subscription)
    }
}

impl<B> DonationFlowApi<B>
where B: CounterStore
{
    /// Prepares the store and builds the cache from it.
    pub async fn initialize(db: B, gateway: BroadcastGateway) -> Result<Self, DonationApiError> {
        db.ensure_schema().await?;
        let counts = db.load_all().await?;
        let cache = AggregationCache::new(counts);
        info!("🔄️ Donation counters loaded. {}", cache.snapshot());
        Ok(Self::new(db, cache, gateway))
    }

    /// Handles the raw payload of a "payment completed" event.
    ///
    /// A payload that is not a non-empty list is rejected without touching any counters. Malformed items are skipped.
    pub async fn process_payment(&self, payload: &Value) -> Result<AggregationSnapshot, DonationApiError> {
        let items = parse_batch(payload).map_err(|e| {
            warn!("🔄️ Rejecting payment completed event. {e}. Payload: {payload}");
            e
        })?;
        Ok(self.process_items(&items).await)
    }

    /// Applies a batch of purchased items.
    ///
    /// Every changed bucket is written to the store once. If any of those writes fail, the cache is reloaded from the
    /// store as soon as no other batch is being written. When anything changed, the resulting snapshot is broadcast to
    /// all viewers exactly once.
    ///
    /// This never fails: storage problems are logged and reconciled, and the snapshot returned reflects the cache after
    /// reconciliation.
    pub async fn process_items(&self, items: &[PurchasedItem]) -> AggregationSnapshot {
        let outcome = self.cache.apply_batch(items);
        if !outcome.changed() {
            debug!("🔄️ None of the {} items fund a donation bucket. Nothing to do.", items.len());
            return outcome.snapshot;
        }
        let mut failures = 0;
        for (bucket, delta) in outcome.deltas.changed() {
            match self.db.increment(bucket, delta).await {
                Ok(count) => trace!("🔄️ Stored count for bucket {bucket} is now {count}"),
                Err(e) => {
                    error!("🔄️ Could not persist +{delta} for bucket {bucket}. {e}");
                    failures += 1;
                },
            }
        }
        if failures > 0 {
            warn!("🔄️ {failures} counter writes failed. The cache will be reloaded from the store.");
        }
        if let Some(ticket) = self.cache.finish_batch(failures > 0) {
            if let Err(e) = self.reload_cache(ticket).await {
                error!(
                    "🔄️ Could not reload the cache after a failed write. {e}. The cache and the store disagree until \
                     the next successful reload."
                );
            }
        }
        let snapshot = self.cache.snapshot();
        let viewers = self.gateway.publish(snapshot);
        info!("🔄️ Donations updated to {snapshot}. Notified {viewers} viewers.");
        snapshot
    }

    /// Replaces the cache with the counts held in the store.
    ///
    /// While other batches are still being written, the cache is kept as it is, since it already holds them, and is
    /// reloaded once they are done.
    pub async fn refresh_from_store(&self) -> Result<AggregationSnapshot, DonationApiError> {
        let ticket = self.cache.reload_ticket();
        self.reload_cache(ticket).await
    }

    async fn reload_cache(&self, ticket: ReloadTicket) -> Result<AggregationSnapshot, DonationApiError> {
        let counts = self.db.load_all().await?;
        self.cache.reload(ticket, counts);
        Ok(self.cache.snapshot())
    }
}
