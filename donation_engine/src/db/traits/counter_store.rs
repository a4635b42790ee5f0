use thiserror::Error;

use crate::{
    buckets::{BucketCounts, BucketError, DonationBucket},
    retry::Retryable,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterStoreError {
    #[error("The counter store is unavailable. {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Donation bucket {0} does not exist in the counter store")]
    BucketNotFound(DonationBucket),
    #[error("The counter store holds invalid data. {0}")]
    InvalidData(#[from] BucketError),
    #[error("Counters can only be incremented by a positive amount, not {0}")]
    InvalidDelta(i64),
}

impl Retryable for CounterStoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    /// The existing connection resource answered the health check
    Healthy,
    /// The health check failed and the connection resource was replaced with a fresh one
    Rebuilt,
}

/// Durable storage for the donation counters.
///
/// Implementations are expected to retry transient failures according to their own retry policy before returning an
/// error, so callers should treat any error returned from these methods as final for that call.
#[allow(async_fn_in_trait)]
pub trait CounterStore {
    /// Creates the counter table if it does not exist, and seeds it with the default counts if it is empty.
    ///
    /// Calling this more than once must not duplicate or modify existing rows.
    async fn ensure_schema(&self) -> Result<(), CounterStoreError>;

    /// Fetches every counter. If the store is empty, it is re-seeded and read once more.
    async fn load_all(&self) -> Result<BucketCounts, CounterStoreError>;

    /// Adds `delta` to the stored count of `bucket` and returns the new count.
    ///
    /// This must be a single atomic `count = count + delta` update in the store, and never a read-modify-write in the
    /// application, so that concurrent writers cannot lose updates.
    async fn increment(&self, bucket: DonationBucket, delta: i64) -> Result<i64, CounterStoreError>;

    /// Checks that the store is reachable, rebuilding the underlying connection resource if it is not.
    async fn check_connection(&self) -> Result<ConnectionHealth, CounterStoreError>;
}
