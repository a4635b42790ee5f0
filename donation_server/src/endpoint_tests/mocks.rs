use donation_engine::{
    buckets::{BucketCounts, DonationBucket},
    ConnectionHealth,
    CounterStore,
    CounterStoreError,
};
use mockall::mock;

mock! {
    pub Store {}
    impl CounterStore for Store {
        async fn ensure_schema(&self) -> Result<(), CounterStoreError>;
        async fn load_all(&self) -> Result<BucketCounts, CounterStoreError>;
        async fn increment(&self, bucket: DonationBucket, delta: i64) -> Result<i64, CounterStoreError>;
        async fn check_connection(&self) -> Result<ConnectionHealth, CounterStoreError>;
    }
}
