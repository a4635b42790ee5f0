use std::{fmt::Debug, future::Future, sync::Arc};

use log::*;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use super::{counters, db_url, new_pool, PoolSettings, SqliteDatabaseError};
use crate::{
    buckets::{BucketCounts, DonationBucket},
    db::traits::{ConnectionHealth, CounterStore, CounterStoreError},
};

/// SQLite-backed [`CounterStore`].
///
/// Every operation is retried according to the configured [`RetryPolicy`](crate::retry::RetryPolicy). The pool sits
/// behind a lock so that [`CounterStore::check_connection`] can swap it for a fresh one without disturbing callers
/// that already hold a handle to the old one.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    settings: PoolSettings,
    pool: Arc<RwLock<SqlitePool>>,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Connects to the database given in the `DCS_DATABASE_URL` environment variable, or the default URL.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let settings = PoolSettings::default().with_max_connections(max_connections);
        Self::new_with_settings(url, settings).await
    }

    pub async fn new_with_settings(url: &str, settings: PoolSettings) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, &settings).await?;
        debug!("🗃️ Connected to {url} with up to {} connections", settings.max_connections);
        Ok(Self { url: url.to_string(), settings, pool: Arc::new(RwLock::new(pool)) })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// A handle to the current connection pool.
    pub async fn pool(&self) -> SqlitePool {
        self.pool.read().await.clone()
    }

    pub async fn close(&self) {
        self.pool().await.close().await;
    }

    async fn with_retries<T, F, Fut>(&self, label: &str, op: F) -> Result<T, SqliteDatabaseError>
    where
        F: Fn(SqlitePool) -> Fut,
        Fut: Future<Output = Result<T, SqliteDatabaseError>>,
    {
        let op = &op;
        self.settings.retry.run(label, move || async move { op(self.pool().await).await }).await
    }

    async fn ensure_schema_once(pool: SqlitePool) -> Result<(), SqliteDatabaseError> {
        let mut tx = pool.begin().await?;
        counters::create_table(&mut tx).await?;
        if counters::row_count(&mut tx).await? == 0 {
            info!("🗃️ The donation counter table is empty. Seeding it with the default counts.");
            counters::seed(&mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_all_once(pool: SqlitePool) -> Result<Vec<(i64, i64)>, SqliteDatabaseError> {
        let mut conn = pool.acquire().await?;
        let rows = counters::fetch_all(&mut conn).await?;
        if !rows.is_empty() {
            return Ok(rows);
        }
        // The pool may only have this one connection
        drop(conn);
        warn!("🗃️ No donation counters were found. Re-seeding the table and trying again.");
        let mut tx = pool.begin().await?;
        counters::seed(&mut tx).await?;
        let rows = counters::fetch_all(&mut tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn rebuild_pool(&self) -> Result<(), SqliteDatabaseError> {
        let fresh = new_pool(&self.url, &self.settings).await?;
        let old = {
            let mut pool = self.pool.write().await;
            std::mem::replace(&mut *pool, fresh)
        };
        tokio::spawn(async move {
            old.close().await;
            trace!("🗃️ Old connection pool closed");
        });
        Ok(())
    }
}

impl CounterStore for SqliteDatabase {
    async fn ensure_schema(&self) -> Result<(), CounterStoreError> {
        self.with_retries("ensure_schema", Self::ensure_schema_once).await?;
        debug!("🗃️ Donation counter schema is in place");
        Ok(())
    }

    async fn load_all(&self) -> Result<BucketCounts, CounterStoreError> {
        let rows = self.with_retries("load_all", Self::load_all_once).await?;
        let counts = BucketCounts::try_from_rows(rows).map_err(|e| {
            error!("🗃️ The donation counter table holds invalid data. {e}");
            SqliteDatabaseError::InvalidData(e)
        })?;
        Ok(counts)
    }

    async fn increment(&self, bucket: DonationBucket, delta: i64) -> Result<i64, CounterStoreError> {
        if delta <= 0 {
            return Err(CounterStoreError::InvalidDelta(delta));
        }
        let label = format!("increment {bucket}");
        let count = self
            .with_retries(&label, |pool| async move {
                let mut conn = pool.acquire().await?;
                counters::increment(bucket, delta, &mut conn).await
            })
            .await?
            .ok_or(SqliteDatabaseError::BucketNotFound(bucket))?;
        trace!("🗃️ Bucket {bucket} incremented by {delta} to {count}");
        Ok(count)
    }

    async fn check_connection(&self) -> Result<ConnectionHealth, CounterStoreError> {
        let pool = self.pool().await;
        let result = match pool.acquire().await {
            Ok(mut conn) => counters::ping(&mut conn).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => {
                trace!("🗃️ Database connection is healthy");
                Ok(ConnectionHealth::Healthy)
            },
            Err(e) => {
                warn!("🗃️ Database health check failed. {e}. Rebuilding the connection pool.");
                self.with_retries("rebuild pool", |_| self.rebuild_pool()).await?;
                info!("🗃️ Database connection pool rebuilt");
                Ok(ConnectionHealth::Rebuilt)
            },
        }
    }
}
