use std::time::Duration;

use donation_engine::{ConnectionHealth, CounterStore, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the connection worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, the worker checks that the database is reachable. The store rebuilds its connection pool when the
/// check fails. Failures are logged and never stop the worker.
pub fn start_connection_worker(db: SqliteDatabase, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        // The first tick completes immediately, and the connection was just made
        timer.tick().await;
        info!("🩺️ Database connection worker started. Checking every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🩺️ Running database connection check");
            match db.check_connection().await {
                Ok(ConnectionHealth::Healthy) => debug!("🩺️ Database connection is healthy"),
                Ok(ConnectionHealth::Rebuilt) => warn!("🩺️ Database connection was lost and has been rebuilt"),
                Err(e) => error!("🩺️ Database is unreachable and the connection could not be rebuilt. {e}"),
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn worker_rebuilds_a_closed_pool() {
        let _ = env_logger::try_init();
        let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating database");
        db.pool().await.close().await;
        assert!(db.pool().await.is_closed());
        let worker = start_connection_worker(db.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(500)).await;
        worker.abort();
        assert!(!db.pool().await.is_closed());
        assert_eq!(db.check_connection().await.unwrap(), ConnectionHealth::Healthy);
    }
}
