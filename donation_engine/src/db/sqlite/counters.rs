//! Queries against the `donations` counter table.
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    buckets::{BucketCounts, DonationBucket},
    db::sqlite::SqliteDatabaseError,
};

pub async fn create_table(conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS donations (
            id INTEGER PRIMARY KEY NOT NULL,
            count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0)
        )"#,
    )
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn row_count(conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM donations").fetch_one(conn).await?;
    Ok(count)
}

/// Inserts the default count for every bucket. Buckets that already have a row are left untouched.
/// Returns the number of rows inserted.
pub async fn seed(conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let mut inserted = 0;
    for (bucket, count) in BucketCounts::seeded().iter() {
        let result = sqlx::query("INSERT OR IGNORE INTO donations (id, count) VALUES ($1, $2)")
            .bind(bucket.id())
            .bind(count)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }
    debug!("🗃️ Seeded {inserted} donation counters");
    Ok(inserted)
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<(i64, i64)>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, (i64, i64)>("SELECT id, count FROM donations ORDER BY id").fetch_all(conn).await?;
    trace!("🗃️ Fetched {} donation counters", rows.len());
    Ok(rows)
}

/// Atomically adds `delta` to the bucket's count, returning the new count, or `None` if the bucket has no row.
pub async fn increment(
    bucket: DonationBucket,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let count = sqlx::query_scalar::<_, i64>("UPDATE donations SET count = count + $1 WHERE id = $2 RETURNING count")
        .bind(delta)
        .bind(bucket.id())
        .fetch_optional(conn)
        .await?;
    Ok(count)
}

pub async fn ping(conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("SELECT 1").execute(conn).await?;
    Ok(())
}
