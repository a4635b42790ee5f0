use thiserror::Error;

use crate::{
    buckets::{BucketError, DonationBucket},
    db::traits::CounterStoreError,
    retry::Retryable,
};

// SQLITE_BUSY, SQLITE_LOCKED, SQLITE_BUSY_RECOVERY, SQLITE_BUSY_SNAPSHOT
const TRANSIENT_SQLITE_CODES: [&str; 4] = ["5", "6", "261", "517"];

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Donation bucket {0} was not found")]
    BucketNotFound(DonationBucket),
    #[error("Invalid counter data. {0}")]
    InvalidData(#[from] BucketError),
}

impl Retryable for SqliteDatabaseError {
    fn is_transient(&self) -> bool {
        match self {
            Self::DriverError(e) => is_transient_driver_error(e),
            _ => false,
        }
    }
}

fn is_transient_driver_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut |
        sqlx::Error::PoolClosed |
        sqlx::Error::WorkerCrashed |
        sqlx::Error::Io(_) |
        sqlx::Error::Tls(_) |
        sqlx::Error::Protocol(_) => true,
        sqlx::Error::Database(db_err) => {
            db_err.code().map(|code| TRANSIENT_SQLITE_CODES.contains(&code.as_ref())).unwrap_or(false)
        },
        _ => false,
    }
}

impl From<SqliteDatabaseError> for CounterStoreError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::BucketNotFound(bucket) => Self::BucketNotFound(bucket),
            SqliteDatabaseError::InvalidData(e) => Self::InvalidData(e),
            e if e.is_transient() => Self::Unavailable(e.to_string()),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pool_errors_are_transient() {
        assert!(SqliteDatabaseError::DriverError(sqlx::Error::PoolTimedOut).is_transient());
        assert!(SqliteDatabaseError::DriverError(sqlx::Error::PoolClosed).is_transient());
        assert!(!SqliteDatabaseError::DriverError(sqlx::Error::RowNotFound).is_transient());
        assert!(!SqliteDatabaseError::BucketNotFound(DonationBucket::Pizza).is_transient());
    }

    #[test]
    fn conversion_to_store_errors() {
        let e = CounterStoreError::from(SqliteDatabaseError::DriverError(sqlx::Error::PoolTimedOut));
        assert!(matches!(e, CounterStoreError::Unavailable(_)));
        let e = CounterStoreError::from(SqliteDatabaseError::BucketNotFound(DonationBucket::Cola));
        assert_eq!(e, CounterStoreError::BucketNotFound(DonationBucket::Cola));
        let e = CounterStoreError::from(SqliteDatabaseError::DriverError(sqlx::Error::RowNotFound));
        assert!(matches!(e, CounterStoreError::DatabaseError(_)));
    }
}
