//! Donation Engine
//!
//! The donation engine keeps a set of running donation counters up to date as customers pay for their orders, and
//! pushes every change to the viewers watching the counters.
//!
//! The pipeline has four parts:
//! 1. The bucket classifier ([`mod@classifier`]) decides which donation bucket, if any, a purchased item funds.
//! 2. The counter store ([`mod@db`]) durably holds the counters. SQLite is the supported backend. The store retries
//!    transient failures according to a [`retry::RetryPolicy`].
//! 3. The aggregation cache ([`mod@cache`]) mirrors the store in memory and serves reads without touching it.
//! 4. The broadcast gateway ([`mod@events`]) fans snapshots out to every connected viewer.
//!
//! [`DonationFlowApi`] wires these together and is what servers should use.
pub mod buckets;
pub mod cache;
pub mod classifier;
pub mod db;
pub mod events;
pub mod retry;

mod donation_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{ConnectionHealth, CounterStore, CounterStoreError};
pub use donation_api::{DonationApiError, DonationFlowApi};
