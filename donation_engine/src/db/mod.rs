//! # Counter storage
//!
//! The [`CounterStore`](traits::CounterStore) trait is the contract a durable backend has to fulfil in order to hold
//! the donation counters. The store, not the in-memory cache, is the source of truth.
//!
//! Currently SQLite is the only supported backend.
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;
