//! Push notifications to connected viewers
//!
//! The [`BroadcastGateway`] keeps track of every connected viewer and fans each new [`AggregationSnapshot`] out to
//! all of them. The transport (an SSE stream, a websocket, ...) lives outside the engine and only ever sees a
//! [`Subscription`].
//!
//! [`AggregationSnapshot`]: crate::buckets::AggregationSnapshot
mod event_types;
mod gateway;

pub use event_types::{DonationsUpdated, UPDATE_DONATIONS_EVENT};
pub use gateway::{BroadcastGateway, Subscription, ViewerId, DEFAULT_VIEWER_BUFFER};
