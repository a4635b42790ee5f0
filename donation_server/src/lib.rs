//! # Donation counter server
//! This crate hosts the HTTP surface of the donation counter. It is responsible for:
//! Receiving "payment completed" notifications and passing the purchased items to the donation engine.
//! Serving the current donation counts.
//! Streaming every change in the counts to connected viewers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/donations`: The current donation counts, freshly loaded from the database.
//! * `/donations/payment_completed`: Accepts the list of items of a completed payment.
//! * `/donations/stream`: A server-sent event stream of `updateDonations` events.

pub mod cli;
pub mod config;
pub mod connection_worker;
pub mod errors;
pub mod helpers;
pub mod routes;
pub mod server;
