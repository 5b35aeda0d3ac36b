//! # pylon-rest
//!
//! Serialized REST request scheduler for the Pylon client:
//!
//! - **Bucket registry**: per-route remaining-quota tracking fed by response
//!   headers, with expiry pruning
//! - **Scheduler**: FIFO queue with a single worker task, global and
//!   per-route rate gates, transient-failure retry with backoff
//!
//! The scheduler never runs two requests concurrently for one client
//! instance. That trades throughput for a provable absence of burst
//! violations against the server's budget.

#![deny(unsafe_code)]

pub mod bucket;
pub mod error;
pub mod scheduler;

pub use bucket::{BucketRegistry, RateLimitBucket, RateLimitHeaders};
pub use error::RestError;
pub use scheduler::{RequestScheduler, RestConfig};
