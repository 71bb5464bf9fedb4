//! Shared value types for captured traffic, replay outcomes and comparison verdicts.
//!
//! # Module Structure
//!
//! - `traffic` - Captured exchanges (`TrafficRecord`, `RequestData`, `ResponseData`)
//! - `outcome` - Replay and comparison results
//! - `body` - Base64 (de)serialization of raw payloads

mod body;
mod outcome;
mod traffic;

pub use outcome::{ComparisonResult, DiffKind, Difference, ReplayResult, SKIPPED_METRIC};
pub use traffic::{Metadata, Protocol, RequestData, ResponseData, TrafficRecord};
