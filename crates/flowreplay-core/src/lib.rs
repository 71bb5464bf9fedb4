//! Core of the FlowReplay capture-replay-compare pipeline.
//!
//! # Module Structure
//!
//! - `model` - Traffic records, replay results and comparison verdicts
//! - `transport` - Shared HTTP client, header filtering and URI handling
//! - `recorder` - Sinks that accept captured records
//! - `storage` - Durable record storage and querying
//! - `replay` - Re-issuing captured requests against a new target
//! - `comparator` - Rule-driven comparison of recorded and replayed responses
//! - `parser` - Service-name classification for reporting
//! - `report` - Per-record reports, statistics and HTML rendering

pub mod comparator;
pub mod model;
pub mod parser;
pub mod recorder;
pub mod replay;
pub mod report;
pub mod storage;
pub mod transport;

pub use comparator::{Comparator, ComparatorError, ComparisonConfig};
pub use model::{
    ComparisonResult, DiffKind, Difference, Protocol, ReplayResult, RequestData, ResponseData,
    TrafficRecord,
};
pub use recorder::TrafficRecorder;
pub use replay::{ReplayConfig, ReplayMode, Replayer};
pub use storage::{QueryCriteria, StorageError, TrafficStorage};
