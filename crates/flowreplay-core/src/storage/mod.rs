//! Durable storage for traffic records.
//!
//! # Module Structure
//!
//! - `file` - One JSON document per record, sharded by capture date

mod file;

pub use file::FileStorage;

use crate::model::{Protocol, TrafficRecord};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Default page size of a query.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize record {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse record file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid record id '{0}'")]
    InvalidId(String),
}

/// Record selection for [`TrafficStorage::query`].
///
/// Filters are applied first, matching records are ordered by
/// `(timestamp, id)`, and only then is the `offset`/`limit` page cut.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCriteria {
    pub protocol: Option<Protocol>,
    /// Inclusive lower bound
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub end_time: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for QueryCriteria {
    fn default() -> Self {
        Self {
            protocol: None,
            start_time: None,
            end_time: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn end_time(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a record passes the protocol and time filters.
    pub fn matches(&self, record: &TrafficRecord) -> bool {
        if self.protocol.is_some_and(|p| p != record.protocol) {
            return false;
        }
        if self.start_time.is_some_and(|start| record.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| record.timestamp > end) {
            return false;
        }
        true
    }
}

/// Record store behind the recorder and the replay command.
pub trait TrafficStorage: Send + Sync {
    fn save(&self, record: &TrafficRecord) -> Result<(), StorageError>;

    fn find_by_id(&self, id: &str) -> Result<Option<TrafficRecord>, StorageError>;

    fn query(&self, criteria: &QueryCriteria) -> Result<Vec<TrafficRecord>, StorageError>;

    /// Delete a record, returning whether it existed.
    fn delete(&self, id: &str) -> Result<bool, StorageError>;

    fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RequestData, ResponseData};
    use chrono::TimeZone;

    fn record_at(protocol: Protocol, secs: i64) -> TrafficRecord {
        let mut record = TrafficRecord::new(
            "r",
            protocol,
            RequestData::new("GET", "/"),
            ResponseData::new(200, ""),
        );
        record.timestamp = Utc.timestamp_opt(secs, 0).unwrap();
        record
    }

    #[test]
    fn test_default_criteria_match_everything() {
        let criteria = QueryCriteria::default();
        assert_eq!(criteria.limit, 100);
        assert_eq!(criteria.offset, 0);
        assert!(criteria.matches(&record_at(Protocol::Http, 0)));
        assert!(criteria.matches(&record_at(Protocol::Socket, 1_000_000)));
    }

    #[test]
    fn test_time_window_is_inclusive() {
        let criteria = QueryCriteria::new()
            .start_time(Utc.timestamp_opt(100, 0).unwrap())
            .end_time(Utc.timestamp_opt(200, 0).unwrap());

        assert!(!criteria.matches(&record_at(Protocol::Http, 99)));
        assert!(criteria.matches(&record_at(Protocol::Http, 100)));
        assert!(criteria.matches(&record_at(Protocol::Http, 200)));
        assert!(!criteria.matches(&record_at(Protocol::Http, 201)));
    }

    #[test]
    fn test_protocol_filter() {
        let criteria = QueryCriteria::new().protocol(Protocol::Socket);
        assert!(criteria.matches(&record_at(Protocol::Socket, 0)));
        assert!(!criteria.matches(&record_at(Protocol::Http, 0)));
    }
}
