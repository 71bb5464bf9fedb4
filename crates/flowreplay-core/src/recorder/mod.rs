//! Sinks for captured traffic.
//!
//! Capture proxies hand every finished exchange to a [`TrafficRecorder`].
//! Recorders are shared across connections, so implementations must accept
//! concurrent calls, and they never surface failures to the proxy: a record
//! that cannot be stored is logged and dropped while the proxy keeps serving.

mod memory;

pub use memory::MemoryRecorder;

use crate::model::TrafficRecord;
use crate::storage::TrafficStorage;
use std::sync::Arc;
use tracing::{debug, error};

/// Accepts complete traffic records from capture handlers.
pub trait TrafficRecorder: Send + Sync {
    /// Record one complete exchange.
    fn record(&self, record: TrafficRecord);

    /// Flush and release underlying resources.
    fn close(&self);
}

/// Recorder that persists every record through a [`TrafficStorage`].
pub struct StorageRecorder {
    storage: Arc<dyn TrafficStorage>,
}

impl StorageRecorder {
    pub fn new(storage: Arc<dyn TrafficStorage>) -> Self {
        Self { storage }
    }
}

impl TrafficRecorder for StorageRecorder {
    fn record(&self, record: TrafficRecord) {
        match self.storage.save(&record) {
            Ok(()) => debug!("Recorded traffic: {}", record.id),
            Err(e) => error!("Failed to record traffic {}: {}", record.id, e),
        }
    }

    fn close(&self) {
        if let Err(e) = self.storage.close() {
            error!("Failed to close storage: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Protocol, RequestData, ResponseData};
    use crate::storage::{QueryCriteria, StorageError};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FlakyStorage {
        saved: Mutex<Vec<String>>,
        fail: bool,
    }

    impl TrafficStorage for FlakyStorage {
        fn save(&self, record: &TrafficRecord) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::Io {
                    path: "disk".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.saved.lock().push(record.id.clone());
            Ok(())
        }

        fn find_by_id(&self, _id: &str) -> Result<Option<TrafficRecord>, StorageError> {
            Ok(None)
        }

        fn query(&self, _criteria: &QueryCriteria) -> Result<Vec<TrafficRecord>, StorageError> {
            Ok(Vec::new())
        }

        fn delete(&self, _id: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    fn record(id: &str) -> TrafficRecord {
        TrafficRecord::new(
            id,
            Protocol::Http,
            RequestData::new("GET", "/"),
            ResponseData::new(200, ""),
        )
    }

    #[test]
    fn test_storage_recorder_saves_records() {
        let storage = Arc::new(FlakyStorage::default());
        let recorder = StorageRecorder::new(storage.clone());

        recorder.record(record("a"));
        recorder.record(record("b"));
        recorder.close();

        assert_eq!(*storage.saved.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_storage_recorder_swallows_save_failures() {
        let storage = Arc::new(FlakyStorage {
            fail: true,
            ..Default::default()
        });
        let recorder = StorageRecorder::new(storage.clone());

        recorder.record(record("a"));
        assert!(storage.saved.lock().is_empty());
    }
}
