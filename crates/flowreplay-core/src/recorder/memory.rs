//! In-memory recorder.

use super::TrafficRecorder;
use crate::model::TrafficRecord;
use parking_lot::RwLock;

/// Keeps every record in memory, in arrival order.
#[derive(Default)]
pub struct MemoryRecorder {
    records: RwLock<Vec<TrafficRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records received so far.
    pub fn records(&self) -> Vec<TrafficRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl TrafficRecorder for MemoryRecorder {
    fn record(&self, record: TrafficRecord) {
        self.records.write().push(record);
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Protocol, RequestData, ResponseData};
    use std::sync::Arc;

    #[test]
    fn test_concurrent_records_are_all_kept() {
        let recorder = Arc::new(MemoryRecorder::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        recorder.record(TrafficRecord::new(
                            format!("{i}-{j}"),
                            Protocol::Socket,
                            RequestData::new("raw", "localhost:9000"),
                            ResponseData::new(0, ""),
                        ));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.len(), 200);
        recorder.clear();
        assert!(recorder.is_empty());
    }
}
