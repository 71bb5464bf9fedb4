//! Handing captured records to the recorder.

use flowreplay_core::model::Metadata;
use flowreplay_core::{TrafficRecord, TrafficRecorder};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Deliver a record without blocking the runtime; recorders may do file I/O.
pub(crate) async fn deliver(recorder: &Arc<dyn TrafficRecorder>, record: TrafficRecord) {
    let recorder = Arc::clone(recorder);
    let id = record.id.clone();
    debug!("Recording {} {}", record.protocol, id);
    if let Err(err) = tokio::task::spawn_blocking(move || recorder.record(record)).await {
        error!("Recorder task for {} failed: {}", id, err);
    }
}

pub(crate) fn target_metadata(host: &str, port: u16) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("targetHost".to_string(), json!(host));
    metadata.insert("targetPort".to_string(), json!(port));
    metadata
}

/// `host:port`, bracketing IPv6 literals.
pub(crate) fn authority(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowreplay_core::model::{Protocol, RequestData, ResponseData};
    use flowreplay_core::recorder::MemoryRecorder;

    #[test]
    fn test_authority() {
        assert_eq!(authority("localhost", 80), "localhost:80");
        assert_eq!(authority("::1", 6379), "[::1]:6379");
    }

    #[tokio::test]
    async fn test_deliver_reaches_recorder() {
        let memory = Arc::new(MemoryRecorder::new());
        let recorder: Arc<dyn TrafficRecorder> = memory.clone();
        let record = TrafficRecord::new(
            "r1",
            Protocol::Http,
            RequestData::new("GET", "/"),
            ResponseData::new(200, ""),
        )
        .with_metadata(target_metadata("backend", 9000));

        deliver(&recorder, record).await;

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata["targetHost"], "backend");
        assert_eq!(records[0].metadata["targetPort"], 9000);
    }
}
