use super::*;
use crate::model::{Protocol, RequestData, ResponseData};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answers with the record id as body after a per-record delay.
struct ScriptedExecutor {
    delays_ms: Vec<u64>,
    fail_ids: Vec<String>,
    started: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    fn new(delays_ms: Vec<u64>) -> Self {
        Self {
            delays_ms,
            fail_ids: Vec::new(),
            started: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, ids: &[&str]) -> Self {
        self.fail_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl ReplayExecutor for ScriptedExecutor {
    async fn execute(&self, record: &TrafficRecord) -> Result<ResponseData, ReplayError> {
        self.started.lock().push(record.id.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let index: usize = record.id.trim_start_matches('r').parse().unwrap_or(0);
        let delay = self.delays_ms.get(index).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_ids.contains(&record.id) {
            return Err(ReplayError::Connect {
                target: "127.0.0.1:1".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Connection refused",
                ),
            });
        }
        Ok(ResponseData::new(200, record.id.clone()))
    }
}

fn records(n: usize) -> Vec<TrafficRecord> {
    (0..n)
        .map(|i| {
            TrafficRecord::new(
                format!("r{i}"),
                Protocol::Http,
                RequestData::new("GET", format!("/item/{i}")),
                ResponseData::new(200, format!("r{i}")),
            )
        })
        .collect()
}

fn assert_aligned(records: &[TrafficRecord], results: &[ReplayResult]) {
    assert_eq!(results.len(), records.len());
    for (record, result) in records.iter().zip(results) {
        assert_eq!(result.record_id, record.id);
    }
}

#[tokio::test]
async fn test_sequential_preserves_execution_and_result_order() {
    let executor = Arc::new(ScriptedExecutor::new(vec![30, 20, 10, 0]));
    let replayer = Replayer::with_executor(executor.clone(), None);
    let input = records(4);

    let results = replayer.replay(&input, ReplayMode::Sequential).await;

    assert_aligned(&input, &results);
    assert_eq!(*executor.started.lock(), vec!["r0", "r1", "r2", "r3"]);
    assert_eq!(executor.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_results_follow_input_order_with_reverse_delays() {
    let n = 8;
    let delays: Vec<u64> = (0..n as u64).rev().map(|i| i * 15).collect();
    let executor = Arc::new(ScriptedExecutor::new(delays));
    let replayer = Replayer::with_executor(executor.clone(), None);
    let input = records(n);

    let results = replayer.replay(&input, ReplayMode::Concurrent).await;

    assert_aligned(&input, &results);
    for (i, result) in results.iter().enumerate() {
        assert!(result.success);
        assert_eq!(result.response.as_ref().unwrap().body_text(), format!("r{i}"));
    }
    assert!(executor.peak.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_concurrency_limit_is_honored() {
    let executor = Arc::new(ScriptedExecutor::new(vec![20; 10]));
    let replayer = Replayer::with_executor(executor.clone(), Some(2));
    let input = records(10);

    let results = replayer.replay(&input, ReplayMode::Concurrent).await;

    assert_aligned(&input, &results);
    assert!(executor.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_failures_are_isolated_in_both_modes() {
    for mode in [ReplayMode::Sequential, ReplayMode::Concurrent] {
        let executor = Arc::new(ScriptedExecutor::new(vec![0; 5]).failing(&["r1", "r3"]));
        let replayer = Replayer::with_executor(executor, None);
        let input = records(5);

        let results = replayer.replay(&input, mode).await;

        assert_aligned(&input, &results);
        let flags: Vec<_> = results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, true, false, true]);
        assert!(results[1].response.is_none());
        assert!(results[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("Connection refused"));
    }
}

#[tokio::test]
async fn test_empty_batch() {
    let replayer = Replayer::with_executor(Arc::new(ScriptedExecutor::new(Vec::new())), None);
    assert!(replayer.replay(&[], ReplayMode::Concurrent).await.is_empty());
    assert!(replayer.replay(&[], ReplayMode::Sequential).await.is_empty());
}

#[test]
fn test_mode_parsing() {
    assert_eq!("Concurrent".parse::<ReplayMode>().unwrap(), ReplayMode::Concurrent);
    assert_eq!("sequential".parse::<ReplayMode>().unwrap(), ReplayMode::Sequential);
    assert!("parallel".parse::<ReplayMode>().is_err());
}

fn socket_record(id: &str, body: &[u8]) -> TrafficRecord {
    TrafficRecord::new(
        id,
        Protocol::Socket,
        RequestData::new("raw", "old-host:6379").with_body(body.to_vec()),
        ResponseData::new(0, ""),
    )
}

fn fast_tcp_config() -> ReplayConfig {
    ReplayConfig {
        tcp_initial_read_timeout: Duration::from_secs(2),
        tcp_idle_timeout: Duration::from_millis(200),
        ..ReplayConfig::default()
    }
}

#[tokio::test]
async fn test_tcp_replay_reads_until_idle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        let n = socket.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PING\r\n");
        socket.write_all(b"+PO").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket.write_all(b"NG\r\n").await.unwrap();
        // Keep the connection open so completion comes from the idle timeout.
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let replayer = Replayer::new(&addr.to_string(), fast_tcp_config()).unwrap();
    let results = replayer
        .replay(&[socket_record("s1", b"PING\r\n")], ReplayMode::Sequential)
        .await;

    assert!(results[0].success, "{:?}", results[0].error_message);
    let response = results[0].response.as_ref().unwrap();
    assert_eq!(response.status_code, 0);
    assert_eq!(response.body, b"+PONG\r\n");
}

#[tokio::test]
async fn test_tcp_replay_completes_on_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        let _ = socket.read(&mut buf).await.unwrap();
        socket.write_all(b"bye").await.unwrap();
    });

    let config = ReplayConfig {
        tcp_idle_timeout: Duration::from_secs(10),
        ..fast_tcp_config()
    };
    let replayer = Replayer::new(&addr.to_string(), config).unwrap();
    let started = std::time::Instant::now();
    let results = replayer
        .replay(&[socket_record("s1", b"hello")], ReplayMode::Sequential)
        .await;

    assert_eq!(results[0].response.as_ref().unwrap().body, b"bye");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_tcp_replay_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let replayer = Replayer::new(&addr.to_string(), fast_tcp_config()).unwrap();
    let results = replayer
        .replay(&[socket_record("s1", b"x")], ReplayMode::Concurrent)
        .await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(results[0].response.is_none());
    assert!(results[0].error_message.is_some());
}
