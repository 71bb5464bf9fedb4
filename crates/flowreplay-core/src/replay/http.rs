use super::{ReplayConfig, ReplayError};
use crate::model::{ResponseData, TrafficRecord};
use crate::transport::{join_target, HttpForwarder};
use bytes::Bytes;

/// Replays HTTP records against a base URL.
///
/// The recorded request target is normalized to origin-form and appended to
/// the new base, so recordings made through a forward proxy replay the same
/// way as ones made in reverse-proxy mode.
pub struct HttpReplayer {
    target: String,
    forwarder: HttpForwarder,
}

impl HttpReplayer {
    pub fn new(target: &str, config: &ReplayConfig) -> Result<Self, ReplayError> {
        Ok(Self {
            target: target.trim().to_string(),
            forwarder: HttpForwarder::new(config.connect_timeout, config.request_timeout)?,
        })
    }

    pub fn url_for(&self, record: &TrafficRecord) -> String {
        join_target(&self.target, &record.request.uri)
    }

    pub async fn replay(&self, record: &TrafficRecord) -> Result<ResponseData, ReplayError> {
        let request = &record.request;
        let body = request
            .body
            .as_ref()
            .map(|body| Bytes::copy_from_slice(body))
            .unwrap_or_default();

        let response = self
            .forwarder
            .send(&request.method, &self.url_for(record), &request.headers, body)
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Protocol, RequestData};

    #[tokio::test]
    async fn test_url_substitutes_authority() {
        let replayer = HttpReplayer::new("localhost:9090", &ReplayConfig::default()).unwrap();
        let record = TrafficRecord::new(
            "r1",
            Protocol::Http,
            RequestData::new("GET", "http://old-host:8080/api/x?y=1"),
            ResponseData::new(200, ""),
        );
        assert_eq!(replayer.url_for(&record), "http://localhost:9090/api/x?y=1");
    }
}
