//! Capture protocol selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the capture listener speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureProtocol {
    /// HTTP/1.1 proxy; one record per request
    #[default]
    Http,
    /// Raw byte relay; one record per connection
    Tcp,
}

impl CaptureProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureProtocol::Http => "http",
            CaptureProtocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for CaptureProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(CaptureProtocol::Http),
            "tcp" | "socket" => Ok(CaptureProtocol::Tcp),
            other => Err(format!("Unsupported capture protocol: {other}")),
        }
    }
}
