//! Record transport: HTTP posting and local-file debugging.
//!
//! Records are posted one JSON object at a time. The HTTP sink targets a
//! Logstash-style ingest endpoint; the file sink appends pretty-printed
//! JSON locally for offline inspection.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

/// Error type for record posting.
#[derive(Debug)]
pub enum SinkError {
    /// Transport-level HTTP failure.
    Http(reqwest::Error),
    /// The endpoint answered with a non-success status.
    Status(u16),
    /// Local file I/O failure.
    Io(std::io::Error),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Http(e) => write!(f, "HTTP error: {}", e),
            SinkError::Status(code) => write!(f, "endpoint answered HTTP {}", code),
            SinkError::Io(e) => write!(f, "sink I/O error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Http(e)
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Transport accepting one JSON record per post.
pub trait MetricsSink {
    /// Posts a single record.
    fn post(&self, record: &serde_json::Value) -> Result<(), SinkError>;
}

/// Blocking HTTP sink posting each record as a JSON body.
pub struct HttpSink {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpSink {
    /// Creates a sink for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl MetricsSink for HttpSink {
    fn post(&self, record: &serde_json::Value) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(record).send()?;
        let status = response.status();
        debug!("post status_code: {}", status.as_u16());

        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Debug sink appending pretty-printed records to a local file.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Creates a sink appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetricsSink for FileSink {
    fn post(&self, record: &serde_json::Value) -> Result<(), SinkError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let pretty = serde_json::to_string_pretty(record).map_err(std::io::Error::from)?;
        file.write_all(pretty.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}
