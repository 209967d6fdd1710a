use async_trait::async_trait;
use clap::ValueEnum;
use std::time::Duration;
use thiserror::Error;

pub mod influx_http;
pub mod null;
pub mod point;

pub use influx_http::InfluxHttpSink;
pub use null::NullSink;
pub use point::{Batch, FieldValue, Point};

/// Errors reported by a sink for a single operation
///
/// Write errors are never fatal to a benchmark run: the publisher records
/// them as a failed message and moves on.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The request never produced a response (connect, timeout, I/O)
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("server rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The sink could not be constructed from its configuration
    #[error("invalid sink configuration: {0}")]
    Config(String),
}

/// Available write sinks
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// InfluxDB 1.x HTTP write API
    #[clap(name = "influx")]
    Influx,

    /// Accepts every batch without sending it anywhere
    #[clap(name = "null")]
    Null,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Influx => write!(f, "InfluxDB HTTP"),
            SinkKind::Null => write!(f, "Null"),
        }
    }
}

/// Connection settings shared by every sink instance of a run
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub server: reqwest::Url,
    pub username: String,
    pub password: String,
    pub database: String,
    pub write_timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            server: reqwest::Url::parse(crate::defaults::SERVER)
                .expect("default server URL is valid"),
            username: String::new(),
            password: String::new(),
            database: crate::defaults::DATABASE.to_string(),
            write_timeout: crate::defaults::WRITE_TIMEOUT,
        }
    }
}

/// The store under test, as seen by one client
///
/// Each client owns its own instance. Implementations must be `Sync` since
/// `recreate_database` borrows the sink shared across an await.
#[async_trait]
pub trait WriteSink: Send + Sync {
    /// Submit one batch
    async fn write(&mut self, batch: &Batch) -> Result<(), SinkError>;

    /// Drop and re-create the target database
    ///
    /// Used once per benchmark before any client starts. Sinks without a
    /// notion of databases accept this as a no-op.
    async fn recreate_database(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Sink name for identification in logs
    fn name(&self) -> &'static str;
}

/// Factory for creating sink instances
pub struct SinkFactory;

impl SinkFactory {
    /// Create a new sink instance of the given kind
    pub fn create(kind: SinkKind, config: &SinkConfig) -> Result<Box<dyn WriteSink>, SinkError> {
        match kind {
            SinkKind::Influx => Ok(Box::new(InfluxHttpSink::new(config)?)),
            SinkKind::Null => Ok(Box::new(NullSink::new())),
        }
    }

    /// Create one independent sink per client
    pub fn create_multiple(
        kind: SinkKind,
        config: &SinkConfig,
        count: usize,
    ) -> Result<Vec<Box<dyn WriteSink>>, SinkError> {
        (0..count).map(|_| Self::create(kind, config)).collect()
    }
}
