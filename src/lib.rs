//! # InfluxDB Write Benchmark Library
//!
//! A concurrent write-load generator for InfluxDB. It starts N independent
//! virtual clients, each generating synthetic points, writing them in batches
//! and timing every write, then merges the per-client statistics into a
//! benchmark-wide report.
//!
//! ## Architecture Overview
//!
//! - `benchmark`: top-level driver that sets up sinks, starts clients and collects results
//! - `client`: one client's generate→publish→measure pipeline
//! - `generator`: synthetic batch production with backpressure
//! - `publisher`: delivery of batches to the write sink
//! - `metrics`: nearest-rank percentiles and latency summaries
//! - `results`: per-client and total results, aggregation and report output
//! - `sink`: the `WriteSink` abstraction and its InfluxDB HTTP and null implementations
//! - `cli`, `logging`, `utils`: command line, log setup and validation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use influx_write_bench::{BenchmarkConfig, BenchmarkRunner, SinkKind};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig {
//!         sink_kind: SinkKind::Null,
//!         clients: 4,
//!         msg_count: 1000,
//!         batch_size: 100,
//!         ..Default::default()
//!     };
//!
//!     let outcome = BenchmarkRunner::new(config).run(None).await?;
//!     println!("Total throughput: {:.1} msg/s", outcome.totals.total_messages_per_second);
//!     Ok(())
//! }
//! ```

/// Benchmark driver
///
/// Contains `BenchmarkConfig` and `BenchmarkRunner`. The runner validates
/// nothing itself; configuration is validated once in `BenchmarkConfig::from_args`.
pub mod benchmark;

/// Command-line interface
pub mod cli;

/// Per-client pipeline orchestration
pub mod client;

/// Synthetic data generation
pub mod generator;

pub mod logging;

/// Statistics over latency samples
///
/// Provides the nearest-rank percentile estimator used for every reported
/// percentile, plus min/max/mean/sample standard deviation helpers that
/// return zero on empty input.
pub mod metrics;

pub mod publisher;

/// Result models, aggregation and report output
///
/// - `RunResult` and `TotalResult` with the JSON field names of the report
/// - `aggregate` to merge per-client results
/// - Text and JSON rendering, optional streaming of results as they arrive
pub mod results;

/// Write sinks
///
/// The `WriteSink` trait is the only view the benchmark has of the store.
pub mod sink;

pub mod utils;

pub use benchmark::{BenchmarkConfig, BenchmarkOutcome, BenchmarkRunner};
pub use cli::{Args, OutputFormat};
pub use results::{aggregate, ResultsManager, RunResult, TotalResult};
pub use sink::{SinkKind, WriteSink};

/// The current version of the benchmark
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default InfluxDB endpoint
    pub const SERVER: &str = "http://localhost:8086";

    /// Default target database; it is dropped and re-created unless `--clean false`
    pub const DATABASE: &str = "benchmarking";

    /// Default number of points per client
    pub const MSG_COUNT: usize = 100;

    /// Default batch size (no batching)
    pub const BATCH_SIZE: usize = 1;

    /// Default number of concurrent clients
    pub const CLIENTS: usize = 10;

    /// Default timeout of a single write request
    ///
    /// Bounds how long a client can hang on an unresponsive server; a timed
    /// out write counts as a failure.
    pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
}
