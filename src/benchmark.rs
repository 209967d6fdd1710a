//! # Benchmark Engine Module
//!
//! Top-level driver of a benchmark run. It validates the configuration,
//! optionally re-creates the target database, connects one sink per client,
//! starts every client concurrently and collects exactly one result from
//! each before computing the benchmark totals.
//!
//! ## Execution Lifecycle
//!
//! 1. **Validation**: `BenchmarkConfig::from_args` rejects unusable settings
//! 2. **Setup**: database clean-up and sink construction; any failure here
//!    aborts the run before a single client starts
//! 3. **Load**: one task per client, each running its own pipeline
//! 4. **Collection**: results arrive on a channel in completion order
//! 5. **Aggregation**: per-client results are merged into a `TotalResult`

use crate::{
    cli::{Args, OutputFormat},
    client::{ClientConfig, ClientRunner},
    generator::PartialBatchPolicy,
    results::{aggregate, ResultsManager, RunResult, TotalResult},
    sink::{SinkConfig, SinkFactory, SinkKind, WriteSink},
    utils,
};
use anyhow::{Context, Result};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Consistent display of the run configuration for the startup banner
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config;
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Benchmark against: {}", config.sink.server)?;
        writeln!(f, "  Sink:               {}", config.sink_kind)?;
        writeln!(f, "  Database:           {}", config.sink.database)?;
        writeln!(
            f,
            "  Clean Database:     {}",
            if config.clean { "Yes" } else { "No" }
        )?;
        writeln!(f, "  Clients:            {}", config.clients)?;
        writeln!(f, "  Points per Client:  {}", config.msg_count)?;
        writeln!(f, "  Batch Size:         {}", config.batch_size)?;
        let partial = match config.partial_batch {
            PartialBatchPolicy::Discard => "Discarded (default)",
            PartialBatchPolicy::Flush => "Flushed as a short batch",
        };
        writeln!(f, "  Partial Batch:      {}", partial)?;
        writeln!(f, "  Write Timeout:      {:?}", config.sink.write_timeout)?;
        let seed = config
            .seed
            .map_or("Random".to_string(), |s| s.to_string());
        writeln!(f, "  Seed:               {}", seed)?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Validated configuration of a benchmark run
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// Connection settings handed to every sink instance
    pub sink: SinkConfig,

    /// Which sink implementation to drive
    pub sink_kind: SinkKind,

    /// Drop and re-create the database before the run
    pub clean: bool,

    /// Points generated per client
    pub msg_count: usize,

    /// Points per write
    pub batch_size: usize,

    /// Number of concurrent clients
    pub clients: usize,

    pub partial_batch: PartialBatchPolicy,

    /// Base seed for the generators; `None` seeds from entropy
    pub seed: Option<u64>,

    pub format: OutputFormat,
}

impl BenchmarkConfig {
    /// Create benchmark configuration from CLI arguments
    ///
    /// ## Validation
    /// - At least one client
    /// - `1 <= batch <= count`
    /// - Non-empty database name
    /// - An `http`/`https` server URL
    pub fn from_args(args: &Args) -> Result<Self> {
        utils::validate_client_count(args.clients)?;
        utils::validate_batch_size(args.batch, args.count)?;
        utils::validate_database_name(&args.database)?;
        let server = utils::validate_server_url(&args.server)?;

        Ok(Self {
            sink: SinkConfig {
                server,
                username: args.username.clone(),
                password: args.password.clone(),
                database: args.database.clone(),
                write_timeout: args.write_timeout,
            },
            sink_kind: args.sink,
            clean: args.clean,
            msg_count: args.count,
            batch_size: args.batch,
            clients: args.clients,
            partial_batch: if args.flush_partial_batch {
                PartialBatchPolicy::Flush
            } else {
                PartialBatchPolicy::Discard
            },
            seed: args.seed,
            format: args.format,
        })
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            msg_count: self.msg_count,
            batch_size: self.batch_size,
            partial_batch: self.partial_batch,
            seed: self.seed,
        }
    }
}

/// Everything a finished benchmark produced
#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    /// Client results in client-id order
    pub runs: Vec<RunResult>,
    pub totals: TotalResult,
}

/// Benchmark runner that coordinates setup, clients and result collection
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    /// Run the benchmark against sinks built from the configuration
    ///
    /// When `clean` is set the database is re-created first. Any setup error
    /// is returned before a client starts. On error the results stream, if
    /// any, is closed so it still holds a valid JSON array.
    pub async fn run(
        &self,
        mut results_manager: Option<&mut ResultsManager>,
    ) -> Result<BenchmarkOutcome> {
        info!("{}", BenchmarkConfigDisplay { config: &self.config });

        let outcome = match self.prepare().await {
            Ok(sinks) => {
                self.run_with_sinks(sinks, results_manager.as_deref_mut())
                    .await
            }
            Err(e) => Err(e),
        };

        if let (Err(_), Some(manager)) = (&outcome, results_manager) {
            if let Err(e) = manager.close_stream() {
                warn!("Failed to close results stream: {:#}", e);
            }
        }
        outcome
    }

    /// Clean the database if configured and build one sink per client
    async fn prepare(&self) -> Result<Vec<Box<dyn WriteSink>>> {
        if self.config.clean {
            self.clean_database().await?;
        }

        SinkFactory::create_multiple(self.config.sink_kind, &self.config.sink, self.config.clients)
            .with_context(|| format!("Error connecting to server {}", self.config.sink.server))
    }

    /// Drop and re-create the benchmark database
    pub async fn clean_database(&self) -> Result<()> {
        info!(
            "Cleaning benchmarking data on server {}",
            self.config.sink.server
        );
        let admin = SinkFactory::create(self.config.sink_kind, &self.config.sink)
            .with_context(|| format!("Error connecting to server {}", self.config.sink.server))?;
        admin
            .recreate_database()
            .await
            .with_context(|| format!("Failed to re-create database {}", self.config.sink.database))
    }

    /// Run one client per provided sink and aggregate their results
    ///
    /// The sink at index `i` is used by client `i`. Streams each result to
    /// `results_manager` as it arrives when streaming is enabled.
    pub async fn run_with_sinks(
        &self,
        sinks: Vec<Box<dyn WriteSink>>,
        mut results_manager: Option<&mut ResultsManager>,
    ) -> Result<BenchmarkOutcome> {
        let clients = sinks.len();
        if clients == 0 {
            anyhow::bail!("At least one client sink is required");
        }
        if clients != self.config.clients {
            warn!(
                "Configured for {} clients but running {} (one per sink)",
                self.config.clients, clients
            );
        }

        let (results_tx, mut results_rx) = mpsc::channel::<Result<RunResult>>(clients);
        let started = Instant::now();

        for (id, sink) in sinks.into_iter().enumerate() {
            info!("Starting client {}", id);
            let runner = ClientRunner::new(id, self.config.client_config(), sink);
            let results_tx = results_tx.clone();
            tokio::spawn(async move {
                let result = runner.run().await;
                // The collector only goes away if the run is already failing.
                let _ = results_tx.send(result).await;
            });
        }
        drop(results_tx);

        let mut runs = Vec::with_capacity(clients);
        while runs.len() < clients {
            let result = results_rx.recv().await.ok_or_else(|| {
                anyhow::anyhow!(
                    "Client task ended without reporting ({} of {} results collected)",
                    runs.len(),
                    clients
                )
            })??;
            debug!("Collected result of client {}", result.id);

            if let Some(manager) = results_manager.as_deref_mut() {
                manager.stream_result(&result)?;
            }
            runs.push(result);
        }
        let total_time = started.elapsed();

        runs.sort_by_key(|r| r.id);
        let totals = aggregate(&runs, total_time)?;
        info!(
            "Benchmark completed: {} clients in {:.3}s",
            clients,
            total_time.as_secs_f64()
        );

        Ok(BenchmarkOutcome { runs, totals })
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            sink_kind: SinkKind::Null,
            clean: false,
            msg_count: crate::defaults::MSG_COUNT,
            batch_size: crate::defaults::BATCH_SIZE,
            clients: crate::defaults::CLIENTS,
            partial_batch: PartialBatchPolicy::Discard,
            seed: None,
            format: OutputFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Batch, NullSink, SinkError};
    use async_trait::async_trait;

    struct FailingSink;

    #[async_trait]
    impl WriteSink for FailingSink {
        async fn write(&mut self, _batch: &Batch) -> Result<(), SinkError> {
            Err(SinkError::Transport("unreachable".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn null_sinks(count: usize) -> Vec<Box<dyn WriteSink>> {
        (0..count)
            .map(|_| Box::new(NullSink::new()) as Box<dyn WriteSink>)
            .collect()
    }

    #[test]
    fn test_config_from_args() {
        let args = Args {
            count: 10,
            batch: 3,
            clients: 4,
            flush_partial_batch: true,
            seed: Some(9),
            ..Default::default()
        };
        let config = BenchmarkConfig::from_args(&args).unwrap();

        assert_eq!(config.msg_count, 10);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.clients, 4);
        assert_eq!(config.partial_batch, PartialBatchPolicy::Flush);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.sink.database, "benchmarking");
        assert_eq!(config.sink_kind, SinkKind::Influx);
    }

    #[test]
    fn test_config_validation() {
        let invalid = [
            Args { clients: 0, ..Default::default() },
            Args { batch: 0, ..Default::default() },
            Args { count: 5, batch: 6, ..Default::default() },
            Args { database: String::new(), ..Default::default() },
            Args { server: "::not a url".to_string(), ..Default::default() },
        ];
        for args in &invalid {
            assert!(BenchmarkConfig::from_args(args).is_err(), "{:?}", args);
        }
    }

    #[test]
    fn test_config_display() {
        let config = BenchmarkConfig {
            clients: 3,
            seed: Some(5),
            ..Default::default()
        };
        let banner = BenchmarkConfigDisplay { config: &config }.to_string();

        assert!(banner.contains("Clients:            3"));
        assert!(banner.contains("Seed:               5"));
        assert!(banner.contains("Discarded (default)"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_result_per_client() {
        let config = BenchmarkConfig {
            clients: 8,
            msg_count: 20,
            batch_size: 4,
            ..Default::default()
        };
        let runner = BenchmarkRunner::new(config);
        let outcome = runner.run_with_sinks(null_sinks(8), None).await.unwrap();

        assert_eq!(outcome.runs.len(), 8);
        let ids: Vec<usize> = outcome.runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
        assert!(outcome.runs.iter().all(|r| r.successes == 5 && r.failures == 0));
        assert_eq!(outcome.totals.successes, 40);
        assert_eq!(outcome.totals.ratio, 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_clients_still_report() {
        let config = BenchmarkConfig {
            clients: 2,
            msg_count: 6,
            batch_size: 2,
            ..Default::default()
        };
        let sinks: Vec<Box<dyn WriteSink>> = vec![Box::new(NullSink::new()), Box::new(FailingSink)];
        let outcome = BenchmarkRunner::new(config)
            .run_with_sinks(sinks, None)
            .await
            .unwrap();

        assert_eq!(outcome.runs[0].successes, 3);
        assert_eq!(outcome.runs[1].failures, 3);
        assert_eq!(outcome.totals.successes, 3);
        assert_eq!(outcome.totals.failures, 3);
        assert_eq!(outcome.totals.ratio, 0.5);
        assert_eq!(outcome.totals.latency_min, 0.0);
    }

    #[tokio::test]
    async fn test_null_sink_run_without_clean() {
        let config = BenchmarkConfig {
            clients: 2,
            msg_count: 4,
            batch_size: 1,
            ..Default::default()
        };
        let outcome = BenchmarkRunner::new(config).run(None).await.unwrap();
        assert_eq!(outcome.totals.successes, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clean_then_run_from_spawned_task() {
        let config = BenchmarkConfig {
            clean: true,
            clients: 2,
            msg_count: 4,
            batch_size: 2,
            ..Default::default()
        };
        let outcome = tokio::spawn(async move { BenchmarkRunner::new(config).run(None).await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.totals.successes, 4);
        assert_eq!(outcome.totals.failures, 0);
    }

    #[tokio::test]
    async fn test_run_requires_sinks() {
        let runner = BenchmarkRunner::new(BenchmarkConfig::default());
        assert!(runner.run_with_sinks(Vec::new(), None).await.is_err());
    }
}
