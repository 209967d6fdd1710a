//! # InfluxDB Write Benchmark - Main Entry Point
//!
//! 1. **Parse arguments** and initialize logging
//! 2. **Validate** the configuration; invalid settings abort immediately
//! 3. **Run** the benchmark: optional database clean-up, then all clients
//! 4. **Report** per-client and total results as text or JSON
//!
//! Setup failures (bad configuration, unreachable server during clean-up)
//! terminate the process with an error. Failed writes do not; they show up
//! in the report's success ratio.

use anyhow::Result;
use clap::Parser;
use influx_write_bench::{
    benchmark::{BenchmarkConfig, BenchmarkRunner},
    cli::Args,
    logging,
    results::ResultsManager,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the file appender flushes.
    let _log_guard = logging::init(args.verbose, args.quiet, args.log_file.as_deref())?;

    info!("Starting InfluxDB Write Benchmark v{}", influx_write_bench::VERSION);

    let config = BenchmarkConfig::from_args(&args)?;

    let mut results_manager = ResultsManager::new(args.output_file.as_deref(), config.format);
    if let Some(ref streaming_file) = args.streaming_output {
        info!("Streaming client results to: {:?}", streaming_file);
        results_manager.enable_streaming(streaming_file)?;
    }

    let runner = BenchmarkRunner::new(config);
    let outcome = runner.run(Some(&mut results_manager)).await?;

    results_manager.finalize(&outcome.runs, &outcome.totals)?;

    info!("InfluxDB Write Benchmark completed");
    Ok(())
}
