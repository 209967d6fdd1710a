use crate::sink::SinkKind;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// InfluxDB Write Benchmark - concurrent write-load generator for InfluxDB
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// InfluxDB server endpoint as scheme://host:port
    #[clap(long, default_value = crate::defaults::SERVER, help_heading = "Server Options")]
    pub server: String,

    /// InfluxDB username (empty if auth disabled)
    #[clap(long, default_value = "", help_heading = "Server Options")]
    pub username: String,

    /// InfluxDB password (empty if auth disabled)
    #[clap(long, default_value = "", help_heading = "Server Options")]
    pub password: String,

    /// InfluxDB database (will be created/cleaned if --clean)
    #[clap(long, default_value = crate::defaults::DATABASE, help_heading = "Server Options")]
    pub database: String,

    /// Whether to clean (drop and re-create) the database before starting
    #[clap(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        help_heading = "Server Options"
    )]
    pub clean: bool,

    /// Timeout for a single write request
    #[clap(long, value_parser = parse_duration, default_value = "30s", help_heading = "Server Options")]
    pub write_timeout: Duration,

    /// Write sink to benchmark
    #[clap(long, value_enum, default_value_t = SinkKind::Influx, help_heading = "Server Options")]
    pub sink: SinkKind,

    /// Number of data points to generate per client
    #[clap(long, default_value_t = crate::defaults::MSG_COUNT, help_heading = "Workload Options")]
    pub count: usize,

    /// Number of data points to submit at once (1 means no batching)
    #[clap(long, default_value_t = crate::defaults::BATCH_SIZE, help_heading = "Workload Options")]
    pub batch: usize,

    /// Number of clients to start
    #[clap(long, default_value_t = crate::defaults::CLIENTS, help_heading = "Workload Options")]
    pub clients: usize,

    /// Send leftover points as a short final batch instead of discarding them
    #[clap(long, default_value_t = false, help_heading = "Workload Options")]
    pub flush_partial_batch: bool,

    /// Seed for the synthetic data generators (random if omitted)
    #[clap(long, help_heading = "Workload Options")]
    pub seed: Option<u64>,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Text, help_heading = "Output Options")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[clap(short = 'o', long, help_heading = "Output Options")]
    pub output_file: Option<PathBuf>,

    /// JSON file receiving each client result as soon as it finishes
    #[clap(long, help_heading = "Output Options")]
    pub streaming_output: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[clap(short = 'v', long, action = ArgAction::Count, help_heading = "Logging Options")]
    pub verbose: u8,

    /// Only log errors
    #[clap(short = 'q', long, default_value_t = false, help_heading = "Logging Options")]
    pub quiet: bool,

    /// Also write logs to this file
    #[clap(long, help_heading = "Logging Options")]
    pub log_file: Option<PathBuf>,
}

impl Default for Args {
    // Mirrors the clap defaults so tests can use struct update syntax.
    fn default() -> Self {
        Self {
            server: crate::defaults::SERVER.to_string(),
            username: String::new(),
            password: String::new(),
            database: crate::defaults::DATABASE.to_string(),
            clean: true,
            write_timeout: crate::defaults::WRITE_TIMEOUT,
            sink: SinkKind::Influx,
            count: crate::defaults::MSG_COUNT,
            batch: crate::defaults::BATCH_SIZE,
            clients: crate::defaults::CLIENTS,
            flush_partial_batch: false,
            seed: None,
            format: OutputFormat::Text,
            output_file: None,
            streaming_output: None,
            verbose: 0,
            quiet: false,
            log_file: None,
        }
    }
}

/// Report output formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Formatted text report
    #[clap(name = "text")]
    Text,

    /// JSON document with `runs` and `totals`
    #[clap(name = "json")]
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse duration from string (e.g., "10s", "5m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    if num < 0.0 {
        return Err(format!("Duration cannot be negative: {}", s));
    }

    let duration = match unit {
        "ms" => Duration::from_secs_f64(num / 1000.0),
        "s" => Duration::from_secs_f64(num),
        "m" => Duration::from_secs_f64(num * 60.0),
        "h" => Duration::from_secs_f64(num * 3600.0),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}
