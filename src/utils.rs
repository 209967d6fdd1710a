//! # Validation helpers
//!
//! Checks applied to the benchmark configuration before any client starts.
//! Each returns an `anyhow::Error` with a message suitable for the user.
//!
//! ```rust
//! # use influx_write_bench::utils::*;
//! # fn main() -> anyhow::Result<()> {
//! validate_client_count(10)?;
//! validate_batch_size(5, 100)?;
//! validate_database_name("benchmarking")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use reqwest::Url;

/// Validate the number of concurrent clients
///
/// At least one client is required; there is no upper bound beyond what the
/// machine can schedule.
pub fn validate_client_count(clients: usize) -> Result<()> {
    if clients < 1 {
        anyhow::bail!("Number of clients should be >= 1");
    }
    Ok(())
}

/// Validate the batch size against the per-client message count
///
/// ## Validation Rules
///
/// - **Minimum**: 1 point per batch (1 means no batching)
/// - **Maximum**: the message count, so every client produces at least one batch
pub fn validate_batch_size(batch_size: usize, msg_count: usize) -> Result<()> {
    if batch_size < 1 || batch_size > msg_count {
        anyhow::bail!(
            "Batch size should be >= 1 and <= count (batch {}, count {})",
            batch_size,
            msg_count
        );
    }
    Ok(())
}

pub fn validate_database_name(database: &str) -> Result<()> {
    if database.trim().is_empty() {
        anyhow::bail!("Database should be provided");
    }
    Ok(())
}

/// Parse and check the server endpoint
///
/// Only `http` and `https` endpoints are accepted since the sink speaks the
/// InfluxDB HTTP API.
pub fn validate_server_url(server: &str) -> Result<Url> {
    let url = Url::parse(server).with_context(|| format!("Invalid server URL: {}", server))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("Unsupported server URL scheme '{}' in {}", other, server),
    }
}
