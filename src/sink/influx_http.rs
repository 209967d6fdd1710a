//! InfluxDB 1.x HTTP sink
//!
//! Batches are written through `POST /write?db=<db>&precision=ns` as line
//! protocol. Database administration goes through `POST /query`.

use super::{Batch, SinkConfig, SinkError, WriteSink};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

pub struct InfluxHttpSink {
    client: Client,
    write_url: Url,
    query_url: Url,
    database: String,
    username: String,
    password: String,
}

impl InfluxHttpSink {
    /// Build a sink for the configured server
    ///
    /// No request is made here; the HTTP client is created and the endpoint
    /// URLs are resolved so that every write reuses them.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.write_timeout)
            .build()
            .map_err(|e| SinkError::Config(format!("failed to construct HTTP client: {}", e)))?;

        let mut write_url = endpoint(&config.server, "write")?;
        write_url
            .query_pairs_mut()
            .append_pair("db", &config.database)
            .append_pair("precision", "ns");

        Ok(Self {
            client,
            write_url,
            query_url: endpoint(&config.server, "query")?,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn query(&self, statement: &str) -> Result<(), SinkError> {
        let mut url = self.query_url.clone();
        url.query_pairs_mut().append_pair("q", statement);

        debug!("Issuing query: {}", statement);
        let response = self
            .with_auth(self.client.post(url))
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        check_status(response).await
    }
}

fn endpoint(server: &Url, path: &str) -> Result<Url, SinkError> {
    // Keep any path prefix on the server URL (e.g. behind a reverse proxy).
    let mut base = server.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| SinkError::Config(format!("invalid server URL {}: {}", server, e)))
}

async fn check_status(response: reqwest::Response) -> Result<(), SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(SinkError::Rejected {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

#[async_trait]
impl WriteSink for InfluxHttpSink {
    async fn write(&mut self, batch: &Batch) -> Result<(), SinkError> {
        let response = self
            .with_auth(self.client.post(self.write_url.clone()))
            .body(batch.to_line_protocol())
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        check_status(response).await
    }

    async fn recreate_database(&self) -> Result<(), SinkError> {
        let name = self.database.replace('"', "\\\"");

        // A missing database is not an error worth stopping for.
        if let Err(e) = self.query(&format!("DROP DATABASE \"{}\"", name)).await {
            warn!("Failed to drop database {}: {}", self.database, e);
        }
        self.query(&format!("CREATE DATABASE \"{}\"", name)).await
    }

    fn name(&self) -> &'static str {
        "influx-http"
    }
}
