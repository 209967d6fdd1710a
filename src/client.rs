//! # Client Runner
//!
//! One simulated writer. Each client owns a [`BatchGenerator`] and a
//! [`Publisher`], runs them as separate tasks connected by a capacity-one
//! channel, and folds the per-message outcomes into a [`RunResult`].
//!
//! ```text
//!  BatchGenerator --(handoff, cap 1)--> Publisher --> WriteSink
//!                                          |
//!            ClientRunner <--(outcomes)----+
//!            ClientRunner <--(finished)----+
//! ```
//!
//! The generator closes the handoff when it is done; the publisher drains
//! whatever is left, then signals `finished`. The runner keeps reading
//! outcomes until that signal and then drains anything still buffered, so
//! every generated batch is counted exactly once.

use crate::generator::{BatchGenerator, PartialBatchPolicy};
use crate::publisher::Publisher;
use crate::results::RunResult;
use crate::sink::{Batch, WriteSink};
use anyhow::{Context, Result};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// A batch in flight, with its delivery timing and outcome
#[derive(Debug)]
pub struct Message {
    pub batch: Batch,
    pub sent: Option<Instant>,
    pub delivered: Option<Instant>,
    pub succeeded: bool,
}

impl Message {
    pub fn new(batch: Batch) -> Self {
        Self {
            batch,
            sent: None,
            delivered: None,
            succeeded: false,
        }
    }

    /// Round-trip time of a successful write in milliseconds
    pub fn latency_ms(&self) -> Option<f64> {
        if !self.succeeded {
            return None;
        }
        let elapsed = self.delivered?.checked_duration_since(self.sent?)?;
        Some(elapsed.as_secs_f64() * 1000.0)
    }
}

/// Workload of a single client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub msg_count: usize,
    pub batch_size: usize,
    pub partial_batch: PartialBatchPolicy,
    pub seed: Option<u64>,
}

/// Running counters of one client's outcomes
#[derive(Debug, Default)]
struct Tally {
    successes: u64,
    failures: u64,
    latencies_ms: Vec<f64>,
}

impl Tally {
    fn record(&mut self, message: &Message) {
        match message.latency_ms() {
            Some(latency) => {
                self.successes += 1;
                self.latencies_ms.push(latency);
            }
            None => self.failures += 1,
        }
    }

    fn total(&self) -> u64 {
        self.successes + self.failures
    }
}

pub struct ClientRunner {
    id: usize,
    config: ClientConfig,
    sink: Box<dyn WriteSink>,
}

impl ClientRunner {
    pub fn new(id: usize, config: ClientConfig, sink: Box<dyn WriteSink>) -> Self {
        Self { id, config, sink }
    }

    /// Drive the generator and publisher to completion
    ///
    /// Returns an error only if one of the pipeline tasks died or the
    /// outcome count does not match the number of generated batches; write
    /// failures are counted, not returned.
    pub async fn run(self) -> Result<RunResult> {
        let id = self.id;
        let started = Instant::now();

        let (handoff_tx, handoff_rx) = mpsc::channel(1);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
        let (finished_tx, mut finished_rx) = oneshot::channel();

        let generator = BatchGenerator::new(
            id,
            self.config.msg_count,
            self.config.batch_size,
            self.config.partial_batch,
            BatchGenerator::rng_for(id, self.config.seed),
        );
        debug!(
            "CLIENT {} generating {} batches of {} points",
            id,
            generator.expected_batches(),
            self.config.batch_size
        );

        let generator_handle = tokio::spawn(generator.run(handoff_tx));
        let publisher_handle = tokio::spawn(
            Publisher::new(id, self.sink).run(handoff_rx, outcome_tx, finished_tx),
        );

        let mut tally = Tally::default();
        let published = loop {
            tokio::select! {
                biased;
                Some(message) = outcome_rx.recv() => tally.record(&message),
                finished = &mut finished_rx => {
                    let published = finished
                        .with_context(|| format!("CLIENT {} publisher exited without finishing", id))?;
                    // Outcomes sent just before the signal may still be buffered.
                    while let Ok(message) = outcome_rx.try_recv() {
                        tally.record(&message);
                    }
                    break published;
                }
            }
        };
        let run_time = started.elapsed();

        let generation = generator_handle
            .await
            .with_context(|| format!("CLIENT {} generator task failed", id))?;
        publisher_handle
            .await
            .with_context(|| format!("CLIENT {} publisher task failed", id))?;

        if tally.total() != generation.batches || published != generation.batches {
            anyhow::bail!(
                "CLIENT {} generated {} batches but recorded {} outcomes ({} published)",
                id,
                generation.batches,
                tally.total(),
                published
            );
        }

        info!(
            "CLIENT {} finished: {} successes, {} failures in {:.3}s",
            id,
            tally.successes,
            tally.failures,
            run_time.as_secs_f64()
        );

        Ok(RunResult::from_samples(
            id,
            tally.successes,
            tally.failures,
            run_time,
            &tally.latencies_ms,
        ))
    }
}
