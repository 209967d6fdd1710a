//! Synthetic batch generation for one client.

use crate::client::Message;
use crate::sink::{Batch, FieldValue, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What to do with points left over when the message count is not a
/// multiple of the batch size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialBatchPolicy {
    /// Drop the remainder; matches the numbers of earlier releases
    #[default]
    Discard,
    /// Send the remainder as a short final batch
    Flush,
}

/// Counts reported once generation has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSummary {
    pub batches: u64,
    pub discarded_points: usize,
}

/// Produces the bounded stream of batches written by one client
pub struct BatchGenerator {
    client_id: usize,
    msg_count: usize,
    batch_size: usize,
    policy: PartialBatchPolicy,
    rng: StdRng,
}

impl BatchGenerator {
    pub fn new(
        client_id: usize,
        msg_count: usize,
        batch_size: usize,
        policy: PartialBatchPolicy,
        rng: StdRng,
    ) -> Self {
        Self {
            client_id,
            msg_count,
            batch_size: batch_size.max(1),
            policy,
            rng,
        }
    }

    /// Seeded generators derive a per-client stream from the run seed
    ///
    /// The seed is scrambled before the client id is mixed in, so nearby
    /// seeds do not hand the same stream to different clients.
    pub fn rng_for(client_id: usize, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => {
                StdRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ client_id as u64)
            }
            None => StdRng::from_entropy(),
        }
    }

    /// Number of batches this generator will emit
    pub fn expected_batches(&self) -> u64 {
        let full = (self.msg_count / self.batch_size) as u64;
        match self.policy {
            PartialBatchPolicy::Flush if self.msg_count % self.batch_size != 0 => full + 1,
            _ => full,
        }
    }

    pub fn measurement(&self) -> String {
        format!("influxdb-benchmark-{}", self.client_id)
    }

    fn next_point(&mut self, measurement: &str, seq: usize) -> Point {
        let timestamp_ns = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let client_tag = self.rng.gen_range(0..=self.client_id);

        Point::new(measurement, timestamp_ns)
            .tag("client_tag", client_tag.to_string())
            .field("value", FieldValue::Float(self.rng.gen::<f64>()))
            .field("seq", FieldValue::Integer(seq as i64))
    }

    /// Generate every batch and hand each one to the publisher
    ///
    /// `send` on the capacity-one channel parks the generator until the
    /// publisher has room, which keeps it at most one batch ahead. Returning
    /// drops the sender, which is the publisher's end-of-stream signal.
    pub async fn run(mut self, handoff: mpsc::Sender<Message>) -> GenerationSummary {
        let measurement = self.measurement();
        let mut batch = Batch::with_capacity(self.batch_size);
        let mut batches = 0u64;

        for seq in 0..self.msg_count {
            let point = self.next_point(&measurement, seq);
            batch.push(point);

            if batch.len() == self.batch_size {
                let full = std::mem::replace(&mut batch, Batch::with_capacity(self.batch_size));
                if handoff.send(Message::new(full)).await.is_err() {
                    warn!("CLIENT {} publisher stopped early, ending generation", self.client_id);
                    return GenerationSummary {
                        batches,
                        discarded_points: 0,
                    };
                }
                batches += 1;
            }
        }

        let mut discarded_points = 0;
        if !batch.is_empty() {
            match self.policy {
                PartialBatchPolicy::Discard => discarded_points = batch.len(),
                PartialBatchPolicy::Flush => {
                    if handoff.send(Message::new(batch)).await.is_ok() {
                        batches += 1;
                    }
                }
            }
        }

        debug!(
            "CLIENT {} is done generating messages ({} batches, {} points discarded)",
            self.client_id, batches, discarded_points
        );
        GenerationSummary {
            batches,
            discarded_points,
        }
    }
}
