//! Delivery of generated batches to the write sink.

use crate::client::Message;
use crate::sink::WriteSink;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Progress is logged every this many published messages
const PROGRESS_INTERVAL: u64 = 100;

/// Writes each batch it receives and reports the outcome
pub struct Publisher {
    client_id: usize,
    sink: Box<dyn WriteSink>,
}

impl Publisher {
    pub fn new(client_id: usize, sink: Box<dyn WriteSink>) -> Self {
        Self { client_id, sink }
    }

    /// Publish until the generator closes the handoff
    ///
    /// Every received message is written and sent back on `outcomes`, success
    /// or not. `finished` fires only after the handoff is closed and drained,
    /// carrying the number of published messages; the outcome sender is
    /// dropped at the same time.
    pub async fn run(
        mut self,
        mut handoff: mpsc::Receiver<Message>,
        outcomes: mpsc::Sender<Message>,
        finished: oneshot::Sender<u64>,
    ) {
        let mut published = 0u64;

        while let Some(mut message) = handoff.recv().await {
            message.sent = Some(Instant::now());
            match self.sink.write(&message.batch).await {
                Ok(()) => {
                    message.delivered = Some(Instant::now());
                    message.succeeded = true;
                }
                Err(e) => {
                    warn!("CLIENT {} Error submitting data: {}", self.client_id, e);
                    message.succeeded = false;
                }
            }

            if outcomes.send(message).await.is_err() {
                warn!("CLIENT {} outcome receiver dropped", self.client_id);
                break;
            }

            published += 1;
            if published % PROGRESS_INTERVAL == 0 {
                debug!(
                    "CLIENT {} submitted {} messages and keeps going...",
                    self.client_id, published
                );
            }
        }

        info!(
            "CLIENT {} is done submitting data to {} sink",
            self.client_id,
            self.sink.name()
        );
        // The runner may already be gone if it failed; nothing to report then.
        let _ = finished.send(published);
    }
}
