use super::{Batch, SinkError, WriteSink};
use async_trait::async_trait;

/// A sink that accepts every batch immediately
///
/// Useful for measuring the overhead of the harness itself.
#[derive(Debug, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WriteSink for NullSink {
    async fn write(&mut self, _batch: &Batch) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FieldValue, Point};

    #[tokio::test]
    async fn test_null_sink_accepts_everything() {
        let mut sink = NullSink::new();
        let mut batch = Batch::default();
        batch.push(Point::new("m", 1).field("v", FieldValue::Float(0.0)));
        batch.push(Point::new("m", 2).field("v", FieldValue::Float(1.0)));

        assert!(sink.write(&batch).await.is_ok());
        assert!(sink.write(&Batch::default()).await.is_ok());
        assert!(sink.recreate_database().await.is_ok());
        assert_eq!(sink.name(), "null");
    }
}
