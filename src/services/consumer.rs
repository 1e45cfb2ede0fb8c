use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::services::ingest::EventIngestor;

/// Kafka consumer feeding movie events into the ingestor
///
/// All event semantics live in [`EventIngestor`]; this type only owns the
/// connection and the receive loop.
pub struct KafkaEventConsumer {
    consumer: Arc<StreamConsumer>,
    ingestor: Arc<EventIngestor>,
}

/// Handle for stopping the consumer loop
pub struct ConsumerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ConsumerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Kafka consumer join failed");
        }
    }
}

impl KafkaEventConsumer {
    pub fn new(
        bootstrap_servers: &str,
        group_id: &str,
        topic: &str,
        ingestor: Arc<EventIngestor>,
    ) -> AppResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", bootstrap_servers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|e| AppError::Internal(format!("Kafka consumer creation failed: {}", e)))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| AppError::Internal(format!("Kafka subscribe failed: {}", e)))?;

        tracing::info!(topic = %topic, group_id = %group_id, "Kafka consumer subscribed");

        Ok(Self {
            consumer: Arc::new(consumer),
            ingestor,
        })
    }

    /// Starts the receive loop on its own task
    pub fn spawn(self) -> ConsumerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        ConsumerHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!("Kafka consumer started");

        loop {
            tokio::select! {
                result = self.consumer.recv() => match result {
                    Ok(msg) => {
                        if let Some(payload) = msg.payload() {
                            // Malformed payloads are dropped inside the
                            // ingestor; the loop never stops over one
                            self.ingestor.handle_payload(payload).await;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Kafka consumer error");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                },
                _ = shutdown_rx.changed() => {
                    tracing::info!("Kafka consumer shutting down");
                    break;
                }
            }
        }

        tracing::info!("Kafka consumer stopped");
    }
}
