//! Work Intake Adapter.
//!
//! Consumes `Attempt` descriptors from a durable AMQP queue, runs the
//! executor pipeline on the blocking thread pool, publishes the resulting
//! `Verdict` to the results fanout exchange, and acks the delivery only
//! once publication has been confirmed; a publish failure nacks the
//! delivery instead so the broker can redeliver it.

use futures_lite::stream::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use lapin::types::FieldTable;

use crate::config::{amqp_url, RESULT_EXCHANGE, TASK_EXCHANGE, TASK_ROUTING_KEY};
use crate::error::{ExecutorError, Result};
use crate::model::{Attempt, Verdict};

/// Attempt ids are assigned by the upstream queueing system and are never
/// negative, so this is safe to use for a verdict that can't be tied to a
/// real attempt because its envelope didn't even parse.
const UNPARSEABLE_ATTEMPT_ID: i64 = -1;

/// Owns the AMQP connection and channel for one worker process.
pub struct Worker {
    channel: Channel,
}

impl Worker {
    /// Connects, declares the exchanges/queue, and sets QoS prefetch to 1
    /// so only one attempt is in flight per worker at a time.
    pub async fn connect() -> Result<Self> {
        let url = amqp_url();
        let conn = Connection::connect(&url, ConnectionProperties::default())
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        channel
            .exchange_declare(
                TASK_EXCHANGE,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        channel
            .exchange_declare(
                RESULT_EXCHANGE,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        channel
            .queue_declare(
                TASK_ROUTING_KEY,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        channel
            .queue_bind(
                TASK_ROUTING_KEY,
                TASK_EXCHANGE,
                TASK_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        tracing::info!(url, "connected to broker");
        Ok(Worker { channel })
    }

    /// Consumes forever, one attempt at a time.
    pub async fn run(self) -> Result<()> {
        let mut consumer = self
            .channel
            .basic_consume(
                TASK_ROUTING_KEY,
                "judge-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "delivery error, skipping");
                    continue;
                }
            };

            let verdict = self.handle_delivery(&delivery.data).await;
            match self.publish_verdict(&verdict).await {
                Ok(()) => {
                    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                        tracing::error!(error = %e, "failed to ack delivery");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt_id = verdict.id, "failed to publish verdict");
                    if let Err(e) = delivery.nack(BasicNackOptions::default()).await {
                        tracing::error!(error = %e, "failed to nack delivery");
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_delivery(&self, body: &[u8]) -> Verdict {
        let attempt: Attempt = match serde_json::from_slice(body) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "malformed work message");
                return Verdict::synthesized_runtime_error(UNPARSEABLE_ATTEMPT_ID);
            }
        };
        let attempt_id = attempt.id;

        match tokio::task::spawn_blocking(move || crate::executor::execute(&attempt)).await {
            Ok(verdict) => verdict,
            Err(join_err) => {
                tracing::error!(
                    attempt_id,
                    error = %join_err,
                    "executor task panicked or was cancelled"
                );
                Verdict::synthesized_runtime_error(attempt_id)
            }
        }
    }

    async fn publish_verdict(&self, verdict: &Verdict) -> Result<()> {
        let payload = serde_json::to_vec(verdict)
            .map_err(|e| ExecutorError::MalformedMessage(e.to_string()))?;
        self.channel
            .basic_publish(
                RESULT_EXCHANGE,
                "",
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?
            .await
            .map_err(|e| ExecutorError::Broker(e.to_string()))?;
        Ok(())
    }
}
