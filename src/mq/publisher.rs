use crate::mq::client::Subjects;
use crate::protocol::{HeartbeatMessage, LogMessage, RobotResult};
use anyhow::{Context, Result};
use async_nats::jetstream;
use async_trait::async_trait;
use tracing::debug;

/// Outbound channel for results, progress logs and heartbeats
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_result(&self, result: &RobotResult) -> Result<()>;

    async fn publish_log(&self, log: &LogMessage) -> Result<()>;

    async fn publish_heartbeat(&self, heartbeat: &HeartbeatMessage) -> Result<()>;
}

/// Publisher backed by NATS: results and logs go through JetStream,
/// heartbeats use a core publish
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    subjects: Subjects,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, jetstream: jetstream::Context, subjects: Subjects) -> Self {
        Self {
            client,
            jetstream,
            subjects,
        }
    }

    async fn publish_persisted(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.jetstream
            .publish(subject.to_string(), payload.into())
            .await
            .context(format!("Failed to publish to subject '{}'", subject))?
            .await
            .context("Failed to await publish ack")?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish_result(&self, result: &RobotResult) -> Result<()> {
        let payload = serde_json::to_vec(result).context("Failed to serialize result to JSON")?;

        debug!(
            task_id = %result.task_id,
            code = result.code,
            subject = %self.subjects.result,
            "Publishing result"
        );

        self.publish_persisted(&self.subjects.result, payload).await
    }

    async fn publish_log(&self, log: &LogMessage) -> Result<()> {
        let payload = serde_json::to_vec(log).context("Failed to serialize log to JSON")?;

        debug!(task_id = %log.task_id, msg = %log.msg, "Publishing log");

        self.publish_persisted(&self.subjects.log, payload).await
    }

    async fn publish_heartbeat(&self, heartbeat: &HeartbeatMessage) -> Result<()> {
        let payload =
            serde_json::to_vec(heartbeat).context("Failed to serialize heartbeat to JSON")?;

        self.client
            .publish(self.subjects.heartbeat.clone(), payload.into())
            .await
            .context(format!(
                "Failed to publish heartbeat to '{}'",
                self.subjects.heartbeat
            ))?;

        Ok(())
    }
}
