use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream};
use serde::Deserialize;
use tracing::info;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: i64,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_stream_name() -> String {
    "ROBOT_SIM".to_string()
}

fn default_max_age_days() -> i64 {
    1
}

fn default_max_bytes() -> i64 {
    1024 * 1024 * 1024 // 1GB
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            stream_name: default_stream_name(),
            max_age_days: default_max_age_days(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Per-robot subject names
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subjects {
    pub cmd: String,
    pub result: String,
    pub log: String,
    pub heartbeat: String,
}

impl Subjects {
    pub fn for_robot(robot_id: &str) -> Self {
        Self {
            cmd: format!("{}.cmd", robot_id),
            result: format!("{}.result", robot_id),
            log: format!("{}.log", robot_id),
            heartbeat: format!("{}.hb", robot_id),
        }
    }

    /// Subjects persisted by the JetStream stream (heartbeats are not)
    pub fn stream_subjects(&self) -> Vec<String> {
        vec![self.cmd.clone(), self.result.clone(), self.log.clone()]
    }
}

/// NATS client with JetStream
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
    subjects: Subjects,
}

impl NatsClient {
    /// Connect to NATS and make sure the robot's stream exists
    pub async fn connect(config: NatsConfig, robot_id: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        let nats_client = Self {
            client,
            jetstream,
            config,
            subjects: Subjects::for_robot(robot_id),
        };

        nats_client.ensure_stream().await?;

        Ok(nats_client)
    }

    /// Ensure JetStream stream exists with proper configuration
    async fn ensure_stream(&self) -> Result<()> {
        info!("Ensuring JetStream stream '{}' exists", self.config.stream_name);

        if self.jetstream.get_stream(&self.config.stream_name).await.is_ok() {
            info!("Stream '{}' already exists", self.config.stream_name);
            return Ok(());
        }

        info!("Stream '{}' does not exist, creating...", self.config.stream_name);

        let stream_config = stream::Config {
            name: self.config.stream_name.clone(),
            subjects: self.subjects.stream_subjects(),
            max_age: std::time::Duration::from_secs((self.config.max_age_days.max(0) * 86400) as u64),
            max_bytes: self.config.max_bytes,
            storage: stream::StorageType::File,
            retention: stream::RetentionPolicy::Limits,
            ..Default::default()
        };

        self.jetstream
            .create_stream(stream_config)
            .await
            .context("Failed to create JetStream stream")?;

        info!("Created JetStream stream '{}'", self.config.stream_name);
        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }
}
