use crate::dispatcher::Dispatcher;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Durable name of the command consumer
pub const CONSUMER_NAME: &str = "robot-sim-dispatcher";

/// Consume robot commands and hand each one to the dispatcher.
///
/// Only commands published after startup are delivered. Every message is
/// acknowledged once `handle` returns, malformed ones included, so nothing
/// is redelivered.
pub async fn run_consumer(
    jetstream: jetstream::Context,
    stream_name: &str,
    cmd_subject: &str,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    info!(subject = %cmd_subject, "Starting command consumer");

    let stream = jetstream
        .get_stream(stream_name)
        .await
        .with_context(|| format!("Failed to get {} stream", stream_name))?;

    let consumer = stream
        .get_or_create_consumer(
            CONSUMER_NAME,
            consumer::pull::Config {
                durable_name: Some(CONSUMER_NAME.to_string()),
                filter_subject: cmd_subject.to_string(),
                deliver_policy: consumer::DeliverPolicy::New,
                ..Default::default()
            },
        )
        .await
        .context("Failed to get or create consumer")?;

    info!("Command consumer created, waiting for commands...");

    let mut messages = consumer.messages().await?;

    while let Some(next) = messages.next().await {
        match next {
            Ok(msg) => {
                let disposition = dispatcher.handle(&msg.payload).await;
                debug!(disposition = ?disposition, "Command handled");

                if let Err(e) = msg.ack().await {
                    error!(error = %e, "Failed to acknowledge message");
                }
            }
            Err(e) => {
                error!(error = %e, "Error receiving message");
            }
        }
    }

    warn!("Command consumer stream ended");
    Ok(())
}
