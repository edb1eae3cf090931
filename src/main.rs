use anyhow::{Context, Result};
use robot_sim::config::SimConfig;
use robot_sim::dispatcher::Dispatcher;
use robot_sim::mq::{run_consumer, run_heartbeat, NatsClient, NatsPublisher, Publisher};
use robot_sim::state::EntityStore;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robot_sim=info".into()),
        )
        .init();

    info!("Robot simulator starting...");

    let config = SimConfig::load().context("Failed to load configuration")?;
    info!(
        robot_id = %config.robot.robot_id,
        nats_url = %config.nats.url,
        speed_multiplier = config.timing.speed_multiplier,
        default_scenario = ?config.scenario.default_scenario,
        failure_rate = config.scenario.failure_rate,
        timeout_rate = config.scenario.timeout_rate,
        "Configuration loaded"
    );

    let nats = NatsClient::connect(config.nats.clone(), &config.robot.robot_id).await?;
    let subjects = nats.subjects().clone();
    info!(cmd = %subjects.cmd, result = %subjects.result, "NATS connected");

    let publisher: Arc<dyn Publisher> = Arc::new(NatsPublisher::new(
        nats.client().clone(),
        nats.jetstream().clone(),
        subjects.clone(),
    ));

    let store = Arc::new(EntityStore::new());
    let dispatcher = Arc::new(Dispatcher::new(
        &config,
        Some(Arc::clone(&store)),
        Arc::clone(&publisher),
    ));

    let heartbeat = tokio::spawn(run_heartbeat(
        Arc::clone(&store),
        Arc::clone(&publisher),
        config.robot.robot_id.clone(),
        config.heartbeat.interval_seconds,
    ));
    info!(
        interval_seconds = config.heartbeat.interval_seconds,
        "Heartbeat started"
    );

    let consumer = {
        let jetstream = nats.jetstream().clone();
        let stream_name = config.nats.stream_name.clone();
        let cmd_subject = subjects.cmd.clone();
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = run_consumer(jetstream, &stream_name, &cmd_subject, dispatcher).await {
                error!(error = ?e, "Command consumer failed");
            }
        })
    };

    info!("Robot simulator ready");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
        _ = consumer => {
            warn!("Command consumer exited");
        }
    }

    // Detached long-running tasks die with the runtime
    let abandoned = dispatcher.in_flight();
    for (task_id, task) in &abandoned {
        warn!(
            task_id = %task_id,
            task_type = %task.task_type,
            started_at = %task.started_at,
            "Abandoning in-flight task"
        );
    }
    info!(in_flight = abandoned.len(), "Robot simulator stopped");

    heartbeat.abort();
    Ok(())
}
