// Command dispatch: decode, inject faults, validate, simulate, report

use crate::config::SimConfig;
use crate::mq::Publisher;
use crate::precondition::PreconditionChecker;
use crate::protocol::{
    codes, decode_command, EntityUpdate, Inbound, RobotCommand, RobotResult, TaskParams, TaskType,
};
use crate::scenario::{shared_rng, ScenarioInjector};
use crate::simulator::{SimContext, SimulatorRegistry, TaskSimulator};
use crate::state::{EntityStore, StoreSnapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};


/// What happened to one inbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Undecodable or invalid envelope; nothing published
    Dropped,
    /// Injected timeout; nothing published
    Silent,
    /// A result with this code was published
    Replied(i32),
    /// Long-running task detached; its result follows later
    Spawned,
}

/// A long-running task that has not published its result yet
#[derive(Debug, Clone)]
pub struct InFlightTask {
    pub task_type: TaskType,
    pub started_at: DateTime<Utc>,
}

/// Publishes results, commits successful updates and rolls back failed
/// claims.
///
/// Cloned into every detached long-running task.
#[derive(Clone)]
struct Reporter {
    store: Option<Arc<EntityStore>>,
    publisher: Arc<dyn Publisher>,
}

impl Reporter {
    async fn reply(&self, result: &RobotResult) -> Disposition {
        let code = result.code;
        if result.is_success() {
            info!(task_id = %result.task_id, code = code, "Publishing result");
        } else {
            warn!(
                task_id = %result.task_id,
                code = code,
                msg = %result.msg,
                "Publishing error result"
            );
        }

        if let Err(e) = self.publisher.publish_result(result).await {
            error!(task_id = %result.task_id, error = %e, "Failed to publish result");
        }
        Disposition::Replied(code)
    }

    fn commit(&self, updates: &[EntityUpdate]) -> Result<()> {
        if let Some(store) = &self.store {
            store
                .apply_updates(updates)
                .context("Failed to apply entity updates")?;
        }
        Ok(())
    }

    /// Publish the result, then commit its updates if it succeeded
    async fn finish(&self, result: RobotResult) -> Result<Disposition> {
        let disposition = self.reply(&result).await;
        if result.is_success() {
            self.commit(&result.updates)?;
        }
        Ok(disposition)
    }

    async fn internal_error(&self, task_id: &str) -> Disposition {
        self.reply(&RobotResult::error(
            task_id,
            codes::INTERNAL_ERROR,
            "Internal mock server error",
        ))
        .await
    }

    fn snapshot(&self, updates: &[EntityUpdate]) -> Option<StoreSnapshot> {
        self.store.as_ref().map(|store| store.snapshot(updates))
    }

    /// Undo a claim whose task never produced a result
    fn rollback(&self, task_id: &str, snapshot: Option<StoreSnapshot>) {
        let snapshot = snapshot.filter(|s| !s.is_empty());
        if let (Some(store), Some(snapshot)) = (&self.store, snapshot) {
            warn!(task_id = %task_id, entities = snapshot.len(), "Rolling back claim");
            store.restore(snapshot);
        }
    }
}

/// Routes robot commands to simulators.
///
/// Quick tasks are simulated inline. Long-running tasks commit their
/// claim to the store and are then detached, so a follow-up command for
/// the same device already sees it busy.
pub struct Dispatcher {
    reporter: Reporter,
    checker: Option<PreconditionChecker>,
    injector: ScenarioInjector,
    registry: SimulatorRegistry,
    in_flight: Arc<DashMap<String, InFlightTask>>,
}

impl Dispatcher {
    /// Build a dispatcher with the standard simulators.
    ///
    /// Without a store, preconditions are skipped and `reset_state`
    /// answers 1002.
    pub fn new(
        config: &SimConfig,
        store: Option<Arc<EntityStore>>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let rng = shared_rng(config.scenario.seed);
        let ctx = Arc::new(SimContext::new(
            config,
            store.clone(),
            Arc::clone(&publisher),
            Arc::clone(&rng),
        ));

        Self {
            checker: store.clone().map(PreconditionChecker::new),
            injector: ScenarioInjector::new(config.scenario.clone(), rng),
            registry: SimulatorRegistry::standard(ctx),
            reporter: Reporter { store, publisher },
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Replace the simulator for `task_type`
    pub fn with_simulator(mut self, task_type: TaskType, simulator: Arc<dyn TaskSimulator>) -> Self {
        self.registry.register(task_type, simulator);
        self
    }

    pub fn without_simulator(mut self, task_type: TaskType) -> Self {
        self.registry.remove(task_type);
        self
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Snapshot of the detached tasks still running
    pub fn in_flight(&self) -> Vec<(String, InFlightTask)> {
        self.in_flight
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Handle one raw command payload. Never fails: every error after
    /// decoding is reported to the orchestrator as a result.
    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        let command = match decode_command(payload) {
            Ok(Inbound::Reset { task_id }) => return self.reset(&task_id).await,
            Ok(Inbound::Command(command)) => command,
            Err(e) => {
                error!(error = %e, "Failed to decode command, dropping");
                return Disposition::Dropped;
            }
        };

        let task_id = command.task_id.clone();
        let task_type = command.task_type;
        info!(task_id = %task_id, task_type = %task_type, "Received command");

        if self.injector.should_timeout(task_type) {
            warn!(task_id = %task_id, task_type = %task_type, "Simulating timeout, no reply");
            return Disposition::Silent;
        }

        if self.injector.should_fail(task_type) {
            let result = self.injector.failure_result(&task_id, task_type);
            return self.reporter.reply(&result).await;
        }

        match AssertUnwindSafe(self.execute(command)).catch_unwind().await {
            Ok(Ok(disposition)) => disposition,
            Ok(Err(e)) => {
                error!(task_id = %task_id, error = ?e, "Task failed");
                self.reporter.internal_error(&task_id).await
            }
            Err(panic) => {
                error!(
                    task_id = %task_id,
                    panic = %panic_message(&*panic),
                    "Task panicked"
                );
                self.reporter.internal_error(&task_id).await
            }
        }
    }

    async fn reset(&self, task_id: &str) -> Disposition {
        let result = match &self.reporter.store {
            Some(store) => {
                store.reset();
                RobotResult::success(task_id, "World state reset", Vec::new())
            }
            None => RobotResult::error(
                task_id,
                codes::STATE_TRACKING_DISABLED,
                "World state tracking not enabled",
            ),
        };
        self.reporter.reply(&result).await
    }

    async fn execute(&self, command: RobotCommand) -> Result<Disposition> {
        let RobotCommand {
            task_id,
            task_type,
            params,
        } = command;

        let simulator = match self.registry.get(task_type) {
            Some(simulator) => simulator,
            None => {
                let result = RobotResult::error(
                    &task_id,
                    codes::UNKNOWN_TASK_TYPE,
                    format!("Unknown task type: {}", task_type),
                );
                return Ok(self.reporter.reply(&result).await);
            }
        };

        let params = match TaskParams::parse(task_type, params) {
            Ok(params) => params,
            Err(e) => {
                let result = RobotResult::error(
                    &task_id,
                    codes::INVALID_PARAMS,
                    format!("Parameter validation error: {}", e),
                );
                return Ok(self.reporter.reply(&result).await);
            }
        };

        if let Some(checker) = &self.checker {
            let outcome = checker.check(&params);
            if !outcome.ok {
                let result = RobotResult::error(&task_id, outcome.error_code, outcome.error_msg);
                return Ok(self.reporter.reply(&result).await);
            }
        }

        if task_type.is_long_running() {
            let claimed = simulator
                .claim(&task_id, &params)
                .context("Failed to build claim updates")?;
            let snapshot = self.reporter.snapshot(&claimed);
            self.reporter.commit(&claimed)?;
            self.spawn(task_id, params, simulator, claimed, snapshot);
            return Ok(Disposition::Spawned);
        }

        let result = simulator.simulate(&task_id, &params, Vec::new()).await?;
        self.reporter.finish(result).await
    }

    fn spawn(
        &self,
        task_id: String,
        params: TaskParams,
        simulator: Arc<dyn TaskSimulator>,
        claimed: Vec<EntityUpdate>,
        snapshot: Option<StoreSnapshot>,
    ) {
        let task_type = params.task_type();
        self.in_flight.insert(
            task_id.clone(),
            InFlightTask {
                task_type,
                started_at: Utc::now(),
            },
        );
        info!(task_id = %task_id, task_type = %task_type, "Long-running task started");

        let reporter = self.reporter.clone();
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let run = async {
                let result = simulator.simulate(&task_id, &params, claimed).await?;
                reporter.finish(result).await
            };

            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(disposition)) => {
                    info!(
                        task_id = %task_id,
                        disposition = ?disposition,
                        "Long-running task finished"
                    );
                }
                Ok(Err(e)) => {
                    error!(task_id = %task_id, error = ?e, "Long-running task failed");
                    reporter.rollback(&task_id, snapshot);
                    reporter.internal_error(&task_id).await;
                }
                Err(panic) => {
                    error!(
                        task_id = %task_id,
                        panic = %panic_message(&*panic),
                        "Long-running task panicked"
                    );
                    reporter.rollback(&task_id, snapshot);
                    reporter.internal_error(&task_id).await;
                }
            }

            in_flight.remove(&task_id);
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
