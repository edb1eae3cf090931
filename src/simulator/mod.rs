// Task simulators: timing, narrative log messages and final entity updates

mod chromatography;
mod cleanup;
mod consolidation;
mod evaporation;
mod photo;
mod setup;
pub mod timing;

pub use chromatography::ChromatographySimulator;
pub use cleanup::CleanupSimulator;
pub use consolidation::ConsolidationSimulator;
pub use evaporation::EvaporationSimulator;
pub use photo::PhotoSimulator;
pub use setup::SetupSimulator;

use crate::config::{SimConfig, TimingConfig};
use crate::mq::Publisher;
use crate::protocol::{
    codes, image_url, robot_timestamp, CapturedImage, EntityKind, EntityUpdate, LogMessage,
    RobotResult, TaskParams, TaskType,
};
use crate::scenario::{lock_rng, SharedRng};
use crate::state::EntityStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Emulates the robot performing one family of tasks.
///
/// Long-running simulators return their initial device/material
/// transition from `claim`; the dispatcher commits it to the store before
/// the simulation starts and hands it back as `claimed`.
#[async_trait]
pub trait TaskSimulator: Send + Sync {
    fn claim(&self, _task_id: &str, _params: &TaskParams) -> Result<Vec<EntityUpdate>> {
        Ok(Vec::new())
    }

    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult>;
}

/// Everything a simulator needs besides its params
pub struct SimContext {
    /// Read-only use: entity identity resolution and device snapshots
    pub store: Option<Arc<EntityStore>>,
    pub publisher: Arc<dyn Publisher>,
    pub timing: TimingConfig,
    pub robot_id: String,
    pub image_base_url: String,
    pub rng: SharedRng,
}

impl SimContext {
    pub fn new(
        config: &SimConfig,
        store: Option<Arc<EntityStore>>,
        publisher: Arc<dyn Publisher>,
        rng: SharedRng,
    ) -> Self {
        Self {
            store,
            publisher,
            timing: config.timing.clone(),
            robot_id: config.robot.robot_id.clone(),
            image_base_url: config.robot.image_base_url.clone(),
            rng,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.timing.speed_multiplier
    }

    /// Publish a progress entry on the log channel; failures are only logged
    pub async fn publish_log(&self, task_id: &str, updates: Vec<EntityUpdate>, msg: &str) {
        let log = LogMessage {
            code: codes::SUCCESS,
            msg: msg.to_string(),
            task_id: task_id.to_string(),
            updates,
            timestamp: robot_timestamp(),
        };
        if let Err(e) = self.publisher.publish_log(&log).await {
            warn!(task_id = %task_id, error = %e, "Failed to publish log message");
        }
    }

    /// Sleep for a randomized, speed-scaled delay
    pub async fn apply_delay(&self, base_min: f64, base_max: f64) {
        let delay = {
            let mut rng = lock_rng(&self.rng);
            timing::calculate_delay(
                &mut *rng,
                base_min,
                base_max,
                self.timing.speed_multiplier,
                self.timing.min_delay_seconds,
            )
        };
        debug!(
            delay = delay,
            base_min = base_min,
            base_max = base_max,
            "Applying delay"
        );
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
    }

    /// Id of the tracked `kind` entity located at `location`, else `location` itself
    pub fn resolve_entity_id(&self, kind: EntityKind, location: &str) -> String {
        self.resolve_entity_id_or(kind, location, location)
    }

    pub fn resolve_entity_id_or(&self, kind: EntityKind, location: &str, fallback: &str) -> String {
        let found = self
            .store
            .as_ref()
            .and_then(|store| store.find_by_location(kind, location));
        match found {
            Some(entity) => entity.id,
            None => {
                debug!(
                    kind = %kind,
                    location = %location,
                    fallback = %fallback,
                    "Entity not tracked at location, using fallback id"
                );
                fallback.to_string()
            }
        }
    }

    /// One mock capture per component
    pub fn captured_images(
        &self,
        work_station: &str,
        device_id: &str,
        device_type: &str,
        components: &[String],
    ) -> Vec<CapturedImage> {
        components
            .iter()
            .map(|component| {
                let timestamp = robot_timestamp();
                CapturedImage {
                    work_station: work_station.to_string(),
                    device_id: device_id.to_string(),
                    device_type: device_type.to_string(),
                    component: component.clone(),
                    url: image_url(
                        &self.image_base_url,
                        work_station,
                        device_id,
                        component,
                        &timestamp,
                    ),
                    create_time: timestamp,
                }
            })
            .collect()
    }
}

/// Simulators keyed by the task type they handle
#[derive(Clone, Default)]
pub struct SimulatorRegistry {
    simulators: HashMap<TaskType, Arc<dyn TaskSimulator>>,
}

impl SimulatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in simulator
    pub fn standard(ctx: Arc<SimContext>) -> Self {
        let setup: Arc<dyn TaskSimulator> = Arc::new(SetupSimulator::new(Arc::clone(&ctx)));
        let chromatography: Arc<dyn TaskSimulator> =
            Arc::new(ChromatographySimulator::new(Arc::clone(&ctx)));
        let cleanup: Arc<dyn TaskSimulator> = Arc::new(CleanupSimulator::new(Arc::clone(&ctx)));

        let mut registry = Self::new();
        for task_type in TaskType::ALL {
            let simulator: Arc<dyn TaskSimulator> = match task_type {
                TaskType::SetupCartridges
                | TaskType::SetupTubeRack
                | TaskType::CollapseCartridges => Arc::clone(&setup),
                TaskType::TakePhoto => Arc::new(PhotoSimulator::new(Arc::clone(&ctx))),
                TaskType::StartChromatography | TaskType::TerminateChromatography => {
                    Arc::clone(&chromatography)
                }
                TaskType::CollectFractions => {
                    Arc::new(ConsolidationSimulator::new(Arc::clone(&ctx)))
                }
                TaskType::StartEvaporation => Arc::new(EvaporationSimulator::new(Arc::clone(&ctx))),
                TaskType::StopEvaporation
                | TaskType::SetupCcsBins
                | TaskType::ReturnCcsBins
                | TaskType::ReturnCartridges
                | TaskType::ReturnTubeRack => Arc::clone(&cleanup),
            };
            registry.register(task_type, simulator);
        }
        registry
    }

    pub fn register(&mut self, task_type: TaskType, simulator: Arc<dyn TaskSimulator>) {
        self.simulators.insert(task_type, simulator);
    }

    pub fn remove(&mut self, task_type: TaskType) -> Option<Arc<dyn TaskSimulator>> {
        self.simulators.remove(&task_type)
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskSimulator>> {
        self.simulators.get(&task_type).cloned()
    }
}

/// Error for params routed to the wrong simulator
fn unexpected_params(simulator: &str, params: &TaskParams) -> anyhow::Error {
    anyhow::anyhow!("{} cannot handle task: {}", simulator, params.task_type())
}
