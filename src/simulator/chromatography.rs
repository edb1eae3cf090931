use super::timing::{cc_duration, ProgressTicker};
use super::{unexpected_params, SimContext, TaskSimulator};
use crate::protocol::{
    posture, robot_timestamp, CcExperimentParams, CcMachineProperties, ConsumableState,
    DeviceState, EntityKind, EntityUpdate, RobotResult, RobotState, StartCcParams, TaskParams,
    TerminateCcParams, ToolState,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Machine description once a run has finished but has not been terminated
pub const RUN_COMPLETE: &str = "run_complete";

/// Starts (long-running) and terminates column chromatography runs
pub struct ChromatographySimulator {
    ctx: Arc<SimContext>,
}

impl ChromatographySimulator {
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    fn machine(
        device_id: &str,
        state: DeviceState,
        experiment_params: Option<CcExperimentParams>,
        start_timestamp: Option<String>,
        description: &str,
    ) -> EntityUpdate {
        EntityUpdate::chromatography_machine(
            device_id,
            CcMachineProperties {
                state,
                experiment_params,
                start_timestamp,
                description: description.to_string(),
            },
        )
    }

    /// Robot watching the screen, machine running, materials in use
    fn start_claim(&self, params: &StartCcParams) -> Vec<EntityUpdate> {
        let ctx = &self.ctx;
        let ws = &params.work_station;

        vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, posture::WATCH_CC_SCREEN),
            Self::machine(
                &params.device_id,
                DeviceState::Using,
                Some(params.experiment_params.clone()),
                Some(robot_timestamp()),
                "",
            ),
            EntityUpdate::silica_cartridge(
                ctx.resolve_entity_id(EntityKind::SilicaCartridge, ws),
                ws,
                ConsumableState::InUse,
                "mounted",
            ),
            EntityUpdate::sample_cartridge(
                ctx.resolve_entity_id(EntityKind::SampleCartridge, ws),
                ws,
                ConsumableState::InUse,
                "mounted",
            ),
            EntityUpdate::tube_rack(
                ctx.resolve_entity_id(EntityKind::TubeRack, ws),
                ws,
                ToolState::InUse,
                "mounted",
            ),
        ]
    }

    async fn start(
        &self,
        task_id: &str,
        params: &StartCcParams,
        claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        let run_minutes = params.experiment_params.run_minutes;
        info!(task_id = %task_id, run_minutes = run_minutes, "Simulating start_cc");

        let claimed = if claimed.is_empty() {
            self.start_claim(params)
        } else {
            claimed
        };

        // Experiment context recorded by the claim
        let (experiment_params, start_timestamp) = claimed
            .iter()
            .find_map(|u| match u {
                EntityUpdate::ChromatographyMachine { properties, .. } => Some((
                    properties.experiment_params.clone(),
                    properties.start_timestamp.clone(),
                )),
                _ => None,
            })
            .unwrap_or((Some(params.experiment_params.clone()), None));

        ctx.publish_log(
            task_id,
            vec![EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, "moving")],
            "robot moving to CC station",
        )
        .await;

        ctx.apply_delay(3.0, 5.0).await;

        ctx.publish_log(task_id, claimed, "CC process started").await;

        let mut ticker = ProgressTicker::new(cc_duration(run_minutes, ctx.multiplier()));
        while let Some(elapsed) = ticker.tick().await {
            let running = Self::machine(
                &params.device_id,
                DeviceState::Using,
                experiment_params.clone(),
                start_timestamp.clone(),
                "",
            );
            ctx.publish_log(task_id, vec![running], "CC in progress").await;
            debug!(
                task_id = %task_id,
                elapsed = elapsed,
                total = ticker.total(),
                "CC progress"
            );
        }

        let updates = vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, ""),
            Self::machine(
                &params.device_id,
                DeviceState::Using,
                experiment_params,
                start_timestamp,
                RUN_COMPLETE,
            ),
        ];

        info!(task_id = %task_id, seconds = ticker.total(), "CC simulation complete");
        Ok(RobotResult::success(task_id, "success", updates))
    }

    /// Experiment context from the tracked machine, else from the command
    fn experiment_context(
        &self,
        params: &TerminateCcParams,
    ) -> (Option<CcExperimentParams>, Option<String>) {
        let tracked = self
            .ctx
            .store
            .as_ref()
            .and_then(|store| store.get(EntityKind::ChromatographyMachine, &params.device_id))
            .and_then(|entity| entity.to_update().ok());

        let (stored_params, start_timestamp) = match tracked {
            Some(EntityUpdate::ChromatographyMachine { properties, .. }) => {
                (properties.experiment_params, properties.start_timestamp)
            }
            _ => (None, None),
        };

        (
            stored_params.or_else(|| Some(params.experiment_params.clone())),
            start_timestamp,
        )
    }

    async fn terminate(&self, task_id: &str, params: &TerminateCcParams) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, device_id = %params.device_id, "Simulating terminate_cc");

        let (experiment_params, start_timestamp) = self.experiment_context(params);

        let updates = vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, ""),
            Self::machine(
                &params.device_id,
                DeviceState::Idle,
                experiment_params,
                start_timestamp,
                "",
            ),
            EntityUpdate::silica_cartridge(
                ctx.resolve_entity_id(EntityKind::SilicaCartridge, ws),
                ws,
                ConsumableState::Used,
                "",
            ),
            EntityUpdate::sample_cartridge(
                ctx.resolve_entity_id(EntityKind::SampleCartridge, ws),
                ws,
                ConsumableState::Used,
                "",
            ),
            EntityUpdate::tube_rack(
                ctx.resolve_entity_id(EntityKind::TubeRack, ws),
                ws,
                ToolState::Contaminated,
                "used",
            ),
            EntityUpdate::external_module(ws, DeviceState::Using, "cartridges still mounted"),
        ];

        let images = ctx.captured_images(
            ws,
            &params.device_id,
            &params.device_type,
            &["screen".to_string()],
        );

        ctx.publish_log(task_id, updates.clone(), "robot terminating CC")
            .await;

        ctx.apply_delay(10.0, 15.0).await;

        Ok(RobotResult::success(task_id, "success", updates).with_images(images))
    }
}

#[async_trait]
impl TaskSimulator for ChromatographySimulator {
    fn claim(&self, _task_id: &str, params: &TaskParams) -> Result<Vec<EntityUpdate>> {
        match params {
            TaskParams::StartChromatography(p) => Ok(self.start_claim(p)),
            TaskParams::TerminateChromatography(_) => Ok(Vec::new()),
            other => Err(unexpected_params("ChromatographySimulator", other)),
        }
    }

    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        match params {
            TaskParams::StartChromatography(p) => self.start(task_id, p, claimed).await,
            TaskParams::TerminateChromatography(p) => self.terminate(task_id, p).await,
            other => Err(unexpected_params("ChromatographySimulator", other)),
        }
    }
}
