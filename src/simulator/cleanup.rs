use super::consolidation::{DEFAULT_FLASK_ID, LEFT_CHUTE_ID, RIGHT_CHUTE_ID};
use super::evaporation::{AMBIENT_PRESSURE, AMBIENT_TEMPERATURE};
use super::{unexpected_params, SimContext, TaskSimulator};
use crate::protocol::{
    ChuteProperties, ConsumableState, ContainerContentState, ContainerState, DeviceState,
    EntityKind, EntityUpdate, EvaporatorProperties, ReturnCartridgesParams, ReturnCcsBinsParams,
    ReturnTubeRackParams, RobotResult, RobotState, SetupCcsBinsParams, StopEvaporationParams,
    TaskParams, ToolState,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Closed chute holding the given bins
fn closed_chute(
    description: &str,
    front_waste_bin: Option<ContainerState>,
    back_waste_bin: Option<ContainerState>,
) -> ChuteProperties {
    ChuteProperties {
        state: DeviceState::Idle,
        description: description.to_string(),
        pulled_out_mm: 0.0,
        pulled_out_rate: 0.0,
        closed: true,
        front_waste_bin,
        back_waste_bin,
    }
}

/// Teardown after a purification run: stopping the evaporator, placing and
/// clearing waste bins, and returning consumables to the waste area
pub struct CleanupSimulator {
    ctx: Arc<SimContext>,
}

impl CleanupSimulator {
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    async fn moving(&self, task_id: &str, ws: &str, msg: &str) {
        let robot = EntityUpdate::robot(&self.ctx.robot_id, ws, RobotState::Working, "moving");
        self.ctx.publish_log(task_id, vec![robot], msg).await;
    }

    fn idle(&self, ws: &str) -> EntityUpdate {
        EntityUpdate::robot(&self.ctx.robot_id, ws, RobotState::Idle, "")
    }

    async fn stop_evaporation(
        &self,
        task_id: &str,
        params: &StopEvaporationParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, device_id = %params.device_id, "Simulating stop_evaporation");

        self.moving(task_id, ws, "robot moving to evaporation station")
            .await;
        ctx.apply_delay(15.0, 30.0).await;

        let stopped = EvaporatorProperties {
            state: DeviceState::Idle,
            description: "stopped".to_string(),
            lower_height: 0.0,
            rpm: 0,
            target_temperature: AMBIENT_TEMPERATURE,
            current_temperature: AMBIENT_TEMPERATURE,
            target_pressure: AMBIENT_PRESSURE,
            current_pressure: AMBIENT_PRESSURE,
        };
        let flask = ContainerState {
            content_state: ContainerContentState::Used,
            ..ContainerState::filled()
        };
        let flask_id = ctx.resolve_entity_id_or(EntityKind::RoundBottomFlask, ws, DEFAULT_FLASK_ID);

        let updates = vec![
            self.idle(ws),
            EntityUpdate::evaporator(&params.device_id, stopped),
            EntityUpdate::round_bottom_flask(flask_id, ws, flask, "evaporation_complete"),
        ];
        ctx.publish_log(task_id, updates.clone(), "evaporation stopped")
            .await;

        Ok(RobotResult::success(
            task_id,
            "stop_evaporation completed",
            updates,
        ))
    }

    async fn setup_ccs_bins(
        &self,
        task_id: &str,
        params: &SetupCcsBinsParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(
            task_id = %task_id,
            bins = ?params.bin_location_ids,
            "Simulating setup_ccs_bins"
        );

        self.moving(task_id, ws, "robot moving to bin storage").await;
        ctx.apply_delay(10.0, 20.0).await;

        let bin = ContainerState::default();
        let updates = vec![
            self.idle(ws),
            EntityUpdate::left_chute(
                LEFT_CHUTE_ID,
                closed_chute("bins placed", Some(bin.clone()), None),
            ),
            EntityUpdate::right_chute(RIGHT_CHUTE_ID, closed_chute("bins placed", None, Some(bin))),
        ];
        ctx.publish_log(task_id, updates.clone(), "bins placed in chutes")
            .await;

        Ok(RobotResult::success(
            task_id,
            "setup_ccs_bins completed",
            updates,
        ))
    }

    async fn return_ccs_bins(
        &self,
        task_id: &str,
        params: &ReturnCcsBinsParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, waste_area = %params.waste_area_id, "Simulating return_ccs_bins");

        self.moving(task_id, ws, "robot removing bins from chutes")
            .await;
        ctx.apply_delay(10.0, 20.0).await;

        let updates = vec![
            self.idle(ws),
            EntityUpdate::left_chute(LEFT_CHUTE_ID, closed_chute("", None, None)),
            EntityUpdate::right_chute(RIGHT_CHUTE_ID, closed_chute("", None, None)),
        ];
        ctx.publish_log(task_id, updates.clone(), "bins returned to waste area")
            .await;

        Ok(RobotResult::success(
            task_id,
            "return_ccs_bins completed",
            updates,
        ))
    }

    /// Frees the external module for the next setup
    async fn return_cartridges(
        &self,
        task_id: &str,
        params: &ReturnCartridgesParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        let waste = &params.waste_area_id;
        info!(task_id = %task_id, work_station = %ws, "Simulating return_cartridges");

        // Resolve while the cartridges are still located at the work station
        let silica_id = params
            .silica_cartridge_id
            .clone()
            .unwrap_or_else(|| ctx.resolve_entity_id(EntityKind::SilicaCartridge, ws));
        let sample_id = params
            .sample_cartridge_id
            .clone()
            .unwrap_or_else(|| ctx.resolve_entity_id(EntityKind::SampleCartridge, ws));

        self.moving(task_id, ws, "robot removing cartridges from mount")
            .await;
        ctx.apply_delay(10.0, 20.0).await;

        let updates = vec![
            self.idle(ws),
            EntityUpdate::silica_cartridge(silica_id, waste, ConsumableState::Used, "returned"),
            EntityUpdate::sample_cartridge(sample_id, waste, ConsumableState::Used, "returned"),
            EntityUpdate::external_module(ws, DeviceState::Idle, ""),
        ];
        ctx.publish_log(task_id, updates.clone(), "cartridges returned to waste area")
            .await;

        Ok(RobotResult::success(
            task_id,
            "return_cartridges completed",
            updates,
        ))
    }

    async fn return_tube_rack(
        &self,
        task_id: &str,
        params: &ReturnTubeRackParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, work_station = %ws, "Simulating return_tube_rack");

        let rack_id = params
            .tube_rack_id
            .clone()
            .unwrap_or_else(|| ctx.resolve_entity_id(EntityKind::TubeRack, ws));

        self.moving(task_id, ws, "robot picking up tube rack").await;
        ctx.apply_delay(10.0, 20.0).await;

        let updates = vec![
            self.idle(ws),
            EntityUpdate::tube_rack(
                rack_id,
                &params.waste_area_id,
                ToolState::Contaminated,
                "returned",
            ),
        ];
        ctx.publish_log(task_id, updates.clone(), "tube rack returned to waste area")
            .await;

        Ok(RobotResult::success(
            task_id,
            "return_tube_rack completed",
            updates,
        ))
    }
}

#[async_trait]
impl TaskSimulator for CleanupSimulator {
    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        _claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        match params {
            TaskParams::StopEvaporation(p) => self.stop_evaporation(task_id, p).await,
            TaskParams::SetupCcsBins(p) => self.setup_ccs_bins(task_id, p).await,
            TaskParams::ReturnCcsBins(p) => self.return_ccs_bins(task_id, p).await,
            TaskParams::ReturnCartridges(p) => self.return_cartridges(task_id, p).await,
            TaskParams::ReturnTubeRack(p) => self.return_tube_rack(task_id, p).await,
            other => Err(unexpected_params("CleanupSimulator", other)),
        }
    }
}
