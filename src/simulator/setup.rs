use super::{unexpected_params, SimContext, TaskSimulator};
use crate::protocol::{
    CollapseCartridgesParams, ConsumableState, DeviceState, EntityKind, EntityUpdate, RobotResult,
    RobotState, SetupCartridgesParams, SetupTubeRackParams, TaskParams, ToolState,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Mounts cartridges onto the CC external module and tube racks onto the
/// work station, and collapses spent cartridges in place
pub struct SetupSimulator {
    ctx: Arc<SimContext>,
}

impl SetupSimulator {
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    async fn setup_cartridges(
        &self,
        task_id: &str,
        params: &SetupCartridgesParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, work_station = %ws, "Simulating setup_cartridges");

        ctx.publish_log(
            task_id,
            vec![EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, "moving")],
            "robot moving to work station",
        )
        .await;

        ctx.apply_delay(15.0, 30.0).await;

        let silica_id = ctx.resolve_entity_id(EntityKind::SilicaCartridge, ws);
        let mounted = vec![
            EntityUpdate::silica_cartridge(&silica_id, ws, ConsumableState::InUse, "mounted"),
            EntityUpdate::sample_cartridge(
                &params.sample_cartridge_id,
                ws,
                ConsumableState::InUse,
                "mounted",
            ),
            EntityUpdate::external_module(ws, DeviceState::Using, "cartridges mounted"),
        ];
        ctx.publish_log(task_id, mounted.clone(), "cartridges mounted")
            .await;

        let idle = EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, "");
        ctx.publish_log(task_id, vec![idle.clone()], "robot idle").await;

        let mut updates = vec![idle];
        updates.extend(mounted);

        Ok(RobotResult::success(
            task_id,
            "setup_cartridges completed",
            updates,
        ))
    }

    async fn setup_tube_rack(
        &self,
        task_id: &str,
        params: &SetupTubeRackParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, work_station = %ws, "Simulating setup_tube_rack");

        ctx.publish_log(
            task_id,
            vec![EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, "moving")],
            "robot moving to work station",
        )
        .await;

        ctx.apply_delay(10.0, 20.0).await;

        let rack_id = ctx.resolve_entity_id(EntityKind::TubeRack, ws);
        let rack = EntityUpdate::tube_rack(&rack_id, ws, ToolState::InUse, "mounted");
        ctx.publish_log(task_id, vec![rack.clone()], "tube_rack mounted")
            .await;

        let updates = vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, ""),
            rack,
        ];

        Ok(RobotResult::success(
            task_id,
            "setup_tube_rack completed",
            updates,
        ))
    }

    /// Spent cartridges stay on the module until they are returned
    async fn collapse_cartridges(
        &self,
        task_id: &str,
        params: &CollapseCartridgesParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        info!(task_id = %task_id, work_station = %ws, "Simulating collapse_cartridges");

        ctx.publish_log(
            task_id,
            vec![EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, "moving")],
            "robot moving to work station",
        )
        .await;

        ctx.apply_delay(10.0, 15.0).await;

        let silica_id = params
            .silica_cartridge_id
            .clone()
            .unwrap_or_else(|| ctx.resolve_entity_id(EntityKind::SilicaCartridge, ws));
        let sample_id = params
            .sample_cartridge_id
            .clone()
            .unwrap_or_else(|| ctx.resolve_entity_id(EntityKind::SampleCartridge, ws));

        let updates = vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, ""),
            EntityUpdate::silica_cartridge(silica_id, ws, ConsumableState::Used, "collapsed"),
            EntityUpdate::sample_cartridge(sample_id, ws, ConsumableState::Used, "collapsed"),
            EntityUpdate::external_module(ws, DeviceState::Using, "cartridges collapsed"),
        ];
        ctx.publish_log(task_id, updates.clone(), "cartridges collapsed")
            .await;

        Ok(RobotResult::success(
            task_id,
            "collapse_cartridges completed",
            updates,
        ))
    }
}

#[async_trait]
impl TaskSimulator for SetupSimulator {
    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        _claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        match params {
            TaskParams::SetupCartridges(p) => self.setup_cartridges(task_id, p).await,
            TaskParams::SetupTubeRack(p) => self.setup_tube_rack(task_id, p).await,
            TaskParams::CollapseCartridges(p) => self.collapse_cartridges(task_id, p).await,
            other => Err(unexpected_params("SetupSimulator", other)),
        }
    }
}
