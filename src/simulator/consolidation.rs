use super::{unexpected_params, SimContext, TaskSimulator};
use crate::protocol::{
    ChuteProperties, CollectFractionsParams, ContainerState, DeviceState, EntityKind, EntityUpdate,
    RobotResult, RobotState, TaskParams, ToolState,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_FLASK_ID: &str = "rbf_001";
pub const LEFT_CHUTE_ID: &str = "pcc_left_chute_001";
pub const RIGHT_CHUTE_ID: &str = "pcc_right_chute_001";

/// Chute pulled out with an open waste bin in front (left) or back (right)
fn pulled_out_chute(front_bin: bool) -> ChuteProperties {
    let bin = Some(ContainerState::default());
    ChuteProperties {
        state: DeviceState::Using,
        description: String::new(),
        pulled_out_mm: 200.0,
        pulled_out_rate: 0.8,
        closed: false,
        front_waste_bin: if front_bin { bin.clone() } else { None },
        back_waste_bin: if front_bin { None } else { bin },
    }
}

/// Pools the collected fraction tubes into a round-bottom flask
pub struct ConsolidationSimulator {
    ctx: Arc<SimContext>,
}

impl ConsolidationSimulator {
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    async fn consolidate(
        &self,
        task_id: &str,
        params: &CollectFractionsParams,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        let tubes = params.collected_tube_count();
        let base_delay = tubes as f64 * 3.0 + 10.0;
        info!(task_id = %task_id, tubes = tubes, "Simulating collect_cc_fractions");

        let rack_id = ctx.resolve_entity_id(EntityKind::TubeRack, ws);
        let flask_id = ctx.resolve_entity_id_or(EntityKind::RoundBottomFlask, ws, DEFAULT_FLASK_ID);

        ctx.publish_log(
            task_id,
            vec![
                EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, ""),
                EntityUpdate::tube_rack(&rack_id, ws, ToolState::Contaminated, "pulled_out"),
            ],
            "robot pulling out tube rack",
        )
        .await;

        ctx.apply_delay(base_delay * 0.8, base_delay * 1.2).await;

        let updates = vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, ""),
            EntityUpdate::tube_rack(
                &rack_id,
                ws,
                ToolState::Contaminated,
                "pulled_out, ready_for_recovery",
            ),
            EntityUpdate::round_bottom_flask(&flask_id, ws, ContainerState::filled(), ""),
            EntityUpdate::left_chute(LEFT_CHUTE_ID, pulled_out_chute(true)),
            EntityUpdate::right_chute(RIGHT_CHUTE_ID, pulled_out_chute(false)),
        ];

        Ok(RobotResult::success(task_id, "success", updates))
    }
}

#[async_trait]
impl TaskSimulator for ConsolidationSimulator {
    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        _claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        match params {
            TaskParams::CollectFractions(p) => self.consolidate(task_id, p).await,
            other => Err(unexpected_params("ConsolidationSimulator", other)),
        }
    }
}
