use super::{unexpected_params, SimContext, TaskSimulator};
use crate::protocol::{EntityKind, EntityUpdate, RobotResult, RobotState, TakePhotoParams, TaskParams};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracked entity kind behind a photographed device type
pub fn device_kind(device_type: &str) -> Option<EntityKind> {
    match device_type {
        "combiflash"
        | "column_chromatography"
        | "column_chromatography_machine"
        | "column_chromatography_system"
        | "isco_combiflash_nextgen_300"
        | "cc-isco-300p" => Some(EntityKind::ChromatographyMachine),
        "evaporator" | "rotary_evaporator" | "re-buchi-r180" => Some(EntityKind::Evaporator),
        _ => None,
    }
}

/// Photographs device components; 2-5s per component
pub struct PhotoSimulator {
    ctx: Arc<SimContext>,
}

impl PhotoSimulator {
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    /// Robot state and posture as currently tracked, idle if unknown
    fn current_robot(&self) -> (RobotState, String) {
        let robot = self
            .ctx
            .store
            .as_ref()
            .and_then(|store| store.get(EntityKind::Robot, &self.ctx.robot_id));

        match robot {
            Some(robot) => {
                let state = robot
                    .properties
                    .get("state")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or(RobotState::Idle);
                (state, robot.description().to_string())
            }
            None => (RobotState::Idle, String::new()),
        }
    }

    /// Snapshot of the photographed device, if tracked
    fn device_snapshot(&self, device_id: &str, device_type: &str) -> Option<EntityUpdate> {
        let kind = match device_kind(device_type) {
            Some(kind) => kind,
            None => {
                warn!(device_type = %device_type, "Unknown device_type for photo");
                return None;
            }
        };

        let entity = self.ctx.store.as_ref()?.get(kind, device_id)?;
        match entity.to_update() {
            Ok(update) => Some(update),
            Err(e) => {
                warn!(
                    device_id = %device_id,
                    error = %e,
                    "Tracked device state has unexpected shape, omitting snapshot"
                );
                None
            }
        }
    }

    async fn take_photo(&self, task_id: &str, params: &TakePhotoParams) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        let components = params.components.to_vec();
        info!(
            task_id = %task_id,
            components = components.len(),
            "Simulating take_photo"
        );

        let (state, description) = self.current_robot();
        let arrived = EntityUpdate::robot(&ctx.robot_id, ws, state, description);

        ctx.publish_log(task_id, vec![arrived.clone()], "robot arrived at station")
            .await;

        let n = components.len() as f64;
        ctx.apply_delay(2.0 * n, 5.0 * n).await;

        for component in &components {
            ctx.publish_log(
                task_id,
                vec![arrived.clone()],
                &format!("photo taken for {}", component),
            )
            .await;
        }

        let mut updates = vec![EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, "")];
        match self.device_snapshot(&params.device_id, &params.device_type) {
            Some(snapshot) => updates.push(snapshot),
            None => debug!(device_id = %params.device_id, "No tracked device state for photo"),
        }

        let images =
            ctx.captured_images(ws, &params.device_id, &params.device_type, &components);

        Ok(RobotResult::success(task_id, "success", updates).with_images(images))
    }
}

#[async_trait]
impl TaskSimulator for PhotoSimulator {
    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        _claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        match params {
            TaskParams::TakePhoto(p) => self.take_photo(task_id, p).await,
            other => Err(unexpected_params("PhotoSimulator", other)),
        }
    }
}
