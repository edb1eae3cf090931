use super::consolidation::DEFAULT_FLASK_ID;
use super::timing::{evaporation_schedule, round1, ProgressTicker};
use super::{unexpected_params, SimContext, TaskSimulator};
use crate::protocol::{
    posture, ContainerState, DeviceState, EntityKind, EntityUpdate, EvaporationProfile,
    EvaporatorProperties, RobotResult, RobotState, StartEvaporationParams, TaskParams,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const AMBIENT_TEMPERATURE: f64 = 25.0;
pub const AMBIENT_PRESSURE: f64 = 1013.0;

/// Rotary evaporation with a linear temperature/pressure ramp (long-running)
pub struct EvaporationSimulator {
    ctx: Arc<SimContext>,
}

/// Evaporator readings at `progress` of the way from ambient to the profile targets
fn ramped(profile: &EvaporationProfile, state: DeviceState, progress: f64) -> EvaporatorProperties {
    let temperature =
        AMBIENT_TEMPERATURE + (profile.target_temperature - AMBIENT_TEMPERATURE) * progress;
    let pressure = AMBIENT_PRESSURE + (profile.target_pressure - AMBIENT_PRESSURE) * progress;

    EvaporatorProperties {
        state,
        description: String::new(),
        lower_height: profile.lower_height,
        rpm: profile.rpm,
        target_temperature: profile.target_temperature,
        current_temperature: round1(temperature),
        target_pressure: profile.target_pressure,
        current_pressure: round1(pressure),
    }
}

impl EvaporationSimulator {
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    fn flask_id(&self, ws: &str) -> String {
        self.ctx
            .resolve_entity_id_or(EntityKind::RoundBottomFlask, ws, DEFAULT_FLASK_ID)
    }

    /// Robot observing, evaporator running at ambient, flask evaporating
    fn start_claim(&self, params: &StartEvaporationParams) -> Vec<EntityUpdate> {
        let ctx = &self.ctx;
        let ws = &params.work_station;

        vec![
            EntityUpdate::robot(
                &ctx.robot_id,
                ws,
                RobotState::Working,
                posture::OBSERVE_EVAPORATION,
            ),
            EntityUpdate::evaporator(
                &params.device_id,
                ramped(&params.profiles.start, DeviceState::Using, 0.0),
            ),
            EntityUpdate::round_bottom_flask(
                self.flask_id(ws),
                ws,
                ContainerState::filled(),
                "evaporating",
            ),
        ]
    }

    async fn start(
        &self,
        task_id: &str,
        params: &StartEvaporationParams,
        claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        let ctx = &self.ctx;
        let ws = &params.work_station;
        let start = &params.profiles.start;
        info!(
            task_id = %task_id,
            target_temperature = start.target_temperature,
            target_pressure = start.target_pressure,
            "Simulating start_evaporation"
        );

        let claimed = if claimed.is_empty() {
            self.start_claim(params)
        } else {
            claimed
        };

        ctx.publish_log(
            task_id,
            vec![EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Working, "moving")],
            "robot moving to evaporation station",
        )
        .await;

        ctx.apply_delay(3.0, 5.0).await;

        ctx.publish_log(task_id, claimed, "evaporation started").await;

        let (seconds, triggered_by) = evaporation_schedule(&params.profiles);
        let mut ticker = ProgressTicker::new(seconds * ctx.multiplier());

        while let Some(elapsed) = ticker.tick().await {
            let reading = ramped(start, DeviceState::Using, ticker.progress());
            debug!(
                task_id = %task_id,
                elapsed = elapsed,
                total = ticker.total(),
                temperature = reading.current_temperature,
                pressure = reading.current_pressure,
                "Evaporation progress"
            );
            ctx.publish_log(
                task_id,
                vec![EntityUpdate::evaporator(&params.device_id, reading)],
                "evaporation ramp in progress",
            )
            .await;
        }

        // Settle exactly on the final set-points with the rotor stopped
        let last = triggered_by.unwrap_or(start);
        let settled = EvaporatorProperties {
            state: DeviceState::Idle,
            description: String::new(),
            lower_height: last.lower_height,
            rpm: 0,
            target_temperature: last.target_temperature,
            current_temperature: last.target_temperature,
            target_pressure: last.target_pressure,
            current_pressure: last.target_pressure,
        };

        let updates = vec![
            EntityUpdate::robot(&ctx.robot_id, ws, RobotState::Idle, ""),
            EntityUpdate::evaporator(&params.device_id, settled),
            EntityUpdate::round_bottom_flask(
                self.flask_id(ws),
                ws,
                ContainerState::filled(),
                "evaporation_complete",
            ),
        ];

        info!(task_id = %task_id, seconds = ticker.total(), "Evaporation simulation complete");
        Ok(RobotResult::success(task_id, "success", updates))
    }
}

#[async_trait]
impl TaskSimulator for EvaporationSimulator {
    fn claim(&self, _task_id: &str, params: &TaskParams) -> Result<Vec<EntityUpdate>> {
        match params {
            TaskParams::StartEvaporation(p) => Ok(self.start_claim(p)),
            other => Err(unexpected_params("EvaporationSimulator", other)),
        }
    }

    async fn simulate(
        &self,
        task_id: &str,
        params: &TaskParams,
        claimed: Vec<EntityUpdate>,
    ) -> Result<RobotResult> {
        match params {
            TaskParams::StartEvaporation(p) => self.start(task_id, p, claimed).await,
            other => Err(unexpected_params("EvaporationSimulator", other)),
        }
    }
}
