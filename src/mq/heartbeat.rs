use crate::mq::publisher::Publisher;
use crate::protocol::{robot_timestamp, EntityKind, HeartbeatMessage, RobotState};
use crate::state::EntityStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Heartbeat reflecting the robot's tracked state.
///
/// Untracked robots and unknown state strings report `idle`.
pub fn current_heartbeat(store: &EntityStore, robot_id: &str) -> HeartbeatMessage {
    let robot = store.get(EntityKind::Robot, robot_id);

    let state = robot
        .as_ref()
        .and_then(|r| r.properties.get("state").cloned())
        .and_then(|v| serde_json::from_value::<RobotState>(v).ok())
        .unwrap_or(RobotState::Idle);

    let work_station = robot
        .as_ref()
        .and_then(|r| r.properties.get("location"))
        .and_then(Value::as_str)
        .map(str::to_string);

    HeartbeatMessage {
        robot_id: robot_id.to_string(),
        timestamp: robot_timestamp(),
        state,
        work_station,
    }
}

/// Periodically publish a heartbeat on `{robot_id}.hb`
///
/// Publish failures are logged and the loop keeps going.
pub async fn run_heartbeat(
    store: Arc<EntityStore>,
    publisher: Arc<dyn Publisher>,
    robot_id: String,
    interval_seconds: f64,
) {
    let mut ticker = interval(Duration::from_secs_f64(interval_seconds));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let heartbeat = current_heartbeat(&store, &robot_id);
        match publisher.publish_heartbeat(&heartbeat).await {
            Ok(()) => debug!(robot_id = %robot_id, state = ?heartbeat.state, "Heartbeat published"),
            Err(e) => warn!(error = %e, "Failed to publish heartbeat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mq::MemoryPublisher;
    use crate::protocol::EntityUpdate;

    #[test]
    fn test_untracked_robot_reports_idle() {
        let store = EntityStore::new();
        let hb = current_heartbeat(&store, "talos.001");
        assert_eq!(hb.state, RobotState::Idle);
        assert_eq!(hb.work_station, None);
    }

    #[test]
    fn test_heartbeat_reads_robot_state() {
        let store = EntityStore::new();
        store
            .apply_updates(&[EntityUpdate::robot(
                "talos.001",
                "ws1",
                RobotState::Working,
                "watch_column_machine_screen",
            )])
            .unwrap();

        let hb = current_heartbeat(&store, "talos.001");
        assert_eq!(hb.state, RobotState::Working);
        assert_eq!(hb.work_station.as_deref(), Some("ws1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_loop_publishes_on_interval() {
        let store = Arc::new(EntityStore::new());
        let publisher = Arc::new(MemoryPublisher::new());

        let handle = tokio::spawn(run_heartbeat(
            Arc::clone(&store),
            publisher.clone(),
            "talos.001".to_string(),
            2.0,
        ));

        // First tick fires immediately, then every 2s
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        handle.abort();

        assert_eq!(publisher.heartbeats().len(), 3);
    }
}
