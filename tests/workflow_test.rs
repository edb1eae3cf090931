// End-to-end tests for the command dispatcher against an in-memory publisher.
//
// Time is paused so the simulated delays and long-running tasks complete
// instantly while keeping their relative ordering.

use robot_sim::config::SimConfig;
use robot_sim::dispatcher::{Dispatcher, Disposition};
use robot_sim::mq::{MemoryPublisher, Published};
use robot_sim::protocol::{DeviceState, EntityKind, EntityUpdate, RobotCommand, TaskType, ToolState};
use robot_sim::state::EntityStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Sim {
    dispatcher: Dispatcher,
    store: Arc<EntityStore>,
    publisher: Arc<MemoryPublisher>,
}

fn sim() -> Sim {
    let mut config = SimConfig::default();
    config.scenario.seed = Some(42);

    let store = Arc::new(EntityStore::new());
    let publisher = Arc::new(MemoryPublisher::new());
    let dispatcher = Dispatcher::new(&config, Some(Arc::clone(&store)), publisher.clone());
    Sim {
        dispatcher,
        store,
        publisher,
    }
}

impl Sim {
    async fn send(&self, task_id: &str, task_type: TaskType, params: Value) -> Disposition {
        let payload = RobotCommand::new(task_id, task_type, params)
            .to_bytes()
            .unwrap();
        self.dispatcher.handle(&payload).await
    }

    /// Index of the result for `task_id` among all published messages
    fn result_position(&self, task_id: &str) -> Option<usize> {
        self.publisher
            .messages()
            .iter()
            .position(|m| matches!(m, Published::Result(r) if r.task_id == task_id))
    }

    fn state_of(&self, kind: EntityKind, id: &str) -> Option<String> {
        self.store
            .get(kind, id)
            .and_then(|e| e.state().map(str::to_string))
    }
}

fn evaporation_params(device_id: &str) -> Value {
    json!({
        "work_station": "ws2",
        "device_id": device_id,
        "device_type": "re-buchi-r180",
        "profiles": {
            "start": {"lower_height": 60.0, "rpm": 120, "target_temperature": 45.0, "target_pressure": 200.0},
            "updates": [{
                "lower_height": 60.0, "rpm": 120, "target_temperature": 45.0, "target_pressure": 200.0,
                "trigger": {"type": "time_from_start", "time_in_sec": 600}
            }]
        }
    })
}

// ── Store properties ──────────────────────────────────────────────────────────

#[test]
fn same_update_twice_is_idempotent() {
    let store = EntityStore::new();
    let update = EntityUpdate::tube_rack("rack_01", "ws1", ToolState::InUse, "mounted");

    store.apply_updates(&[update.clone()]).unwrap();
    let first = store.get(EntityKind::TubeRack, "rack_01").unwrap().properties;
    store.apply_updates(&[update]).unwrap();
    let second = store.get(EntityKind::TubeRack, "rack_01").unwrap().properties;

    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn untracked_entities_and_reset() {
    let sim = sim();
    assert!(!sim.store.has(EntityKind::Evaporator, "re1"));
    assert!(sim.store.get(EntityKind::Evaporator, "re1").is_none());

    sim.store
        .apply_updates(&[
            EntityUpdate::external_module("ws1", DeviceState::Using, ""),
            EntityUpdate::tube_rack("rack_01", "ws1", ToolState::InUse, "mounted"),
        ])
        .unwrap();
    assert_eq!(sim.store.len(), 2);

    let reset = sim
        .dispatcher
        .handle(br#"{"task_id": "r2", "task_type": "reset_state", "params": {}}"#)
        .await;

    assert_eq!(reset, Disposition::Replied(200));
    assert!(sim.store.is_empty());
}

// ── Task properties ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tube_rack_setup_on_empty_store() {
    let sim = sim();

    let disposition = sim
        .send("t1", TaskType::SetupTubeRack, json!({"work_station": "ws1"}))
        .await;

    assert_eq!(disposition, Disposition::Replied(200));
    let rack = sim.store.find_by_location(EntityKind::TubeRack, "ws1").unwrap();
    assert_eq!(rack.state(), Some("inuse"));
    assert_eq!(rack.description(), "mounted");
    assert_eq!(sim.publisher.results()[0].msg, "setup_tube_rack completed");
}

#[tokio::test(start_paused = true)]
async fn chromatography_runs_for_scaled_duration() {
    let sim = sim();
    let start = Instant::now();

    let disposition = sim
        .send(
            "cc",
            TaskType::StartChromatography,
            json!({"work_station": "ws1", "device_id": "cc1", "experiment_params": {"run_minutes": 30}}),
        )
        .await;
    assert_eq!(disposition, Disposition::Spawned);

    tokio::time::sleep(Duration::from_secs(179)).await;
    assert!(sim.result_position("cc").is_none());

    tokio::time::sleep(Duration::from_secs(3)).await;
    let position = sim.result_position("cc").expect("result published");
    assert!(start.elapsed() >= Duration::from_secs(180));

    let messages = sim.publisher.messages();
    let progress_logs = messages[..position]
        .iter()
        .filter(|m| matches!(m, Published::Log(l) if l.task_id == "cc" && l.msg == "CC in progress"))
        .count();
    assert!(progress_logs >= 3, "only {} progress logs", progress_logs);
    assert_eq!(sim.dispatcher.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn evaporation_ramps_to_target() {
    let sim = sim();

    let disposition = sim
        .send("evap", TaskType::StartEvaporation, evaporation_params("re1"))
        .await;
    assert_eq!(disposition, Disposition::Spawned);
    assert_eq!(sim.state_of(EntityKind::Evaporator, "re1").as_deref(), Some("using"));

    tokio::time::sleep(Duration::from_secs(120)).await;

    let readings: Vec<(f64, f64)> = sim
        .publisher
        .logs()
        .iter()
        .filter(|l| l.task_id == "evap" && l.msg == "evaporation ramp in progress")
        .filter_map(|l| match &l.updates[0] {
            EntityUpdate::Evaporator { properties, .. } => {
                Some((properties.current_temperature, properties.current_pressure))
            }
            _ => None,
        })
        .collect();

    // 60s run, ticks at 25%, 50% and 75%
    assert_eq!(readings.len(), 3);
    assert_eq!(readings[1], (35.0, 606.5));

    let evaporator = sim.store.get(EntityKind::Evaporator, "re1").unwrap();
    assert_eq!(evaporator.state(), Some("idle"));
    assert_eq!(evaporator.properties["rpm"], json!(0));
    assert_eq!(
        evaporator.properties["current_temperature"],
        evaporator.properties["target_temperature"]
    );
    assert_eq!(
        evaporator.properties["current_pressure"],
        evaporator.properties["target_pressure"]
    );
}

#[tokio::test(start_paused = true)]
async fn back_to_back_starts_are_exclusive() {
    let sim = sim();

    let first = sim
        .send("e1", TaskType::StartEvaporation, evaporation_params("re1"))
        .await;
    let second = sim
        .send("e2", TaskType::StartEvaporation, evaporation_params("re1"))
        .await;

    assert_eq!(first, Disposition::Spawned);
    assert_eq!(second, Disposition::Replied(2050));

    // Once the first run has finished the evaporator is free again
    tokio::time::sleep(Duration::from_secs(120)).await;
    let third = sim
        .send("e3", TaskType::StartEvaporation, evaporation_params("re1"))
        .await;
    assert_eq!(third, Disposition::Spawned);
}

// ── Full workflow ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn purification_workflow() {
    let sim = sim();

    assert_eq!(
        sim.send(
            "w1",
            TaskType::SetupCartridges,
            json!({"work_station": "ws1", "sample_cartridge_id": "sc_01"}),
        )
        .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send("w2", TaskType::SetupTubeRack, json!({"work_station": "ws1"}))
            .await,
        Disposition::Replied(200)
    );

    // Mounted cartridges block a second setup
    assert_eq!(
        sim.send(
            "w2b",
            TaskType::SetupCartridges,
            json!({"work_station": "ws1", "sample_cartridge_id": "sc_02"}),
        )
        .await,
        Disposition::Replied(2001)
    );

    let cc = json!({"work_station": "ws1", "device_id": "cc1", "experiment_params": {"run_minutes": 30}});
    assert_eq!(
        sim.send("w3", TaskType::StartChromatography, cc.clone()).await,
        Disposition::Spawned
    );
    assert_eq!(
        sim.send("w3b", TaskType::StartChromatography, cc.clone()).await,
        Disposition::Replied(2020)
    );

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(sim.result_position("w3").is_some());

    // A finished run still has to be terminated
    assert_eq!(
        sim.send("w4", TaskType::TerminateChromatography, cc).await,
        Disposition::Replied(200)
    );
    assert_eq!(sim.state_of(EntityKind::ChromatographyMachine, "cc1").as_deref(), Some("idle"));
    assert_eq!(sim.state_of(EntityKind::SampleCartridge, "sc_01").as_deref(), Some("used"));

    assert_eq!(
        sim.send(
            "w5",
            TaskType::CollectFractions,
            json!({"work_station": "ws1", "device_id": "cc1", "collect_config": [1, 1, 0, 1]}),
        )
        .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.state_of(EntityKind::LeftChute, "pcc_left_chute_001").as_deref(),
        Some("using")
    );

    assert_eq!(
        sim.send("w6", TaskType::StartEvaporation, evaporation_params("re1"))
            .await,
        Disposition::Spawned
    );
    tokio::time::sleep(Duration::from_secs(120)).await;

    // The consolidated flask was carried to the evaporator
    let flask = sim.store.get(EntityKind::RoundBottomFlask, "rbf_001").unwrap();
    assert_eq!(flask.location(), Some("ws2"));
    assert_eq!(flask.description(), "evaporation_complete");

    let results = sim.publisher.results();
    assert_eq!(results.len(), 8);
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 6);

    assert_eq!(
        sim.dispatcher
            .handle(br#"{"task_id": "w7", "task_type": "reset_state"}"#)
            .await,
        Disposition::Replied(200)
    );
    assert!(sim.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn returned_cartridges_allow_a_second_cycle() {
    let sim = sim();
    let cc = json!({"work_station": "ws1", "device_id": "cc1", "experiment_params": {"run_minutes": 30}});

    let setup = |sample: &str| json!({"work_station": "ws1", "sample_cartridge_id": sample});
    assert_eq!(
        sim.send("c1", TaskType::SetupCartridges, setup("sc_01")).await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send("c2", TaskType::SetupTubeRack, json!({"work_station": "ws1"}))
            .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send("c3", TaskType::StartChromatography, cc.clone()).await,
        Disposition::Spawned
    );
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(
        sim.send("c4", TaskType::TerminateChromatography, cc.clone()).await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send(
            "c5",
            TaskType::CollectFractions,
            json!({"work_station": "ws1", "device_id": "cc1", "collect_config": [1, 0, 1]}),
        )
        .await,
        Disposition::Replied(200)
    );

    // Spent cartridges are collapsed in place and still block a new setup
    assert_eq!(
        sim.send(
            "c6",
            TaskType::CollapseCartridges,
            json!({"work_station": "ws1", "sample_cartridge_id": "sc_01"}),
        )
        .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send("c7", TaskType::SetupCartridges, setup("sc_02")).await,
        Disposition::Replied(2001)
    );

    assert_eq!(
        sim.send("c8", TaskType::ReturnCcsBins, json!({"work_station": "ws1"}))
            .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send("c9", TaskType::ReturnCcsBins, json!({"work_station": "ws1"}))
            .await,
        Disposition::Replied(2070)
    );
    assert_eq!(
        sim.send("c10", TaskType::ReturnTubeRack, json!({"work_station": "ws1"}))
            .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send(
            "c11",
            TaskType::ReturnCartridges,
            json!({"work_station": "ws1", "sample_cartridge_id": "sc_01"}),
        )
        .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.state_of(EntityKind::ExternalModule, "ws1").as_deref(),
        Some("idle")
    );

    // Second cycle on the same module
    assert_eq!(
        sim.send("c12", TaskType::SetupCartridges, setup("sc_02")).await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.state_of(EntityKind::SampleCartridge, "sc_02").as_deref(),
        Some("inuse")
    );
    assert_eq!(
        sim.store
            .get(EntityKind::SampleCartridge, "sc_01")
            .unwrap()
            .location(),
        Some("waste_area_001")
    );

    assert_eq!(
        sim.send("c13", TaskType::SetupTubeRack, json!({"work_station": "ws1"}))
            .await,
        Disposition::Replied(200)
    );
    assert_eq!(
        sim.send("c14", TaskType::StartChromatography, cc).await,
        Disposition::Spawned
    );
}

#[tokio::test(start_paused = true)]
async fn stop_evaporation_needs_a_running_evaporator() {
    let sim = sim();
    let stop = json!({"work_station": "ws2", "device_id": "re1"});

    assert_eq!(
        sim.send("s1", TaskType::StopEvaporation, stop.clone()).await,
        Disposition::Replied(2060)
    );

    assert_eq!(
        sim.send("s2", TaskType::StartEvaporation, evaporation_params("re1"))
            .await,
        Disposition::Spawned
    );
    assert_eq!(
        sim.send("s3", TaskType::StopEvaporation, stop.clone()).await,
        Disposition::Replied(200)
    );
    assert_eq!(sim.state_of(EntityKind::Evaporator, "re1").as_deref(), Some("idle"));

    assert_eq!(
        sim.send("s4", TaskType::StopEvaporation, stop).await,
        Disposition::Replied(2061)
    );
}
