use super::*;
use serde_json::json;

#[test]
fn test_entity_update_wire_shape() {
    let update = EntityUpdate::tube_rack("rack_01", "ws1", ToolState::InUse, "mounted");
    let value = serde_json::to_value(&update).unwrap();

    assert_eq!(
        value,
        json!({
            "type": "tube_rack",
            "id": "rack_01",
            "properties": {"location": "ws1", "state": "inuse", "description": "mounted"}
        })
    );
}

#[test]
fn test_machine_alias_accepted() {
    let update: EntityUpdate = serde_json::from_value(json!({
        "type": "isco_combiflash_nextgen_300",
        "id": "cc1",
        "properties": {"state": "using"}
    }))
    .unwrap();

    assert_eq!(update.kind(), EntityKind::ChromatographyMachine);
    assert_eq!(update.id(), "cc1");

    // Always re-serialized under the canonical tag
    let value = serde_json::to_value(&update).unwrap();
    assert_eq!(value["type"], "column_chromatography_machine");
}

#[test]
fn test_properties_map_and_back() {
    let update = EntityUpdate::external_module("ws1", DeviceState::Using, "");
    let map = update.properties_map().unwrap();
    assert_eq!(map.get("state"), Some(&json!("using")));

    let rebuilt = EntityUpdate::from_stored(EntityKind::ExternalModule, "ws1", &map).unwrap();
    assert_eq!(rebuilt, update);
}

#[test]
fn test_from_stored_rejects_wrong_shape() {
    let map = json!({"state": "flying"}).as_object().cloned().unwrap();
    assert!(EntityUpdate::from_stored(EntityKind::Robot, "r1", &map).is_err());
}

#[test]
fn test_task_type_wire_names() {
    for task_type in TaskType::ALL {
        let value = serde_json::to_value(task_type).unwrap();
        assert_eq!(value, json!(task_type.as_str()));
    }
    assert!(TaskType::StartChromatography.is_long_running());
    assert!(TaskType::StartEvaporation.is_long_running());
    assert!(!TaskType::TerminateChromatography.is_long_running());
    assert!(!TaskType::StopEvaporation.is_long_running());
}

#[test]
fn test_cleanup_tasks_accept_empty_params() {
    for task_type in [
        TaskType::CollapseCartridges,
        TaskType::StopEvaporation,
        TaskType::SetupCcsBins,
        TaskType::ReturnCcsBins,
        TaskType::ReturnCartridges,
        TaskType::ReturnTubeRack,
    ] {
        let params = TaskParams::parse(task_type, Default::default()).unwrap();
        assert_eq!(params.task_type(), task_type);
    }

    let raw = json!({"work_station": "ws1", "silica_cartridge_id": "si_01"});
    match TaskParams::parse(TaskType::ReturnCartridges, raw.as_object().cloned().unwrap()).unwrap() {
        TaskParams::ReturnCartridges(p) => {
            assert_eq!(p.silica_cartridge_id.as_deref(), Some("si_01"));
            assert_eq!(p.sample_cartridge_id, None);
            assert_eq!(p.waste_area_id, "waste_area_001");
        }
        other => panic!("unexpected params {:?}", other),
    }
}

#[test]
fn test_parse_setup_cartridges_applies_defaults() {
    let raw = json!({"sample_cartridge_id": "sc_07"});
    let params = TaskParams::parse(
        TaskType::SetupCartridges,
        raw.as_object().cloned().unwrap(),
    )
    .unwrap();

    match params {
        TaskParams::SetupCartridges(p) => {
            assert_eq!(p.sample_cartridge_id, "sc_07");
            assert_eq!(p.work_station, "ws_bic_09_fh_001");
            assert_eq!(p.silica_cartridge_type, "silica_40g");
        }
        other => panic!("unexpected params {:?}", other),
    }
}

#[test]
fn test_parse_setup_cartridges_requires_sample_id() {
    let err = TaskParams::parse(TaskType::SetupCartridges, Default::default());
    assert!(err.is_err());
}

#[test]
fn test_parse_photo_single_component() {
    let raw = json!({
        "work_station": "ws1",
        "device_id": "cc1",
        "device_type": "combiflash",
        "components": "screen"
    });
    let params = TaskParams::parse(TaskType::TakePhoto, raw.as_object().cloned().unwrap()).unwrap();

    match params {
        TaskParams::TakePhoto(p) => assert_eq!(p.components.to_vec(), vec!["screen"]),
        other => panic!("unexpected params {:?}", other),
    }
}

#[test]
fn test_parse_evaporation_with_legacy_stop() {
    let raw = json!({
        "profiles": {
            "start": {"lower_height": 60.0, "rpm": 120, "target_temperature": 45.0, "target_pressure": 200.0},
            "stop": {"trigger": {"type": "time_from_start", "time_in_sec": 600}}
        }
    });
    let params =
        TaskParams::parse(TaskType::StartEvaporation, raw.as_object().cloned().unwrap()).unwrap();

    assert_eq!(params.task_type(), TaskType::StartEvaporation);
    assert_eq!(params.work_station(), "ws_bic_09_fh_002");
    match params {
        TaskParams::StartEvaporation(p) => {
            let trigger = p.profiles.stop.and_then(|s| s.trigger).unwrap();
            assert_eq!(trigger.kind, TriggerKind::TimeFromStart);
            assert_eq!(trigger.time_in_sec, Some(600));
            assert!(p.profiles.updates.is_empty());
        }
        other => panic!("unexpected params {:?}", other),
    }
}

#[test]
fn test_collect_config_counts_collected_tubes() {
    let raw = json!({"collect_config": [1, 0, 1, 1, 0]});
    let params =
        TaskParams::parse(TaskType::CollectFractions, raw.as_object().cloned().unwrap()).unwrap();

    match params {
        TaskParams::CollectFractions(p) => assert_eq!(p.collected_tube_count(), 3),
        other => panic!("unexpected params {:?}", other),
    }
}

#[test]
fn test_result_omits_images_when_absent() {
    let result = RobotResult::error("t1", codes::INVALID_PARAMS, "bad");
    let value = serde_json::to_value(&result).unwrap();

    assert!(value.get("images").is_none());
    assert_eq!(value["updates"], json!([]));
    assert!(!result.is_success());
}

#[test]
fn test_heartbeat_work_station_field_name() {
    let hb = HeartbeatMessage {
        robot_id: "talos.001".to_string(),
        timestamp: "2025-01-15_10-30-45.123".to_string(),
        state: RobotState::Idle,
        work_station: Some("ws1".to_string()),
    };
    let value = serde_json::to_value(&hb).unwrap();
    assert_eq!(value["Work_station"], "ws1");
    assert_eq!(value["state"], "idle");
}

#[test]
fn test_command_to_bytes_decodes_back() {
    let cmd = RobotCommand::new("t9", TaskType::SetupTubeRack, json!({"work_station": "ws1"}));
    let bytes = cmd.to_bytes().unwrap();

    assert_eq!(decode_command(&bytes).unwrap(), Inbound::Command(cmd));
}
