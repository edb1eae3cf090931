use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

mod format;
mod params;
mod result;
mod update;
mod validation;
#[cfg(test)]
mod tests;

pub use format::{format_robot_timestamp, image_url, robot_timestamp};
pub use params::{
    CcExperimentParams, CcGradient, CollapseCartridgesParams, CollectFractionsParams, Components,
    EvaporationProfile, EvaporationProfiles, EvaporationTrigger, LegacyStopProfile,
    PeakGatheringMode, ReturnCartridgesParams, ReturnCcsBinsParams, ReturnTubeRackParams,
    SetupCartridgesParams, SetupCcsBinsParams, SetupTubeRackParams, StartCcParams,
    StartEvaporationParams, StopEvaporationParams, TakePhotoParams, TaskParams, TerminateCcParams,
    TriggerKind,
};
pub use result::{codes, CapturedImage, HeartbeatMessage, LogMessage, RobotResult};
pub use update::{
    posture, CartridgeProperties, CcMachineProperties, ChuteProperties, ConsumableState,
    ContainerContentState, ContainerState, DeviceState, EntityKind, EntityUpdate,
    EvaporatorProperties, ExternalModuleProperties, LidState, RobotProperties, RobotState,
    RoundBottomFlaskProperties, Substance, SubstanceUnit, ToolState, TubeRackProperties,
};
pub use validation::{decode_command, EnvelopeError, Inbound, RESET_STATE};

/// Task types the robot accepts on its command subject
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "setup_tubes_to_column_machine")]
    SetupCartridges,
    #[serde(rename = "setup_tube_rack")]
    SetupTubeRack,
    #[serde(rename = "take_photo")]
    TakePhoto,
    #[serde(rename = "start_column_chromatography")]
    StartChromatography,
    #[serde(rename = "terminate_column_chromatography")]
    TerminateChromatography,
    #[serde(rename = "collect_column_chromatography_fractions")]
    CollectFractions,
    #[serde(rename = "start_evaporation")]
    StartEvaporation,
    #[serde(rename = "collapse_cartridges")]
    CollapseCartridges,
    #[serde(rename = "stop_evaporation")]
    StopEvaporation,
    #[serde(rename = "setup_ccs_bins")]
    SetupCcsBins,
    #[serde(rename = "return_ccs_bins")]
    ReturnCcsBins,
    #[serde(rename = "return_cartridges")]
    ReturnCartridges,
    #[serde(rename = "return_tube_rack")]
    ReturnTubeRack,
}

impl TaskType {
    pub const ALL: [TaskType; 13] = [
        TaskType::SetupCartridges,
        TaskType::SetupTubeRack,
        TaskType::TakePhoto,
        TaskType::StartChromatography,
        TaskType::TerminateChromatography,
        TaskType::CollectFractions,
        TaskType::StartEvaporation,
        TaskType::CollapseCartridges,
        TaskType::StopEvaporation,
        TaskType::SetupCcsBins,
        TaskType::ReturnCcsBins,
        TaskType::ReturnCartridges,
        TaskType::ReturnTubeRack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::SetupCartridges => "setup_tubes_to_column_machine",
            TaskType::SetupTubeRack => "setup_tube_rack",
            TaskType::TakePhoto => "take_photo",
            TaskType::StartChromatography => "start_column_chromatography",
            TaskType::TerminateChromatography => "terminate_column_chromatography",
            TaskType::CollectFractions => "collect_column_chromatography_fractions",
            TaskType::StartEvaporation => "start_evaporation",
            TaskType::CollapseCartridges => "collapse_cartridges",
            TaskType::StopEvaporation => "stop_evaporation",
            TaskType::SetupCcsBins => "setup_ccs_bins",
            TaskType::ReturnCcsBins => "return_ccs_bins",
            TaskType::ReturnCartridges => "return_cartridges",
            TaskType::ReturnTubeRack => "return_tube_rack",
        }
    }

    /// Long-running tasks are detached from the consumer loop and report progress
    pub fn is_long_running(self) -> bool {
        match self {
            TaskType::StartChromatography | TaskType::StartEvaporation => true,
            TaskType::SetupCartridges
            | TaskType::SetupTubeRack
            | TaskType::TakePhoto
            | TaskType::TerminateChromatography
            | TaskType::CollectFractions
            | TaskType::CollapseCartridges
            | TaskType::StopEvaporation
            | TaskType::SetupCcsBins
            | TaskType::ReturnCcsBins
            | TaskType::ReturnCartridges
            | TaskType::ReturnTubeRack => false,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command received on `{robot_id}.cmd`.
///
/// `params` stays an open JSON object until the dispatcher parses it
/// against the schema selected by `task_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotCommand {
    pub task_id: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl RobotCommand {
    pub fn new(task_id: impl Into<String>, task_type: TaskType, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            task_id: task_id.into(),
            task_type,
            params,
        }
    }

    /// Serialize for publishing on the command subject
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
