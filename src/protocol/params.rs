use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::TaskType;

// Lab defaults for the single CC and evaporation stations
fn cc_work_station() -> String {
    "ws_bic_09_fh_001".to_string()
}

fn re_work_station() -> String {
    "ws_bic_09_fh_002".to_string()
}

fn cc_device_id() -> String {
    "cc-isco-300p_001".to_string()
}

fn cc_device_type() -> String {
    "cc-isco-300p".to_string()
}

fn re_device_id() -> String {
    "re-buchi-r180_001".to_string()
}

fn re_device_type() -> String {
    "re-buchi-r180".to_string()
}

fn silica_cartridge_type() -> String {
    "silica_40g".to_string()
}

fn sample_cartridge_location() -> String {
    "bic_09B_l3_002".to_string()
}

fn sample_cartridge_type() -> String {
    "sample_40g".to_string()
}

fn waste_area_id() -> String {
    "waste_area_001".to_string()
}

/// Mount silica + sample cartridges onto the CC external module
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupCartridgesParams {
    #[serde(default = "silica_cartridge_type")]
    pub silica_cartridge_type: String,
    #[serde(default = "sample_cartridge_location")]
    pub sample_cartridge_location: String,
    #[serde(default = "sample_cartridge_type")]
    pub sample_cartridge_type: String,
    pub sample_cartridge_id: String,
    #[serde(default = "cc_work_station")]
    pub work_station: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupTubeRackParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
}

/// A single component or a list of components to photograph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Components {
    One(String),
    Many(Vec<String>),
}

impl Components {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Components::One(c) => vec![c.clone()],
            Components::Many(cs) => cs.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TakePhotoParams {
    pub work_station: String,
    pub device_id: String,
    pub device_type: String,
    pub components: Components,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakGatheringMode {
    All,
    Peak,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CcGradient {
    pub duration_minutes: f64,
    /// Percentage of solvent B, 0-100
    pub solvent_b_ratio: f64,
}

/// Column chromatography run configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcExperimentParams {
    pub silicone_cartridge: String,
    pub peak_gathering_mode: PeakGatheringMode,
    pub air_purge_minutes: f64,
    pub run_minutes: u32,
    pub solvent_a: String,
    pub solvent_b: String,
    pub gradients: Vec<CcGradient>,
    pub need_equilibration: bool,
    pub left_rack: Option<String>,
    pub right_rack: Option<String>,
}

impl Default for CcExperimentParams {
    fn default() -> Self {
        Self {
            silicone_cartridge: "silica_40g".to_string(),
            peak_gathering_mode: PeakGatheringMode::Peak,
            air_purge_minutes: 1.2,
            run_minutes: 30,
            solvent_a: "pet_ether".to_string(),
            solvent_b: "ethyl_acetate".to_string(),
            gradients: Vec::new(),
            need_equilibration: true,
            left_rack: Some("16x150".to_string()),
            right_rack: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartCcParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default = "cc_device_id")]
    pub device_id: String,
    #[serde(default = "cc_device_type")]
    pub device_type: String,
    pub experiment_params: CcExperimentParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerminateCcParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default = "cc_device_id")]
    pub device_id: String,
    #[serde(default = "cc_device_type")]
    pub device_type: String,
    pub experiment_params: CcExperimentParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectFractionsParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default = "cc_device_id")]
    pub device_id: String,
    #[serde(default = "cc_device_type")]
    pub device_type: String,
    /// Per tube: 1 = collect into the flask, 0 = discard
    pub collect_config: Vec<u8>,
}

impl CollectFractionsParams {
    pub fn collected_tube_count(&self) -> usize {
        self.collect_config.iter().filter(|&&flag| flag == 1).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    TimeFromStart,
    Event,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaporationTrigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub time_in_sec: Option<u64>,
    #[serde(default)]
    pub event_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaporationProfile {
    /// Flask lowering height in mm
    pub lower_height: f64,
    pub rpm: u32,
    /// Water bath temperature in Celsius
    pub target_temperature: f64,
    /// Vacuum pressure in mbar
    pub target_pressure: f64,
    #[serde(default)]
    pub trigger: Option<EvaporationTrigger>,
}

/// Older payloads carried only a stop trigger
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyStopProfile {
    #[serde(default)]
    pub trigger: Option<EvaporationTrigger>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaporationProfiles {
    pub start: EvaporationProfile,
    #[serde(default)]
    pub updates: Vec<EvaporationProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<LegacyStopProfile>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartEvaporationParams {
    #[serde(default = "re_work_station")]
    pub work_station: String,
    #[serde(default = "re_device_id")]
    pub device_id: String,
    #[serde(default = "re_device_type")]
    pub device_type: String,
    pub profiles: EvaporationProfiles,
}

/// Collapse the spent cartridges still mounted on the external module.
///
/// Cartridge ids default to whatever is tracked at the work station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollapseCartridgesParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default)]
    pub silica_cartridge_id: Option<String>,
    #[serde(default)]
    pub sample_cartridge_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopEvaporationParams {
    #[serde(default = "re_work_station")]
    pub work_station: String,
    #[serde(default = "re_device_id")]
    pub device_id: String,
    #[serde(default = "re_device_type")]
    pub device_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupCcsBinsParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    /// Storage slots the empty bins are fetched from
    #[serde(default)]
    pub bin_location_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnCcsBinsParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default = "waste_area_id")]
    pub waste_area_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnCartridgesParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default)]
    pub silica_cartridge_id: Option<String>,
    #[serde(default)]
    pub sample_cartridge_id: Option<String>,
    #[serde(default = "waste_area_id")]
    pub waste_area_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnTubeRackParams {
    #[serde(default = "cc_work_station")]
    pub work_station: String,
    #[serde(default)]
    pub tube_rack_id: Option<String>,
    #[serde(default = "waste_area_id")]
    pub waste_area_id: String,
}

/// Validated, task-specific command parameters
#[derive(Clone, Debug, PartialEq)]
pub enum TaskParams {
    SetupCartridges(SetupCartridgesParams),
    SetupTubeRack(SetupTubeRackParams),
    TakePhoto(TakePhotoParams),
    StartChromatography(StartCcParams),
    TerminateChromatography(TerminateCcParams),
    CollectFractions(CollectFractionsParams),
    StartEvaporation(StartEvaporationParams),
    CollapseCartridges(CollapseCartridgesParams),
    StopEvaporation(StopEvaporationParams),
    SetupCcsBins(SetupCcsBinsParams),
    ReturnCcsBins(ReturnCcsBinsParams),
    ReturnCartridges(ReturnCartridgesParams),
    ReturnTubeRack(ReturnTubeRackParams),
}

impl TaskParams {
    /// Validate raw params against the schema for `task_type`
    pub fn parse(task_type: TaskType, raw: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(raw);
        Ok(match task_type {
            TaskType::SetupCartridges => TaskParams::SetupCartridges(serde_json::from_value(value)?),
            TaskType::SetupTubeRack => TaskParams::SetupTubeRack(serde_json::from_value(value)?),
            TaskType::TakePhoto => TaskParams::TakePhoto(serde_json::from_value(value)?),
            TaskType::StartChromatography => {
                TaskParams::StartChromatography(serde_json::from_value(value)?)
            }
            TaskType::TerminateChromatography => {
                TaskParams::TerminateChromatography(serde_json::from_value(value)?)
            }
            TaskType::CollectFractions => {
                TaskParams::CollectFractions(serde_json::from_value(value)?)
            }
            TaskType::StartEvaporation => {
                TaskParams::StartEvaporation(serde_json::from_value(value)?)
            }
            TaskType::CollapseCartridges => {
                TaskParams::CollapseCartridges(serde_json::from_value(value)?)
            }
            TaskType::StopEvaporation => TaskParams::StopEvaporation(serde_json::from_value(value)?),
            TaskType::SetupCcsBins => TaskParams::SetupCcsBins(serde_json::from_value(value)?),
            TaskType::ReturnCcsBins => TaskParams::ReturnCcsBins(serde_json::from_value(value)?),
            TaskType::ReturnCartridges => {
                TaskParams::ReturnCartridges(serde_json::from_value(value)?)
            }
            TaskType::ReturnTubeRack => TaskParams::ReturnTubeRack(serde_json::from_value(value)?),
        })
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            TaskParams::SetupCartridges(_) => TaskType::SetupCartridges,
            TaskParams::SetupTubeRack(_) => TaskType::SetupTubeRack,
            TaskParams::TakePhoto(_) => TaskType::TakePhoto,
            TaskParams::StartChromatography(_) => TaskType::StartChromatography,
            TaskParams::TerminateChromatography(_) => TaskType::TerminateChromatography,
            TaskParams::CollectFractions(_) => TaskType::CollectFractions,
            TaskParams::StartEvaporation(_) => TaskType::StartEvaporation,
            TaskParams::CollapseCartridges(_) => TaskType::CollapseCartridges,
            TaskParams::StopEvaporation(_) => TaskType::StopEvaporation,
            TaskParams::SetupCcsBins(_) => TaskType::SetupCcsBins,
            TaskParams::ReturnCcsBins(_) => TaskType::ReturnCcsBins,
            TaskParams::ReturnCartridges(_) => TaskType::ReturnCartridges,
            TaskParams::ReturnTubeRack(_) => TaskType::ReturnTubeRack,
        }
    }

    pub fn work_station(&self) -> &str {
        match self {
            TaskParams::SetupCartridges(p) => &p.work_station,
            TaskParams::SetupTubeRack(p) => &p.work_station,
            TaskParams::TakePhoto(p) => &p.work_station,
            TaskParams::StartChromatography(p) => &p.work_station,
            TaskParams::TerminateChromatography(p) => &p.work_station,
            TaskParams::CollectFractions(p) => &p.work_station,
            TaskParams::StartEvaporation(p) => &p.work_station,
            TaskParams::CollapseCartridges(p) => &p.work_station,
            TaskParams::StopEvaporation(p) => &p.work_station,
            TaskParams::SetupCcsBins(p) => &p.work_station,
            TaskParams::ReturnCcsBins(p) => &p.work_station,
            TaskParams::ReturnCartridges(p) => &p.work_station,
            TaskParams::ReturnTubeRack(p) => &p.work_station,
        }
    }
}
