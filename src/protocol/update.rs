use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::params::CcExperimentParams;

/// Category of a tracked physical entity.
///
/// Entities are keyed by `(EntityKind, id)` in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "robot")]
    Robot,
    #[serde(rename = "silica_cartridge")]
    SilicaCartridge,
    #[serde(rename = "sample_cartridge")]
    SampleCartridge,
    #[serde(rename = "tube_rack")]
    TubeRack,
    #[serde(rename = "round_bottom_flask")]
    RoundBottomFlask,
    #[serde(rename = "ccs_ext_module")]
    ExternalModule,
    #[serde(rename = "column_chromatography_machine")]
    ChromatographyMachine,
    #[serde(rename = "evaporator")]
    Evaporator,
    #[serde(rename = "pcc_left_chute")]
    LeftChute,
    #[serde(rename = "pcc_right_chute")]
    RightChute,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Robot,
        EntityKind::SilicaCartridge,
        EntityKind::SampleCartridge,
        EntityKind::TubeRack,
        EntityKind::RoundBottomFlask,
        EntityKind::ExternalModule,
        EntityKind::ChromatographyMachine,
        EntityKind::Evaporator,
        EntityKind::LeftChute,
        EntityKind::RightChute,
    ];

    /// Wire tag used in the `type` field of entity updates
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Robot => "robot",
            EntityKind::SilicaCartridge => "silica_cartridge",
            EntityKind::SampleCartridge => "sample_cartridge",
            EntityKind::TubeRack => "tube_rack",
            EntityKind::RoundBottomFlask => "round_bottom_flask",
            EntityKind::ExternalModule => "ccs_ext_module",
            EntityKind::ChromatographyMachine => "column_chromatography_machine",
            EntityKind::Evaporator => "evaporator",
            EntityKind::LeftChute => "pcc_left_chute",
            EntityKind::RightChute => "pcc_right_chute",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- State vocabularies ---

/// Robot operational state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotState {
    Idle,
    Working,
    Charging,
}

/// Exclusive-use device state (external module, CC machine, evaporator, chutes)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Idle,
    Using,
    Unavailable,
}

/// One-way consumable state (cartridges): unused -> inuse -> used
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumableState {
    Unused,
    InUse,
    Used,
}

/// Tool state (tube rack)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Available,
    InUse,
    Contaminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerContentState {
    Empty,
    Fill,
    Used,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LidState {
    Closed,
    Opened,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstanceUnit {
    Ml,
    L,
    G,
    Kg,
    Mg,
}

/// Robot posture strings carried in the robot `description` while working.
pub mod posture {
    pub const WATCH_CC_SCREEN: &str = "watch_column_machine_screen";
    pub const OBSERVE_EVAPORATION: &str = "observe_evaporation";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Substance {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zh_name: String,
    pub unit: SubstanceUnit,
    pub amount: f64,
}

/// State of a container (flask, waste bin)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub content_state: ContainerContentState,
    pub has_lid: bool,
    pub lid_state: Option<LidState>,
    pub substance: Option<Substance>,
}

impl ContainerState {
    /// Container holding an unmeasured liquid
    pub fn filled() -> Self {
        Self {
            content_state: ContainerContentState::Fill,
            has_lid: false,
            lid_state: None,
            substance: Some(Substance {
                name: String::new(),
                zh_name: String::new(),
                unit: SubstanceUnit::Ml,
                amount: 0.0,
            }),
        }
    }
}

impl Default for ContainerState {
    /// Empty container without lid (an open waste bin)
    fn default() -> Self {
        Self {
            content_state: ContainerContentState::Empty,
            has_lid: false,
            lid_state: None,
            substance: None,
        }
    }
}

// --- Per-category properties ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotProperties {
    pub location: String,
    pub state: RobotState,
    #[serde(default)]
    pub description: String,
}

/// Silica and sample cartridges share this shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartridgeProperties {
    pub location: String,
    pub state: ConsumableState,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TubeRackProperties {
    pub location: String,
    pub state: ToolState,
    /// Free-text narrative, e.g. "pulled_out, ready_for_recovery"
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundBottomFlaskProperties {
    pub location: String,
    pub state: ContainerState,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalModuleProperties {
    pub state: DeviceState,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CcMachineProperties {
    pub state: DeviceState,
    #[serde(default)]
    pub experiment_params: Option<CcExperimentParams>,
    /// Robot timestamp captured when the run started
    #[serde(default)]
    pub start_timestamp: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaporatorProperties {
    pub state: DeviceState,
    #[serde(default)]
    pub description: String,
    pub lower_height: f64,
    pub rpm: u32,
    pub target_temperature: f64,
    pub current_temperature: f64,
    pub target_pressure: f64,
    pub current_pressure: f64,
}

/// Post-column-chromatography chute (left and right share this shape)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChuteProperties {
    pub state: DeviceState,
    #[serde(default)]
    pub description: String,
    pub pulled_out_mm: f64,
    pub pulled_out_rate: f64,
    pub closed: bool,
    #[serde(default)]
    pub front_waste_bin: Option<ContainerState>,
    #[serde(default)]
    pub back_waste_bin: Option<ContainerState>,
}

/// Entity update carried in results and log messages.
///
/// Serialized as `{"type": <category>, "id": ..., "properties": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityUpdate {
    #[serde(rename = "robot")]
    Robot { id: String, properties: RobotProperties },
    #[serde(rename = "silica_cartridge")]
    SilicaCartridge {
        id: String,
        properties: CartridgeProperties,
    },
    #[serde(rename = "sample_cartridge")]
    SampleCartridge {
        id: String,
        properties: CartridgeProperties,
    },
    #[serde(rename = "tube_rack")]
    TubeRack {
        id: String,
        properties: TubeRackProperties,
    },
    #[serde(rename = "round_bottom_flask")]
    RoundBottomFlask {
        id: String,
        properties: RoundBottomFlaskProperties,
    },
    #[serde(rename = "ccs_ext_module")]
    ExternalModule {
        id: String,
        properties: ExternalModuleProperties,
    },
    #[serde(
        rename = "column_chromatography_machine",
        alias = "isco_combiflash_nextgen_300"
    )]
    ChromatographyMachine {
        id: String,
        properties: CcMachineProperties,
    },
    #[serde(rename = "evaporator")]
    Evaporator {
        id: String,
        properties: EvaporatorProperties,
    },
    #[serde(rename = "pcc_left_chute")]
    LeftChute { id: String, properties: ChuteProperties },
    #[serde(rename = "pcc_right_chute")]
    RightChute { id: String, properties: ChuteProperties },
}

impl EntityUpdate {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityUpdate::Robot { .. } => EntityKind::Robot,
            EntityUpdate::SilicaCartridge { .. } => EntityKind::SilicaCartridge,
            EntityUpdate::SampleCartridge { .. } => EntityKind::SampleCartridge,
            EntityUpdate::TubeRack { .. } => EntityKind::TubeRack,
            EntityUpdate::RoundBottomFlask { .. } => EntityKind::RoundBottomFlask,
            EntityUpdate::ExternalModule { .. } => EntityKind::ExternalModule,
            EntityUpdate::ChromatographyMachine { .. } => EntityKind::ChromatographyMachine,
            EntityUpdate::Evaporator { .. } => EntityKind::Evaporator,
            EntityUpdate::LeftChute { .. } => EntityKind::LeftChute,
            EntityUpdate::RightChute { .. } => EntityKind::RightChute,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityUpdate::Robot { id, .. }
            | EntityUpdate::SilicaCartridge { id, .. }
            | EntityUpdate::SampleCartridge { id, .. }
            | EntityUpdate::TubeRack { id, .. }
            | EntityUpdate::RoundBottomFlask { id, .. }
            | EntityUpdate::ExternalModule { id, .. }
            | EntityUpdate::ChromatographyMachine { id, .. }
            | EntityUpdate::Evaporator { id, .. }
            | EntityUpdate::LeftChute { id, .. }
            | EntityUpdate::RightChute { id, .. } => id,
        }
    }

    /// Properties as an open JSON map, the shape kept by the entity store
    pub fn properties_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match self {
            EntityUpdate::Robot { properties, .. } => to_map(properties),
            EntityUpdate::SilicaCartridge { properties, .. }
            | EntityUpdate::SampleCartridge { properties, .. } => to_map(properties),
            EntityUpdate::TubeRack { properties, .. } => to_map(properties),
            EntityUpdate::RoundBottomFlask { properties, .. } => to_map(properties),
            EntityUpdate::ExternalModule { properties, .. } => to_map(properties),
            EntityUpdate::ChromatographyMachine { properties, .. } => to_map(properties),
            EntityUpdate::Evaporator { properties, .. } => to_map(properties),
            EntityUpdate::LeftChute { properties, .. }
            | EntityUpdate::RightChute { properties, .. } => to_map(properties),
        }
    }

    /// Rebuild a typed update from a stored property map.
    ///
    /// Fails if the stored map does not match the category's shape.
    pub fn from_stored(
        kind: EntityKind,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        let id = id.to_string();
        Ok(match kind {
            EntityKind::Robot => EntityUpdate::Robot {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::SilicaCartridge => EntityUpdate::SilicaCartridge {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::SampleCartridge => EntityUpdate::SampleCartridge {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::TubeRack => EntityUpdate::TubeRack {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::RoundBottomFlask => EntityUpdate::RoundBottomFlask {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::ExternalModule => EntityUpdate::ExternalModule {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::ChromatographyMachine => EntityUpdate::ChromatographyMachine {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::Evaporator => EntityUpdate::Evaporator {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::LeftChute => EntityUpdate::LeftChute {
                id,
                properties: from_map(properties)?,
            },
            EntityKind::RightChute => EntityUpdate::RightChute {
                id,
                properties: from_map(properties)?,
            },
        })
    }

    // --- Constructors ---

    pub fn robot(
        id: impl Into<String>,
        location: impl Into<String>,
        state: RobotState,
        description: impl Into<String>,
    ) -> Self {
        EntityUpdate::Robot {
            id: id.into(),
            properties: RobotProperties {
                location: location.into(),
                state,
                description: description.into(),
            },
        }
    }

    pub fn silica_cartridge(
        id: impl Into<String>,
        location: impl Into<String>,
        state: ConsumableState,
        description: impl Into<String>,
    ) -> Self {
        EntityUpdate::SilicaCartridge {
            id: id.into(),
            properties: CartridgeProperties {
                location: location.into(),
                state,
                description: description.into(),
            },
        }
    }

    pub fn sample_cartridge(
        id: impl Into<String>,
        location: impl Into<String>,
        state: ConsumableState,
        description: impl Into<String>,
    ) -> Self {
        EntityUpdate::SampleCartridge {
            id: id.into(),
            properties: CartridgeProperties {
                location: location.into(),
                state,
                description: description.into(),
            },
        }
    }

    pub fn tube_rack(
        id: impl Into<String>,
        location: impl Into<String>,
        state: ToolState,
        description: impl Into<String>,
    ) -> Self {
        EntityUpdate::TubeRack {
            id: id.into(),
            properties: TubeRackProperties {
                location: location.into(),
                state,
                description: description.into(),
            },
        }
    }

    pub fn round_bottom_flask(
        id: impl Into<String>,
        location: impl Into<String>,
        state: ContainerState,
        description: impl Into<String>,
    ) -> Self {
        EntityUpdate::RoundBottomFlask {
            id: id.into(),
            properties: RoundBottomFlaskProperties {
                location: location.into(),
                state,
                description: description.into(),
            },
        }
    }

    pub fn external_module(
        id: impl Into<String>,
        state: DeviceState,
        description: impl Into<String>,
    ) -> Self {
        EntityUpdate::ExternalModule {
            id: id.into(),
            properties: ExternalModuleProperties {
                state,
                description: description.into(),
            },
        }
    }

    pub fn chromatography_machine(id: impl Into<String>, properties: CcMachineProperties) -> Self {
        EntityUpdate::ChromatographyMachine {
            id: id.into(),
            properties,
        }
    }

    pub fn evaporator(id: impl Into<String>, properties: EvaporatorProperties) -> Self {
        EntityUpdate::Evaporator {
            id: id.into(),
            properties,
        }
    }

    pub fn left_chute(id: impl Into<String>, properties: ChuteProperties) -> Self {
        EntityUpdate::LeftChute {
            id: id.into(),
            properties,
        }
    }

    pub fn right_chute(id: impl Into<String>, properties: ChuteProperties) -> Self {
        EntityUpdate::RightChute {
            id: id.into(),
            properties,
        }
    }
}

fn to_map<T: Serialize>(properties: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(properties)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "entity properties must serialize to an object, got {}",
            other
        ))),
    }
}

fn from_map<T: DeserializeOwned>(properties: &Map<String, Value>) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(properties.clone()))
}
