// Precondition checks against the current world state

use crate::protocol::{
    CollapseCartridgesParams, CollectFractionsParams, EntityKind, ReturnCartridgesParams,
    ReturnTubeRackParams, SetupCartridgesParams, StartCcParams, StartEvaporationParams,
    StopEvaporationParams, TaskParams, TerminateCcParams,
};
use crate::state::{Entity, EntityStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;


/// Precondition error codes (2000-2099)
pub mod codes {
    pub const EXT_MODULE_BUSY: i32 = 2001;
    pub const SILICA_CARTRIDGE_NOT_FOUND: i32 = 2010;
    pub const SILICA_CARTRIDGE_NOT_USED: i32 = 2011;
    pub const SAMPLE_CARTRIDGE_NOT_FOUND: i32 = 2012;
    pub const SAMPLE_CARTRIDGE_NOT_USED: i32 = 2013;
    pub const CC_ALREADY_RUNNING: i32 = 2020;
    pub const CC_NOT_FOUND: i32 = 2030;
    pub const CC_NOT_RUNNING: i32 = 2031;
    pub const TUBE_RACK_NOT_FOUND: i32 = 2040;
    pub const TUBE_RACK_NOT_USED: i32 = 2041;
    pub const EVAPORATOR_RUNNING: i32 = 2050;
    pub const EVAPORATOR_NOT_FOUND: i32 = 2060;
    pub const EVAPORATOR_NOT_RUNNING: i32 = 2061;
    pub const NO_BINS_IN_CHUTES: i32 = 2070;
    pub const RETURN_SILICA_NOT_FOUND: i32 = 2080;
    pub const RETURN_SAMPLE_NOT_FOUND: i32 = 2081;
    pub const RETURN_TUBE_RACK_NOT_FOUND: i32 = 2090;
}

/// Outcome of a precondition check
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PreconditionOutcome {
    pub ok: bool,
    pub error_code: i32,
    pub error_msg: String,
}

impl PreconditionOutcome {
    pub fn pass() -> Self {
        Self {
            ok: true,
            error_code: 0,
            error_msg: String::new(),
        }
    }

    pub fn fail(error_code: i32, error_msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_code,
            error_msg: error_msg.into(),
        }
    }
}

// Legacy vocabularies used "mounted" and "running" for the busy states
const EXT_MODULE_BUSY_STATES: &[&str] = &["using", "mounted"];
const DEVICE_BUSY_STATES: &[&str] = &["using", "running"];
const TUBE_RACK_USED_MARKERS: &[&str] = &["used", "using", "inuse", "contaminated"];

/// Validates task preconditions against the entity store.
///
/// Only re-entrant misuse is blocked: targets the store does not know
/// about pass.
pub struct PreconditionChecker {
    store: Arc<EntityStore>,
}

impl PreconditionChecker {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    pub fn check(&self, params: &TaskParams) -> PreconditionOutcome {
        let outcome = match params {
            TaskParams::SetupCartridges(p) => self.check_setup_cartridges(p),
            TaskParams::StartChromatography(p) => self.check_start_cc(p),
            TaskParams::TerminateChromatography(p) => self.check_terminate_cc(p),
            TaskParams::CollectFractions(p) => self.check_fraction_consolidation(p),
            TaskParams::StartEvaporation(p) => self.check_start_evaporation(p),
            TaskParams::CollapseCartridges(p) => self.check_collapse_cartridges(p),
            TaskParams::StopEvaporation(p) => self.check_stop_evaporation(p),
            TaskParams::ReturnCcsBins(_) => self.check_return_ccs_bins(params.work_station()),
            TaskParams::ReturnCartridges(p) => self.check_return_cartridges(p),
            TaskParams::ReturnTubeRack(p) => self.check_return_tube_rack(p),
            // No rule. A tube rack can be set up over a mounted one
            TaskParams::SetupTubeRack(_) | TaskParams::TakePhoto(_) | TaskParams::SetupCcsBins(_) => {
                PreconditionOutcome::pass()
            }
        };

        if !outcome.ok {
            warn!(
                task_type = %params.task_type(),
                code = outcome.error_code,
                reason = %outcome.error_msg,
                "Precondition failed"
            );
        }

        outcome
    }

    fn check_setup_cartridges(&self, params: &SetupCartridgesParams) -> PreconditionOutcome {
        let ws = &params.work_station;
        match self.store.get(EntityKind::ExternalModule, ws) {
            Some(module) if state_in(&module, EXT_MODULE_BUSY_STATES) => PreconditionOutcome::fail(
                codes::EXT_MODULE_BUSY,
                format!(
                    "External module {} already has cartridges (state: {})",
                    ws,
                    module.state().unwrap_or("")
                ),
            ),
            _ => PreconditionOutcome::pass(),
        }
    }

    fn check_start_cc(&self, params: &StartCcParams) -> PreconditionOutcome {
        let device_id = &params.device_id;
        match self.store.get(EntityKind::ChromatographyMachine, device_id) {
            Some(machine) if state_in(&machine, DEVICE_BUSY_STATES) => PreconditionOutcome::fail(
                codes::CC_ALREADY_RUNNING,
                format!("Column chromatography machine {} is already running", device_id),
            ),
            _ => PreconditionOutcome::pass(),
        }
    }

    fn check_terminate_cc(&self, params: &TerminateCcParams) -> PreconditionOutcome {
        let device_id = &params.device_id;
        let machine = match self.store.get(EntityKind::ChromatographyMachine, device_id) {
            Some(machine) => machine,
            None => {
                return PreconditionOutcome::fail(
                    codes::CC_NOT_FOUND,
                    format!(
                        "Column chromatography machine {} not found in world state",
                        device_id
                    ),
                )
            }
        };

        if state_in(&machine, DEVICE_BUSY_STATES) {
            PreconditionOutcome::pass()
        } else {
            PreconditionOutcome::fail(
                codes::CC_NOT_RUNNING,
                format!(
                    "Column chromatography machine {} is not running (current state: {})",
                    device_id,
                    machine.state().unwrap_or("")
                ),
            )
        }
    }

    fn check_fraction_consolidation(&self, params: &CollectFractionsParams) -> PreconditionOutcome {
        let ws = &params.work_station;

        // Racks are keyed by their own id, so fall back to a location scan
        let rack = self
            .store
            .get(EntityKind::TubeRack, ws)
            .or_else(|| self.store.find_by_location(EntityKind::TubeRack, ws));

        let rack = match rack {
            Some(rack) => rack,
            None => {
                return PreconditionOutcome::fail(
                    codes::TUBE_RACK_NOT_FOUND,
                    format!("Tube rack at work station {} not found in world state", ws),
                )
            }
        };

        let narrative = format!("{} {}", rack.state().unwrap_or(""), rack.description());
        if TUBE_RACK_USED_MARKERS.iter().any(|m| narrative.contains(m)) {
            PreconditionOutcome::pass()
        } else {
            PreconditionOutcome::fail(
                codes::TUBE_RACK_NOT_USED,
                format!(
                    "Tube rack at {} must be in use or used (current: {})",
                    ws,
                    narrative.trim()
                ),
            )
        }
    }

    fn check_start_evaporation(&self, params: &StartEvaporationParams) -> PreconditionOutcome {
        let device_id = &params.device_id;
        match self.store.get(EntityKind::Evaporator, device_id) {
            Some(evaporator) if evaporator_running(&evaporator) => PreconditionOutcome::fail(
                codes::EVAPORATOR_RUNNING,
                format!("Evaporator {} is already running", device_id),
            ),
            _ => PreconditionOutcome::pass(),
        }
    }

    fn check_collapse_cartridges(&self, params: &CollapseCartridgesParams) -> PreconditionOutcome {
        if let Some(id) = &params.silica_cartridge_id {
            let outcome = self.require_used(
                EntityKind::SilicaCartridge,
                id,
                "Silica cartridge",
                codes::SILICA_CARTRIDGE_NOT_FOUND,
                codes::SILICA_CARTRIDGE_NOT_USED,
            );
            if !outcome.ok {
                return outcome;
            }
        }

        match &params.sample_cartridge_id {
            Some(id) => self.require_used(
                EntityKind::SampleCartridge,
                id,
                "Sample cartridge",
                codes::SAMPLE_CARTRIDGE_NOT_FOUND,
                codes::SAMPLE_CARTRIDGE_NOT_USED,
            ),
            None => PreconditionOutcome::pass(),
        }
    }

    /// Tracked and in the `used` state
    fn require_used(
        &self,
        kind: EntityKind,
        id: &str,
        label: &str,
        missing_code: i32,
        unused_code: i32,
    ) -> PreconditionOutcome {
        let cartridge = match self.store.get(kind, id) {
            Some(cartridge) => cartridge,
            None => {
                return PreconditionOutcome::fail(
                    missing_code,
                    format!("{} {} not found in world state", label, id),
                )
            }
        };

        match cartridge.state() {
            Some("used") => PreconditionOutcome::pass(),
            state => PreconditionOutcome::fail(
                unused_code,
                format!(
                    "{} {} must be in 'used' state (current: {})",
                    label,
                    id,
                    state.unwrap_or("")
                ),
            ),
        }
    }

    fn check_stop_evaporation(&self, params: &StopEvaporationParams) -> PreconditionOutcome {
        let device_id = &params.device_id;
        match self.store.get(EntityKind::Evaporator, device_id) {
            None => PreconditionOutcome::fail(
                codes::EVAPORATOR_NOT_FOUND,
                format!("Evaporator {} not found in world state", device_id),
            ),
            Some(evaporator) if evaporator_running(&evaporator) => PreconditionOutcome::pass(),
            Some(_) => PreconditionOutcome::fail(
                codes::EVAPORATOR_NOT_RUNNING,
                format!("Evaporator {} is not running", device_id),
            ),
        }
    }

    /// Chutes are tracked by their own ids, so every tracked chute counts
    fn check_return_ccs_bins(&self, ws: &str) -> PreconditionOutcome {
        let has_bins = [EntityKind::LeftChute, EntityKind::RightChute]
            .into_iter()
            .flat_map(|kind| self.store.get_all_of_category(kind))
            .any(|chute| has_bin(&chute, "front_waste_bin") || has_bin(&chute, "back_waste_bin"));

        if has_bins {
            PreconditionOutcome::pass()
        } else {
            PreconditionOutcome::fail(
                codes::NO_BINS_IN_CHUTES,
                format!("No bins found in chutes for work station {}", ws),
            )
        }
    }

    fn check_return_cartridges(&self, params: &ReturnCartridgesParams) -> PreconditionOutcome {
        if let Some(id) = &params.silica_cartridge_id {
            if !self.store.has(EntityKind::SilicaCartridge, id) {
                return PreconditionOutcome::fail(
                    codes::RETURN_SILICA_NOT_FOUND,
                    format!("Silica cartridge {} not found in world state", id),
                );
            }
        }

        if let Some(id) = &params.sample_cartridge_id {
            if !self.store.has(EntityKind::SampleCartridge, id) {
                return PreconditionOutcome::fail(
                    codes::RETURN_SAMPLE_NOT_FOUND,
                    format!("Sample cartridge {} not found in world state", id),
                );
            }
        }

        PreconditionOutcome::pass()
    }

    fn check_return_tube_rack(&self, params: &ReturnTubeRackParams) -> PreconditionOutcome {
        match &params.tube_rack_id {
            Some(id) if !self.store.has(EntityKind::TubeRack, id) => PreconditionOutcome::fail(
                codes::RETURN_TUBE_RACK_NOT_FOUND,
                format!("Tube rack {} not found in world state", id),
            ),
            _ => PreconditionOutcome::pass(),
        }
    }
}

fn state_in(entity: &Entity, states: &[&str]) -> bool {
    entity.state().map_or(false, |s| states.contains(&s))
}

fn evaporator_running(evaporator: &Entity) -> bool {
    state_in(evaporator, DEVICE_BUSY_STATES)
        || evaporator.properties.get("running") == Some(&Value::Bool(true))
}

/// Legacy chutes stored bins as plain strings such as `"open"`
fn has_bin(chute: &Entity, slot: &str) -> bool {
    match chute.properties.get(slot) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
