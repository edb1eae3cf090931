use crate::protocol::TaskType;

/// First code of the task's failure decade (base..=base+9).
///
/// Cleanup and teardown tasks share the 1090 decade.
pub fn failure_code_base(task_type: TaskType) -> i32 {
    match task_type {
        TaskType::SetupCartridges => 1010,
        TaskType::SetupTubeRack => 1020,
        TaskType::TakePhoto => 1040,
        TaskType::StartChromatography => 1050,
        TaskType::TerminateChromatography => 1060,
        TaskType::CollectFractions => 1070,
        TaskType::StartEvaporation => 1080,
        TaskType::CollapseCartridges
        | TaskType::StopEvaporation
        | TaskType::SetupCcsBins
        | TaskType::ReturnCcsBins
        | TaskType::ReturnCartridges
        | TaskType::ReturnTubeRack => 1090,
    }
}

/// Hardware fault narratives reported for the task
pub fn failure_messages(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::SetupCartridges => &[
            "Gripper malfunction during cartridge pickup",
            "Cartridge not detected at expected storage position",
            "Silica cartridge alignment failure at work station mount point",
            "Sample cartridge barcode scan failed - cartridge may be misplaced",
        ],
        TaskType::SetupTubeRack => &[
            "Tube rack not detected at storage location",
            "Gripper force sensor exceeded safe threshold during rack pickup",
            "Tube rack alignment failure at work station",
        ],
        TaskType::TakePhoto => &[
            "Camera focus failure - image quality below threshold",
            "Navigation to photo position failed - path obstructed",
            "Device screen not detected at expected position",
        ],
        TaskType::StartChromatography => &[
            "Column chromatography system not responding to start command",
            "Pressure sensor reading abnormal before start - safety check failed",
            "Solvent level insufficient for configured run duration",
            "System equilibration timeout exceeded",
        ],
        TaskType::TerminateChromatography => &[
            "CC system did not acknowledge terminate command within timeout",
            "Emergency stop triggered during termination sequence",
            "Result screen capture failed during termination",
        ],
        TaskType::CollectFractions => &[
            "Round bottom flask not detected at consolidation station",
            "Tube extraction failure at position - tube may be stuck",
            "Flask overflow sensor triggered during consolidation",
        ],
        TaskType::StartEvaporation => &[
            "Evaporator vacuum pump failed to reach target pressure",
            "Water bath temperature sensor malfunction",
            "Flask rotation motor stalled during ramp-up",
            "Safety interlock triggered - evaporator lid not properly sealed",
        ],
        TaskType::CollapseCartridges => &[
            "Cartridge release latch did not disengage",
            "Gripper slipped while compressing spent cartridge",
        ],
        TaskType::StopEvaporation => &[
            "Vacuum release valve did not open",
            "Flask lift motor stalled while raising flask",
        ],
        TaskType::SetupCcsBins => &[
            "Waste bin not detected at storage location",
            "Chute did not accept bin - alignment failure",
        ],
        TaskType::ReturnCcsBins => &[
            "Waste bin stuck in chute during extraction",
            "Waste area full - no free slot for bin",
        ],
        TaskType::ReturnCartridges => &[
            "Cartridge mount did not release",
            "Waste area full - no free slot for cartridges",
        ],
        TaskType::ReturnTubeRack => &[
            "Tube rack not detected at work station",
            "Gripper force sensor exceeded safe threshold during rack return",
        ],
    }
}
