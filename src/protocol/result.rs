use serde::{Deserialize, Serialize};

use super::update::{EntityUpdate, RobotState};

/// Result codes shared with the orchestration side
pub mod codes {
    pub const SUCCESS: i32 = 200;
    pub const UNKNOWN_TASK_TYPE: i32 = 1000;
    pub const INVALID_PARAMS: i32 = 1001;
    pub const STATE_TRACKING_DISABLED: i32 = 1002;
    pub const INTERNAL_ERROR: i32 = 9999;
}

/// Metadata for a (mock) captured image
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapturedImage {
    pub work_station: String,
    pub device_id: String,
    pub device_type: String,
    pub component: String,
    pub url: String,
    #[serde(default)]
    pub create_time: String,
}

/// Final outcome of a task, published on `{robot_id}.result`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotResult {
    pub code: i32,
    pub msg: String,
    pub task_id: String,
    #[serde(default)]
    pub updates: Vec<EntityUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<CapturedImage>>,
}

impl RobotResult {
    pub fn success(
        task_id: impl Into<String>,
        msg: impl Into<String>,
        updates: Vec<EntityUpdate>,
    ) -> Self {
        Self {
            code: codes::SUCCESS,
            msg: msg.into(),
            task_id: task_id.into(),
            updates,
            images: None,
        }
    }

    pub fn error(task_id: impl Into<String>, code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            task_id: task_id.into(),
            updates: Vec::new(),
            images: None,
        }
    }

    pub fn with_images(mut self, images: Vec<CapturedImage>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == codes::SUCCESS
    }
}

/// Real-time progress entry, published on `{robot_id}.log`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub code: i32,
    pub msg: String,
    pub task_id: String,
    #[serde(default)]
    pub updates: Vec<EntityUpdate>,
    pub timestamp: String,
}

/// Liveness signal, published on `{robot_id}.hb`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    pub robot_id: String,
    pub timestamp: String,
    pub state: RobotState,
    #[serde(rename = "Work_station", default)]
    pub work_station: Option<String>,
}
