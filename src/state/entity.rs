use crate::protocol::{EntityKind, EntityUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity represents one tracked lab object in the world state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,

    /// Entity identifier, unique within its kind (e.g. "cc-isco-300p_001")
    pub id: String,

    /// Latest property map (replaced wholesale on update)
    pub properties: Map<String, Value>,

    /// Last update timestamp
    pub last_updated: DateTime<Utc>,
}

impl Entity {
    pub fn state(&self) -> Option<&str> {
        self.str_property("state")
    }

    pub fn description(&self) -> &str {
        self.str_property("description").unwrap_or("")
    }

    pub fn location(&self) -> Option<&str> {
        self.str_property("location")
    }

    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Typed view of the stored properties
    pub fn to_update(&self) -> Result<EntityUpdate, serde_json::Error> {
        EntityUpdate::from_stored(self.kind, &self.id, &self.properties)
    }
}
