use crate::protocol::{EntityKind, EntityUpdate};
use crate::state::entity::Entity;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

type EntityKey = (EntityKind, String);

/// Prior contents of a set of entities, `None` for ones that did not exist
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    entries: Vec<(EntityKey, Option<Entity>)>,
}

impl StoreSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory world state keyed by `(kind, id)`.
///
/// The lock is only held for the map operation itself, never across an
/// `.await`.
pub struct EntityStore {
    entities: RwLock<HashMap<EntityKey, Entity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a batch of updates, replacing each entity's properties.
    ///
    /// Every update is converted before the lock is taken, so a batch that
    /// fails to convert leaves the store untouched.
    pub fn apply_updates(&self, updates: &[EntityUpdate]) -> Result<usize, serde_json::Error> {
        let prepared = updates
            .iter()
            .map(|u| Ok((u.kind(), u.id().to_string(), u.properties_map()?)))
            .collect::<Result<Vec<(EntityKind, String, Map<String, Value>)>, serde_json::Error>>()?;

        let now = Utc::now();
        let mut entities = self.write();
        for (kind, id, properties) in prepared {
            debug!(kind = %kind, entity_id = %id, "Entity updated");
            entities.insert(
                (kind, id.clone()),
                Entity {
                    kind,
                    id,
                    properties,
                    last_updated: now,
                },
            );
        }

        Ok(updates.len())
    }

    /// Store an untyped property map, e.g. state written by an older robot
    pub fn put_properties(&self, kind: EntityKind, id: &str, properties: Map<String, Value>) {
        self.write().insert(
            (kind, id.to_string()),
            Entity {
                kind,
                id: id.to_string(),
                properties,
                last_updated: Utc::now(),
            },
        );
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        self.read().get(&(kind, id.to_string())).cloned()
    }

    pub fn has(&self, kind: EntityKind, id: &str) -> bool {
        self.read().contains_key(&(kind, id.to_string()))
    }

    pub fn get_all_of_category(&self, kind: EntityKind) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .read()
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// First entity of `kind` whose `location` property equals `location`.
    ///
    /// When several match, the most recently updated wins.
    pub fn find_by_location(&self, kind: EntityKind, location: &str) -> Option<Entity> {
        self.read()
            .values()
            .filter(|e| e.kind == kind && e.location() == Some(location))
            .max_by(|a, b| {
                a.last_updated
                    .cmp(&b.last_updated)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .cloned()
    }

    /// Capture the entities `updates` would touch
    pub fn snapshot(&self, updates: &[EntityUpdate]) -> StoreSnapshot {
        let entities = self.read();
        let entries = updates
            .iter()
            .map(|u| {
                let key = (u.kind(), u.id().to_string());
                let previous = entities.get(&key).cloned();
                (key, previous)
            })
            .collect();
        StoreSnapshot { entries }
    }

    /// Put the captured entities back, removing the ones that did not exist
    pub fn restore(&self, snapshot: StoreSnapshot) {
        let mut entities = self.write();
        let restored = snapshot.entries.len();
        for (key, previous) in snapshot.entries {
            match previous {
                Some(entity) => {
                    entities.insert(key, entity);
                }
                None => {
                    entities.remove(&key);
                }
            }
        }
        info!(restored = restored, "Entities restored from snapshot");
    }

    /// Drop every tracked entity
    pub fn reset(&self) {
        let mut entities = self.write();
        let cleared = entities.len();
        entities.clear();
        info!(cleared = cleared, "World state reset");
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EntityKey, Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EntityKey, Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
