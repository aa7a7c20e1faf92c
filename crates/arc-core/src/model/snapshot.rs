// ── Configuration snapshots ──
//
// The full entity set of one device at one point in time. Construction
// enforces identity uniqueness and reference resolution; after that a
// snapshot is read-only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::entity::{ConfigEntity, EntityKey, EntityKind};
use crate::error::{ValidationError, Violation};

/// Whether a snapshot was declared or read from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotOrigin {
    Desired,
    Live,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    device: String,
    origin: SnapshotOrigin,
    captured_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_entities")]
    entities: BTreeMap<EntityKey, ConfigEntity>,
}

fn serialize_entities<S: Serializer>(
    entities: &BTreeMap<EntityKey, ConfigEntity>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(entities.values())
}

impl ConfigSnapshot {
    /// Capture a snapshot, rejecting duplicate identities and references
    /// to entities that are not part of it.
    pub fn build(
        device: impl Into<String>,
        origin: SnapshotOrigin,
        entities: impl IntoIterator<Item = ConfigEntity>,
    ) -> Result<Self, ValidationError> {
        let device = device.into();
        let mut violations = Vec::new();
        let mut map = BTreeMap::new();

        for entity in entities {
            let key = entity.key();
            if map.contains_key(&key) {
                violations.push(Violation {
                    entity: key.to_string(),
                    message: format!("duplicate {} identifier '{}'", key.kind, key.id),
                });
                continue;
            }
            map.insert(key, entity);
        }

        for (key, entity) in &map {
            for dep in &entity.depends_on {
                if dep == key {
                    violations.push(Violation {
                        entity: key.to_string(),
                        message: "entity depends on itself".into(),
                    });
                } else if !map.contains_key(dep) {
                    violations.push(Violation {
                        entity: key.to_string(),
                        message: format!("references {dep}, which is not declared"),
                    });
                }
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError { device, violations });
        }

        Ok(Self {
            device,
            origin,
            captured_at: Utc::now(),
            entities: map,
        })
    }

    pub fn empty(device: impl Into<String>, origin: SnapshotOrigin) -> Self {
        Self {
            device: device.into(),
            origin,
            captured_at: Utc::now(),
            entities: BTreeMap::new(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn get(&self, key: &EntityKey) -> Option<&ConfigEntity> {
        self.entities.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Entities in canonical (kind, identifier) order.
    pub fn entities(&self) -> impl Iterator<Item = &ConfigEntity> {
        self.entities.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &ConfigEntity> {
        self.entities.values().filter(move |e| e.kind == kind)
    }

    /// Entities that reference `key`.
    pub fn dependents_of<'a>(&'a self, key: &'a EntityKey) -> impl Iterator<Item = &'a ConfigEntity> {
        self.entities
            .values()
            .filter(move |e| e.depends_on.contains(key))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Restrict to the given kinds. References into dropped kinds are
    /// kept as-is; they are resolved against the device, not this view.
    pub fn restricted_to(&self, kinds: &[EntityKind]) -> Self {
        Self {
            device: self.device.clone(),
            origin: self.origin,
            captured_at: self.captured_at,
            entities: self
                .entities
                .iter()
                .filter(|(k, _)| kinds.contains(&k.kind))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        }
    }

    pub(crate) fn into_entities(self) -> BTreeMap<EntityKey, ConfigEntity> {
        self.entities
    }

    /// A snapshot over an already-consistent entity map (device state
    /// replayed in memory).
    pub(crate) fn from_map(
        device: impl Into<String>,
        origin: SnapshotOrigin,
        entities: BTreeMap<EntityKey, ConfigEntity>,
    ) -> Self {
        Self {
            device: device.into(),
            origin,
            captured_at: Utc::now(),
            entities,
        }
    }
}
