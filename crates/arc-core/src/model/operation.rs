// ── Operations, change sets and apply outcomes ──

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::entity::{ConfigEntity, EntityKey, EntityKind, Properties, PropertyValue};
use super::snapshot::ConfigSnapshot;

// ── Operation ───────────────────────────────────────────────────────

/// One primitive change against a device.
///
/// `depends_on` is the desired dependency set for `Create`/`Update` and
/// the live dependency set for `Delete`; it only drives ordering and does
/// not take part in equality.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Create {
        entity: ConfigEntity,
    },
    Update {
        kind: EntityKind,
        id: String,
        changes: Properties,
        #[serde(skip_serializing_if = "BTreeSet::is_empty")]
        depends_on: BTreeSet<EntityKey>,
    },
    Delete {
        kind: EntityKind,
        id: String,
        #[serde(skip_serializing_if = "BTreeSet::is_empty")]
        depends_on: BTreeSet<EntityKey>,
    },
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Create { entity: a }, Self::Create { entity: b }) => {
                a.kind == b.kind && a.id == b.id && a.properties == b.properties
            }
            (
                Self::Update {
                    kind: ka,
                    id: ia,
                    changes: ca,
                    ..
                },
                Self::Update {
                    kind: kb,
                    id: ib,
                    changes: cb,
                    ..
                },
            ) => ka == kb && ia == ib && ca == cb,
            (Self::Delete { kind: ka, id: ia, .. }, Self::Delete { kind: kb, id: ib, .. }) => {
                ka == kb && ia == ib
            }
            _ => false,
        }
    }
}

impl Eq for Operation {}

impl Operation {
    pub fn create(entity: ConfigEntity) -> Self {
        Self::Create { entity }
    }

    pub fn update(kind: EntityKind, id: impl Into<String>, changes: Properties) -> Self {
        Self::Update {
            kind,
            id: id.into(),
            changes,
            depends_on: BTreeSet::new(),
        }
    }

    pub fn delete(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::Delete {
            kind,
            id: id.into(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Create { entity } => entity.kind,
            Self::Update { kind, .. } | Self::Delete { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Create { entity } => &entity.id,
            Self::Update { id, .. } | Self::Delete { id, .. } => id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    pub fn depends_on(&self) -> &BTreeSet<EntityKey> {
        match self {
            Self::Create { entity } => &entity.depends_on,
            Self::Update { depends_on, .. } | Self::Delete { depends_on, .. } => depends_on,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    /// The operation that undoes this one, given the live snapshot it was
    /// planned against. `None` when the live snapshot lacks the entity an
    /// update or delete touched.
    pub fn compensation(&self, live: &ConfigSnapshot) -> Option<Self> {
        match self {
            Self::Create { entity } => Some(Self::Delete {
                kind: entity.kind,
                id: entity.id.clone(),
                depends_on: entity.depends_on.clone(),
            }),
            Self::Update {
                kind, id, changes, ..
            } => {
                let before = live.get(&EntityKey::new(*kind, id.clone()))?;
                let restore: Properties = changes
                    .keys()
                    .map(|name| {
                        let old = before.properties.get(name).cloned().unwrap_or(PropertyValue::Null);
                        (name.clone(), old)
                    })
                    .collect();
                Some(Self::Update {
                    kind: *kind,
                    id: id.clone(),
                    changes: restore,
                    depends_on: before.depends_on.clone(),
                })
            }
            Self::Delete { kind, id, .. } => live
                .get(&EntityKey::new(*kind, id.clone()))
                .map(|entity| Self::Create {
                    entity: entity.clone(),
                }),
        }
    }

    /// Replay this operation on an in-memory entity map.
    pub fn apply_to(&self, entities: &mut BTreeMap<EntityKey, ConfigEntity>) -> Result<(), String> {
        let key = self.key();
        match self {
            Self::Create { entity } => {
                if entities.contains_key(&key) {
                    return Err(format!("{key} already exists"));
                }
                entities.insert(key, entity.clone());
            }
            Self::Update {
                changes, depends_on, ..
            } => {
                let entity = entities
                    .get_mut(&key)
                    .ok_or_else(|| format!("{key} does not exist"))?;
                entity.apply_changes(changes, depends_on);
            }
            Self::Delete { .. } => {
                entities
                    .remove(&key)
                    .ok_or_else(|| format!("{key} does not exist"))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.key())?;
        if let Self::Update { changes, .. } = self {
            let names: Vec<&str> = changes.keys().map(String::as_str).collect();
            write!(f, " ({})", names.join(", "))?;
        }
        Ok(())
    }
}

// ── ChangeSet ───────────────────────────────────────────────────────

/// Ordered operations for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub device: String,
    pub operations: Vec<Operation>,
}

impl ChangeSet {
    pub fn new(device: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            device: device.into(),
            operations,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Replay the change set on `live` and return the resulting snapshot.
    pub fn replay(&self, live: &ConfigSnapshot) -> Result<ConfigSnapshot, String> {
        let mut entities = live.clone().into_entities();
        for op in &self.operations {
            op.apply_to(&mut entities)?;
        }
        Ok(ConfigSnapshot::from_map(live.device(), live.origin(), entities))
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Terminal outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ApplyResult {
    Applied,
    Failed(String),
    Skipped(String),
    RolledBack,
}

impl ApplyResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
            Self::RolledBack => "rolled back",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed(r) | Self::Skipped(r) => Some(r),
            Self::Applied | Self::RolledBack => None,
        }
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {reason}", self.label()),
            None => f.write_str(self.label()),
        }
    }
}

/// An operation together with how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReport {
    pub operation: Operation,
    pub result: ApplyResult,
    /// Requests sent for the forward operation (1 + retries).
    pub attempts: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::SnapshotOrigin;

    fn props(pairs: &[(&str, PropertyValue)]) -> Properties {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    fn live() -> ConfigSnapshot {
        let vlan = ConfigEntity::normalized(
            EntityKind::Vlan,
            "10",
            props(&[("name", "users".into())]),
            [],
        );
        let port = ConfigEntity::normalized(
            EntityKind::Interface,
            "1",
            props(&[("untagged_vlan", 10i64.into()), ("name", "desk".into())]),
            [],
        );
        ConfigSnapshot::build("sw1", SnapshotOrigin::Live, [vlan, port]).unwrap()
    }

    #[test]
    fn equality_ignores_dependencies() {
        let mut a = Operation::delete(EntityKind::Vlan, "10");
        if let Operation::Delete { depends_on, .. } = &mut a {
            depends_on.insert(EntityKey::vlan(20));
        }
        assert_eq!(a, Operation::delete(EntityKind::Vlan, "10"));
        assert_ne!(a, Operation::delete(EntityKind::Acl, "10"));
    }

    #[test]
    fn update_compensation_restores_old_values() {
        let op = Operation::update(
            EntityKind::Interface,
            "1",
            props(&[("name", "printer".into()), ("enabled", false.into())]),
        );
        let undo = op.compensation(&live()).unwrap();
        assert_eq!(
            undo,
            Operation::update(
                EntityKind::Interface,
                "1",
                props(&[("name", "desk".into()), ("enabled", PropertyValue::Null)]),
            )
        );
        assert!(undo.depends_on().contains(&EntityKey::vlan(10)));
    }

    #[test]
    fn delete_compensation_recreates_live_entity() {
        let undo = Operation::delete(EntityKind::Vlan, "10")
            .compensation(&live())
            .unwrap();
        match undo {
            Operation::Create { entity } => assert_eq!(entity.property("name"), Some(&"users".into())),
            other => panic!("expected create, got {other}"),
        }
        assert!(Operation::delete(EntityKind::Vlan, "99").compensation(&live()).is_none());
    }

    #[test]
    fn replay_rejects_missing_entities() {
        let cs = ChangeSet::new("sw1", vec![Operation::delete(EntityKind::Vlan, "30")]);
        assert_eq!(cs.replay(&live()).unwrap_err(), "vlan:30 does not exist");
    }

    #[test]
    fn display_lists_changed_properties() {
        let op = Operation::update(
            EntityKind::Interface,
            "1",
            props(&[("name", "x".into()), ("enabled", false.into())]),
        );
        assert_eq!(op.to_string(), "update interface:1 (name, enabled)");
        assert_eq!(ApplyResult::Skipped("cancelled".into()).to_string(), "skipped: cancelled");
    }
}
