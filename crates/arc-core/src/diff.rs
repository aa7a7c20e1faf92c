// ── Diff engine ──
//
// Desired vs. live, keyed by `EntityKey`. Because the key includes the
// kind, an identifier that moved to another kind naturally yields an
// independent delete + create pair.

use std::collections::BTreeSet;

use crate::model::{ConfigEntity, ConfigSnapshot, EntityKey, Operation, Properties, PropertyValue};

/// Operations transforming `live` into `desired`, sorted by entity key.
pub fn diff(desired: &ConfigSnapshot, live: &ConfigSnapshot) -> Vec<Operation> {
    let keys: BTreeSet<&EntityKey> = desired.keys().chain(live.keys()).collect();
    let mut ops = Vec::new();

    for key in keys {
        match (desired.get(key), live.get(key)) {
            (Some(want), None) => ops.push(Operation::create(want.clone())),
            (None, Some(have)) => ops.push(Operation::Delete {
                kind: have.kind,
                id: have.id.clone(),
                depends_on: have.depends_on.clone(),
            }),
            (Some(want), Some(have)) => {
                let changes = changed_properties(want, have);
                if !changes.is_empty() {
                    ops.push(Operation::Update {
                        kind: want.kind,
                        id: want.id.clone(),
                        changes,
                        depends_on: want.depends_on.clone(),
                    });
                }
            }
            (None, None) => {}
        }
    }

    ops
}

/// Keys whose value differs, in desired order, followed by keys only the
/// live entity has (reset to default).
fn changed_properties(want: &ConfigEntity, have: &ConfigEntity) -> Properties {
    let mut changes = Properties::new();
    for (name, value) in &want.properties {
        if have.properties.get(name) != Some(value) {
            changes.insert(name.clone(), value.clone());
        }
    }
    for name in have.properties.keys() {
        if !want.properties.contains_key(name) {
            changes.insert(name.clone(), PropertyValue::Null);
        }
    }
    changes
}
