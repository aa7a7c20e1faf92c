// ── Dependency orderer ──
//
// Builds a directed graph over the operations of one device (node = index
// into the operation list, edge = "must run before") and sorts it
// topologically. Unsafe deletes are rejected before any edge is drawn.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::error::{DeleteViolation, MissingDependency, OrderError};
use crate::model::{ChangeSet, ConfigSnapshot, EntityKey, Operation};

/// Sequence `operations` (computed against `live`) into a safe change set.
///
/// - a `Create`/`Update` runs after every `Create`/`Update` it depends on;
/// - deletes run dependents-first;
/// - an `Update` that drops a reference to a deleted entity runs before
///   that delete;
/// - the delete half of a kind change runs before its create half.
///
/// Unsafe deletes and creates/updates that need an entity which neither
/// exists on the device nor is created here are rejected.
pub fn order(
    device: &str,
    operations: Vec<Operation>,
    live: &ConfigSnapshot,
) -> Result<ChangeSet, OrderError> {
    let index: HashMap<EntityKey, usize> = operations
        .iter()
        .enumerate()
        .map(|(i, op)| (op.key(), i))
        .collect();

    check_deletes(&operations, &index, live)?;
    check_references(&operations, &index, live)?;

    let mut creates_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, op) in operations.iter().enumerate() {
        if matches!(op, Operation::Create { .. }) {
            creates_by_id.entry(op.id()).or_default().push(i);
        }
    }

    let mut graph = DiGraphMap::<usize, ()>::new();
    for i in 0..operations.len() {
        graph.add_node(i);
    }

    for (i, op) in operations.iter().enumerate() {
        if op.is_delete() {
            // Dependents go first.
            for dep in op.depends_on() {
                if let Some(&j) = index.get(dep) {
                    if operations[j].is_delete() {
                        graph.add_edge(i, j, ());
                    }
                }
            }
            // Updates that drop their reference to this entity go first.
            let key = op.key();
            for dependent in live.dependents_of(&key) {
                if let Some(&j) = index.get(&dependent.key()) {
                    if matches!(operations[j], Operation::Update { .. }) {
                        graph.add_edge(j, i, ());
                    }
                }
            }
            // Kind change: free the identifier before reusing it.
            for &j in creates_by_id.get(op.id()).into_iter().flatten() {
                graph.add_edge(i, j, ());
            }
        } else {
            for dep in op.depends_on() {
                if let Some(&j) = index.get(dep) {
                    if !operations[j].is_delete() {
                        graph.add_edge(j, i, ());
                    }
                }
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|_| cycle_error(&graph, &operations))?;
    debug!(
        device,
        operations = sorted.len(),
        edges = graph.edge_count(),
        "ordered change set"
    );

    let mut slots: Vec<Option<Operation>> = operations.into_iter().map(Some).collect();
    let ordered = sorted
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect();
    Ok(ChangeSet::new(device, ordered))
}

/// Reject every delete whose entity is still referenced by something that
/// survives the change set: an entity being created or updated (desired
/// dependencies) or an untouched live entity (live dependencies).
fn check_deletes(
    operations: &[Operation],
    index: &HashMap<EntityKey, usize>,
    live: &ConfigSnapshot,
) -> Result<(), OrderError> {
    let deleted: BTreeSet<EntityKey> = operations
        .iter()
        .filter(|op| op.is_delete())
        .map(Operation::key)
        .collect();
    if deleted.is_empty() {
        return Ok(());
    }

    let mut stranded: BTreeMap<EntityKey, BTreeSet<EntityKey>> = BTreeMap::new();
    let mut note = |deps: &BTreeSet<EntityKey>, dependent: EntityKey| {
        for dep in deps.intersection(&deleted) {
            stranded.entry(dep.clone()).or_default().insert(dependent.clone());
        }
    };

    for op in operations.iter().filter(|op| !op.is_delete()) {
        note(op.depends_on(), op.key());
    }
    for entity in live.entities() {
        let key = entity.key();
        if !index.contains_key(&key) {
            note(&entity.depends_on, key);
        }
    }

    if stranded.is_empty() {
        return Ok(());
    }
    Err(OrderError::DependencyViolation {
        violations: stranded
            .into_iter()
            .map(|(deleted, dependents)| DeleteViolation {
                deleted,
                dependents: dependents.into_iter().collect(),
            })
            .collect(),
    })
}

/// Every dependency of a create or update must be on the device already
/// or be created or updated by this change set. This catches a desired
/// snapshot cut down to some kinds that still references the others.
fn check_references(
    operations: &[Operation],
    index: &HashMap<EntityKey, usize>,
    live: &ConfigSnapshot,
) -> Result<(), OrderError> {
    let provided = |key: &EntityKey| match index.get(key) {
        Some(&j) => !operations[j].is_delete(),
        None => live.contains(key),
    };

    let mut missing: BTreeMap<EntityKey, BTreeSet<EntityKey>> = BTreeMap::new();
    for op in operations.iter().filter(|op| !op.is_delete()) {
        for dep in op.depends_on().iter().filter(|dep| !provided(dep)) {
            missing.entry(dep.clone()).or_default().insert(op.key());
        }
    }

    if missing.is_empty() {
        return Ok(());
    }
    Err(OrderError::UnresolvedDependency {
        missing: missing
            .into_iter()
            .map(|(missing, dependents)| MissingDependency {
                missing,
                dependents: dependents.into_iter().collect(),
            })
            .collect(),
    })
}

fn cycle_error(graph: &DiGraphMap<usize, ()>, operations: &[Operation]) -> OrderError {
    let mut entities: Vec<EntityKey> = tarjan_scc(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .flatten()
        .filter_map(|i| operations.get(i).map(Operation::key))
        .collect();
    entities.sort();
    OrderError::DependencyCycle { entities }
}
