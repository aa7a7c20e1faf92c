// Domain model: entities, snapshots and the operations between them.

pub mod entity;
pub mod operation;
pub mod schema;
pub mod snapshot;

pub use entity::{ConfigEntity, EntityKey, EntityKind, Properties, PropertyValue};
pub use operation::{ApplyResult, ChangeSet, Operation, OperationReport};
pub use snapshot::{ConfigSnapshot, SnapshotOrigin};
