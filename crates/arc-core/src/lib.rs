// arc-core: Reconciliation engine between arc-api and the CLI.

pub mod apply;
pub mod config;
pub mod device;
pub mod diff;
pub mod error;
pub mod event;
pub mod fetch;
pub mod model;
pub mod order;
pub mod parse;
pub mod reconcile;
pub mod retry;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use apply::{ApplyCoordinator, ApplyReport};
pub use config::{SwitchConfig, TlsVerification};
pub use device::{ArubaSwitch, DeviceProtocol, Fault, MemoryDevice};
pub use diff::diff;
pub use error::{
    CoreError, DeleteViolation, DeviceError, FetchError, MissingDependency, OrderError,
    ReconcileError, Stage, ValidationError, Violation,
};
pub use event::{EventSink, ReconcileEvent, RecordingSink, TracingSink};
pub use fetch::fetch_live;
pub use order::order;
pub use parse::{RawDesiredConfig, RawDeviceConfig, RawEntity, parse_config, parse_device};
pub use reconcile::{
    DeviceOutcome, DeviceReport, DeviceTarget, Plan, ReconcileOptions, ReconcileReport,
    Reconciler, RunStatus,
};
pub use retry::RetryPolicy;
pub use session::{Connected, connect, disconnect};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ApplyResult, ChangeSet, ConfigEntity, ConfigSnapshot, EntityKey, EntityKind, Operation,
    OperationReport, Properties, PropertyValue, SnapshotOrigin,
};
