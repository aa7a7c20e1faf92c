// ── Device protocol capability ──
//
// The engine talks to switches only through `DeviceProtocol`. One
// implementation drives Aruba switches over their REST API; the in-memory
// implementation backs tests and `--simulate` runs.

pub mod aruba;
mod convert;
pub mod memory;

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::model::{ConfigEntity, EntityKind, Operation};

pub use aruba::ArubaSwitch;
pub use memory::{Fault, MemoryDevice};

/// What the engine needs from a device family.
///
/// A handle is owned by exactly one reconciling task, hence `&mut self`.
#[async_trait]
pub trait DeviceProtocol: Send {
    /// Device name used in reports and events.
    fn name(&self) -> &str;

    /// Read the live configuration of the given kinds, already normalized
    /// into canonical entities.
    async fn fetch(&mut self, kinds: &[EntityKind]) -> Result<Vec<ConfigEntity>, DeviceError>;

    /// Translate one operation into exactly one device request.
    async fn apply_operation(&mut self, op: &Operation) -> Result<(), DeviceError>;

    /// Whether the device can group operations into a native transaction.
    fn supports_transactions(&self) -> bool {
        false
    }

    async fn begin_transaction(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("transactions".into()))
    }

    async fn commit(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("transactions".into()))
    }

    async fn abort(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("transactions".into()))
    }
}
