// ── In-memory device ──
//
// A simulated switch holding its configuration in a map. It enforces the
// same referential rules a real switch does (no dangling references, no
// deleting entities in use), can inject faults, and optionally supports
// native transactions. Clones share state, so a test can keep a handle
// while the engine owns another.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::DeviceProtocol;
use crate::error::DeviceError;
use crate::model::{ConfigEntity, ConfigSnapshot, EntityKey, EntityKind, Operation, SnapshotOrigin};

/// Injected failure for one (verb, entity) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Refuse the request every time.
    Reject(String),
    /// Report "busy" this many times, then behave normally.
    Busy(u32),
    /// Answer as if the session had expired.
    Unauthenticated,
}

#[derive(Debug, Default)]
struct Inner {
    state: BTreeMap<EntityKey, ConfigEntity>,
    staged: Option<BTreeMap<EntityKey, ConfigEntity>>,
    faults: HashMap<(String, EntityKey), Fault>,
    fetch_faults: VecDeque<DeviceError>,
    begin_fault: Option<DeviceError>,
    commit_fault: Option<DeviceError>,
    journal: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MemoryDevice {
    name: String,
    transactional: bool,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transactional: false,
            inner: Arc::default(),
        }
    }

    /// Seed the device with a copy of `snapshot` (e.g. fetched live state).
    pub fn from_snapshot(name: impl Into<String>, snapshot: &ConfigSnapshot) -> Self {
        Self::new(name).with_entities(snapshot.entities().cloned())
    }

    #[must_use]
    pub fn with_entities(self, entities: impl IntoIterator<Item = ConfigEntity>) -> Self {
        {
            let mut inner = self.lock();
            for entity in entities {
                inner.state.insert(entity.key(), entity);
            }
        }
        self
    }

    #[must_use]
    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    /// Fail every `verb` ("create", "update", "delete") on `key`.
    #[must_use]
    pub fn fail_on(self, verb: &str, key: EntityKey, fault: Fault) -> Self {
        self.lock().faults.insert((verb.to_owned(), key), fault);
        self
    }

    /// Fail the next fetch with `err`. Queue several to fail several.
    #[must_use]
    pub fn fail_fetch(self, err: DeviceError) -> Self {
        self.lock().fetch_faults.push_back(err);
        self
    }

    #[must_use]
    pub fn fail_begin(self, err: DeviceError) -> Self {
        self.lock().begin_fault = Some(err);
        self
    }

    #[must_use]
    pub fn fail_commit(self, err: DeviceError) -> Self {
        self.lock().commit_fault = Some(err);
        self
    }

    /// Committed configuration.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::from_map(&self.name, SnapshotOrigin::Live, self.lock().state.clone())
    }

    /// Every request received, as `"<verb> <kind>:<id>"`, in order.
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn working_set(&mut self) -> &mut BTreeMap<EntityKey, ConfigEntity> {
        match self.staged {
            Some(ref mut staged) => staged,
            None => &mut self.state,
        }
    }

    fn take_fault(&mut self, verb: &str, key: &EntityKey) -> Option<DeviceError> {
        let slot = (verb.to_owned(), key.clone());
        match self.faults.get_mut(&slot)? {
            Fault::Reject(reason) => Some(DeviceError::Rejected(reason.clone())),
            Fault::Unauthenticated => Some(DeviceError::NotAuthenticated("session expired".into())),
            Fault::Busy(remaining) => {
                if *remaining == 0 {
                    self.faults.remove(&slot);
                    None
                } else {
                    *remaining -= 1;
                    Some(DeviceError::Transient("device busy".into()))
                }
            }
        }
    }
}

/// Reject operations a real switch would refuse: references to missing
/// entities and deletes of entities still in use.
fn check_integrity(
    entities: &BTreeMap<EntityKey, ConfigEntity>,
    op: &Operation,
) -> Result<(), DeviceError> {
    let key = op.key();
    if op.is_delete() {
        if let Some(user) = entities.values().find(|e| e.depends_on.contains(&key)) {
            return Err(DeviceError::Rejected(format!("{key} is in use by {}", user.key())));
        }
    } else if let Some(missing) = op.depends_on().iter().find(|dep| !entities.contains_key(dep)) {
        return Err(DeviceError::Rejected(format!("{key} references missing {missing}")));
    }
    Ok(())
}

#[async_trait]
impl DeviceProtocol for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, kinds: &[EntityKind]) -> Result<Vec<ConfigEntity>, DeviceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.fetch_faults.pop_front() {
            return Err(err);
        }
        Ok(inner
            .state
            .values()
            .filter(|e| kinds.contains(&e.kind))
            .cloned()
            .collect())
    }

    async fn apply_operation(&mut self, op: &Operation) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        inner.journal.push(op.to_string());

        if let Some(err) = inner.take_fault(op.verb(), &op.key()) {
            return Err(err);
        }

        let entities = inner.working_set();
        check_integrity(entities, op)?;
        op.apply_to(entities).map_err(DeviceError::Rejected)
    }

    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn begin_transaction(&mut self) -> Result<(), DeviceError> {
        if !self.transactional {
            return Err(DeviceError::Unsupported("transactions".into()));
        }
        let mut inner = self.lock();
        if let Some(err) = inner.begin_fault.take() {
            return Err(err);
        }
        if inner.staged.is_some() {
            return Err(DeviceError::Rejected("a transaction is already open".into()));
        }
        inner.staged = Some(inner.state.clone());
        inner.journal.push("begin".into());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        inner.journal.push("commit".into());
        let staged = inner
            .staged
            .take()
            .ok_or_else(|| DeviceError::Rejected("no open transaction".into()))?;
        if let Some(err) = inner.commit_fault.take() {
            return Err(err);
        }
        inner.state = staged;
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        inner.journal.push("abort".into());
        inner.staged = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Properties, PropertyValue};

    fn vlan(id: i64) -> ConfigEntity {
        ConfigEntity::normalized(EntityKind::Vlan, id.to_string(), Properties::new(), [])
    }

    fn port(id: &str, untagged: i64) -> ConfigEntity {
        let mut props = Properties::new();
        props.insert("untagged_vlan".into(), PropertyValue::Int(untagged));
        ConfigEntity::normalized(EntityKind::Interface, id, props, [])
    }

    #[tokio::test]
    async fn refuses_deleting_entities_in_use() {
        let mut dev = MemoryDevice::new("sw1").with_entities([vlan(10), port("1", 10)]);
        let err = dev
            .apply_operation(&Operation::delete(EntityKind::Vlan, "10"))
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::Rejected("vlan:10 is in use by interface:1".into()));
    }

    #[tokio::test]
    async fn refuses_dangling_references() {
        let mut dev = MemoryDevice::new("sw1");
        let err = dev
            .apply_operation(&Operation::create(port("1", 20)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Rejected(msg) if msg.contains("missing vlan:20")));
    }

    #[tokio::test]
    async fn busy_fault_clears_after_count() {
        let mut dev = MemoryDevice::new("sw1").fail_on("create", EntityKey::vlan(10), Fault::Busy(2));
        let op = Operation::create(vlan(10));

        assert!(dev.apply_operation(&op).await.unwrap_err().is_recoverable());
        assert!(dev.apply_operation(&op).await.unwrap_err().is_recoverable());
        dev.apply_operation(&op).await.unwrap();
        assert_eq!(dev.journal().len(), 3);
        assert!(dev.snapshot().contains(&EntityKey::vlan(10)));
    }

    #[tokio::test]
    async fn abort_discards_staged_changes() {
        let mut dev = MemoryDevice::new("sw1").transactional();
        dev.begin_transaction().await.unwrap();
        dev.apply_operation(&Operation::create(vlan(10))).await.unwrap();
        dev.abort().await.unwrap();
        assert!(dev.snapshot().is_empty());

        dev.begin_transaction().await.unwrap();
        dev.apply_operation(&Operation::create(vlan(10))).await.unwrap();
        dev.commit().await.unwrap();
        assert_eq!(dev.snapshot().len(), 1);
    }
}
