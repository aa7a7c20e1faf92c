// ── Aruba switch device ──
//
// Drives an ArubaOS-Switch over `rest/v1`. Each operation maps to exactly
// one request. The switch has no transactions, so the engine falls back to
// compensating operations when a change set fails halfway.
//
// Updates are partial on our side but the switch's PUT endpoints replace
// the whole object, so the driver keeps the last fetched state and merges
// each update into it before writing.

use std::collections::{BTreeMap, HashMap};

use arc_api::{PortPoe, Session};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DeviceProtocol, convert};
use crate::error::DeviceError;
use crate::model::{ConfigEntity, EntityKey, EntityKind, Operation, Properties};

pub struct ArubaSwitch {
    name: String,
    session: Session,
    live: BTreeMap<EntityKey, ConfigEntity>,
    /// Static route prefix (`a.b.c.d/len`) -> switch-assigned route id.
    route_ids: HashMap<String, String>,
}

impl ArubaSwitch {
    /// Wrap an authenticated session.
    pub fn new(name: impl Into<String>, session: Session) -> Self {
        Self {
            name: name.into(),
            session,
            live: BTreeMap::new(),
            route_ids: HashMap::new(),
        }
    }

    // ── Fetch ────────────────────────────────────────────────────────

    async fn fetch_kind(&mut self, kind: EntityKind) -> Result<Vec<ConfigEntity>, DeviceError> {
        match kind {
            EntityKind::Vlan => Ok(self
                .session
                .list_vlans()
                .await?
                .iter()
                .filter_map(convert::vlan_from_wire)
                .collect()),
            EntityKind::Interface => self.fetch_interfaces().await,
            EntityKind::Acl => Ok(self
                .session
                .list_acls()
                .await?
                .iter()
                .map(convert::acl_from_wire)
                .collect()),
            EntityKind::AclRule => {
                let mut rules = Vec::new();
                for acl in self.session.list_acls().await? {
                    for rule in self.session.list_acl_rules(&acl.id).await? {
                        match convert::acl_rule_from_wire(&acl.acl_name, &rule) {
                            Some(entity) => rules.push(entity),
                            None => debug!(
                                acl = %acl.acl_name,
                                sequence = rule.sequence_no,
                                "skipping rule with a wildcard mask"
                            ),
                        }
                    }
                }
                Ok(rules)
            }
            EntityKind::StaticRoute => {
                let mut routes = Vec::new();
                self.route_ids.clear();
                for route in self.session.list_routes().await? {
                    let Some(entity) = convert::route_from_wire(&route).map_err(DeviceError::Protocol)?
                    else {
                        debug!(route = %route.id, "skipping unmodelled route mode");
                        continue;
                    };
                    self.route_ids.insert(entity.id.clone(), route.id.clone());
                    routes.push(entity);
                }
                Ok(routes)
            }
        }
    }

    async fn fetch_interfaces(&self) -> Result<Vec<ConfigEntity>, DeviceError> {
        let ports = self.session.list_ports().await?;
        let memberships = self.session.list_vlan_ports().await?;
        let poe: HashMap<String, PortPoe> = match self.session.get_ports().await {
            Ok(list) => list.into_iter().map(|p| (p.port_id.clone(), p)).collect(),
            // Switches without PoE hardware do not expose the endpoint.
            Err(e) if e.is_not_found() => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(ports
            .iter()
            .filter_map(|port| convert::interface_from_wire(port, &memberships, poe.get(&port.id)))
            .collect())
    }

    // ── Apply ────────────────────────────────────────────────────────

    async fn write(&mut self, entity: &ConfigEntity, create: bool) -> Result<(), DeviceError> {
        match entity.kind {
            EntityKind::Vlan => {
                let vlan = convert::vlan_to_wire(entity).map_err(DeviceError::Protocol)?;
                if create {
                    self.session.create_vlan(&vlan).await?;
                } else {
                    self.session.update_vlan(&vlan).await?;
                }
            }
            // Ports always exist; "creating" an interface configures it.
            EntityKind::Interface => {
                let config = convert::port_to_wire(entity).map_err(DeviceError::Protocol)?;
                self.session.configure_port(&config).await?;
            }
            EntityKind::Acl => {
                let acl = convert::acl_to_wire(entity);
                if create {
                    self.session.create_acl(&acl).await?;
                } else {
                    self.session.update_acl(&acl).await?;
                }
            }
            EntityKind::AclRule => {
                let rule = convert::acl_rule_to_wire(entity).map_err(DeviceError::Protocol)?;
                if create {
                    self.session.create_acl_rule(&rule).await?;
                } else {
                    self.session.update_acl_rule(&rule).await?;
                }
            }
            EntityKind::StaticRoute => {
                let route = convert::route_to_wire(entity).map_err(DeviceError::Protocol)?;
                if create {
                    let created = self.session.create_route(&route).await?;
                    self.route_ids.insert(entity.id.clone(), created.id);
                } else {
                    let route_id = self.route_id(&entity.id)?;
                    self.session.update_route(&route_id, &route).await?;
                }
            }
        }
        Ok(())
    }

    async fn remove(&mut self, kind: EntityKind, id: &str) -> Result<(), DeviceError> {
        match kind {
            EntityKind::Vlan => {
                let vlan_id = convert::vlan_id(id).map_err(DeviceError::Protocol)?;
                self.session.delete_vlan(vlan_id).await?;
            }
            EntityKind::Interface => {
                self.session.configure_port(&convert::port_defaults(id)).await?;
            }
            EntityKind::Acl => self.session.delete_acl(id).await?,
            EntityKind::AclRule => {
                let (acl, seq) = convert::split_rule_id(id).map_err(DeviceError::Protocol)?;
                self.session.delete_acl_rule(acl, seq).await?;
            }
            EntityKind::StaticRoute => {
                let route_id = self.route_id(id)?;
                self.session.delete_route(&route_id).await?;
                self.route_ids.remove(id);
            }
        }
        Ok(())
    }

    fn route_id(&self, prefix: &str) -> Result<String, DeviceError> {
        self.route_ids
            .get(prefix)
            .cloned()
            .ok_or_else(|| DeviceError::Protocol(format!("no switch route id known for {prefix}")))
    }

    /// The full entity an update writes: last known state plus `changes`.
    fn merged(
        &self,
        kind: EntityKind,
        id: &str,
        changes: &Properties,
        op: &Operation,
    ) -> ConfigEntity {
        let key = EntityKey::new(kind, id);
        let mut entity = self.live.get(&key).cloned().unwrap_or_else(|| {
            warn!(device = %self.name, entity = %key, "updating entity not seen by the last fetch");
            ConfigEntity::normalized(kind, id, Properties::new(), [])
        });
        entity.apply_changes(changes, op.depends_on());
        entity
    }
}

#[async_trait]
impl DeviceProtocol for ArubaSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, kinds: &[EntityKind]) -> Result<Vec<ConfigEntity>, DeviceError> {
        let mut entities = Vec::new();
        for &kind in kinds {
            let fetched = self.fetch_kind(kind).await?;
            debug!(device = %self.name, %kind, count = fetched.len(), "fetched live entities");
            entities.extend(fetched);
        }
        self.live.retain(|key, _| !kinds.contains(&key.kind));
        self.live.extend(entities.iter().map(|e| (e.key(), e.clone())));
        Ok(entities)
    }

    async fn apply_operation(&mut self, op: &Operation) -> Result<(), DeviceError> {
        match op {
            Operation::Create { entity } => {
                self.write(entity, true).await?;
                self.live.insert(entity.key(), entity.clone());
            }
            Operation::Update {
                kind, id, changes, ..
            } => {
                let merged = self.merged(*kind, id, changes, op);
                self.write(&merged, false).await?;
                self.live.insert(merged.key(), merged);
            }
            Operation::Delete { kind, id, .. } => {
                self.remove(*kind, id).await?;
                self.live.remove(&op.key());
            }
        }
        Ok(())
    }
}
