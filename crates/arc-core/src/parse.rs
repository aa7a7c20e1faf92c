// ── Declared configuration parser ──
//
// Turns raw, loosely typed declarations (as read from YAML or TOML) into a
// validated desired `ConfigSnapshot`. Validation never stops at the first
// problem: every violation of every entity is collected and reported.

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ValidationError, Violation};
use crate::model::schema::{self, DEFAULT_VLAN};
use crate::model::{
    ConfigEntity, ConfigSnapshot, EntityKey, EntityKind, Properties, PropertyValue, SnapshotOrigin,
};

// ── Raw declarations ────────────────────────────────────────────────

/// Every declared device, by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDesiredConfig {
    #[serde(default)]
    pub devices: IndexMap<String, RawDeviceConfig>,
}

/// Declarations for one device, grouped by kind. `entities` takes
/// entries with an explicit `kind` field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDeviceConfig {
    #[serde(default)]
    pub vlans: Vec<RawEntity>,
    #[serde(default)]
    pub interfaces: Vec<RawEntity>,
    #[serde(default)]
    pub acls: Vec<RawEntity>,
    #[serde(default)]
    pub acl_rules: Vec<RawEntity>,
    #[serde(default)]
    pub static_routes: Vec<RawEntity>,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntity {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub properties: IndexMap<String, serde_json::Value>,
}

/// Identifiers may be written as numbers (`id: 10`) or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Str(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Str(s) => s,
        }
    }
}

impl RawDeviceConfig {
    /// (section kind, position label, entity) for every declaration.
    fn sections(&self) -> impl Iterator<Item = (Option<EntityKind>, String, &RawEntity)> {
        let grouped = [
            (EntityKind::Vlan, &self.vlans),
            (EntityKind::Interface, &self.interfaces),
            (EntityKind::Acl, &self.acls),
            (EntityKind::AclRule, &self.acl_rules),
            (EntityKind::StaticRoute, &self.static_routes),
        ];
        let grouped = grouped.into_iter().flat_map(|(kind, list)| {
            list.iter()
                .enumerate()
                .map(move |(i, raw)| (Some(kind), format!("{}[{i}]", kind.section()), raw))
        });
        let generic = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, raw)| (None, format!("entities[{i}]"), raw));
        grouped.chain(generic)
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Parse every declared device. Each device is validated independently so
/// a broken declaration only affects its own device.
pub fn parse_config(raw: &RawDesiredConfig) -> Vec<(String, Result<ConfigSnapshot, ValidationError>)> {
    raw.devices
        .iter()
        .map(|(name, device)| (name.clone(), parse_device(name, device)))
        .collect()
}

/// Validate one device's declarations into a desired snapshot.
pub fn parse_device(device: &str, raw: &RawDeviceConfig) -> Result<ConfigSnapshot, ValidationError> {
    let mut violations = Vec::new();
    let mut entities = Vec::new();

    for (section_kind, label, raw_entity) in raw.sections() {
        if let Some(entity) = parse_entity(section_kind, &label, raw_entity, &mut violations) {
            entities.push(entity);
        }
    }

    match ConfigSnapshot::build(device, SnapshotOrigin::Desired, entities) {
        Ok(snapshot) if violations.is_empty() => {
            debug!(device, entities = snapshot.len(), "declared configuration is valid");
            Ok(snapshot)
        }
        Ok(_) => Err(ValidationError {
            device: device.to_owned(),
            violations,
        }),
        Err(structural) => {
            violations.extend(structural.violations);
            Err(ValidationError {
                device: device.to_owned(),
                violations,
            })
        }
    }
}

/// Returns the entity whenever its identity is sound, even if some of its
/// properties are not, so references to it still resolve and do not add
/// follow-up noise to the report.
fn parse_entity(
    section_kind: Option<EntityKind>,
    label: &str,
    raw: &RawEntity,
    violations: &mut Vec<Violation>,
) -> Option<ConfigEntity> {
    let mut report = |entity: &str, message: String| {
        violations.push(Violation {
            entity: entity.to_owned(),
            message,
        });
    };

    let kind = match (section_kind, raw.kind.as_deref()) {
        (Some(section), None) => section,
        (Some(section), Some(declared)) => {
            if declared != section.to_string() {
                report(label, format!("kind '{declared}' declared in the {} section", section.section()));
                return None;
            }
            section
        }
        (None, Some(declared)) => {
            if let Ok(kind) = declared.parse::<EntityKind>() {
                kind
            } else {
                report(label, format!("unknown entity kind '{declared}'"));
                return None;
            }
        }
        (None, None) => {
            report(label, "missing 'kind'".into());
            return None;
        }
    };

    let Some(id) = raw.id.clone().map(RawId::into_string) else {
        report(label, format!("{kind} declaration without 'id'"));
        return None;
    };
    let key = EntityKey::new(kind, id.clone());
    let name = key.to_string();

    if let Err(message) = schema::validate_identifier(kind, &id) {
        report(&name, message);
        return None;
    }

    let mut properties = Properties::new();
    for (prop, value) in &raw.properties {
        match to_property(value) {
            Ok(v) => {
                properties.insert(prop.clone(), v);
            }
            Err(message) => report(&name, format!("property '{prop}': {message}")),
        }
    }
    for message in schema::validate_properties(kind, &properties) {
        report(&name, message);
    }

    let mut explicit = Vec::new();
    for dep in &raw.depends_on {
        match dep.parse::<EntityKey>() {
            Ok(dep_key) if dep_key == EntityKey::vlan(DEFAULT_VLAN) => {
                report(&name, "the default VLAN 1 cannot be a dependency".into());
            }
            Ok(dep_key) => explicit.push(dep_key),
            Err(message) => report(&name, format!("depends_on: {message}")),
        }
    }

    // Only keep well-typed properties so dependency derivation stays sane.
    properties.retain(|prop, value| schema::check_property(kind, prop, value).is_ok());

    let entity = ConfigEntity::normalized(kind, id, properties, explicit);
    // A port in factory state is indistinguishable from an undeclared one:
    // the switch never reports it, so it could never converge.
    if kind == EntityKind::Interface && entity.properties.is_empty() {
        if entity.depends_on.is_empty() {
            debug!(entity = %name, "interface declares only defaults, ignoring");
        } else {
            report(
                &name,
                "an interface left at its defaults cannot declare depends_on".into(),
            );
        }
        return None;
    }
    Some(entity)
}

fn to_property(value: &serde_json::Value) -> Result<PropertyValue, String> {
    use serde_json::Value;
    match value {
        Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(PropertyValue::Int)
            .ok_or_else(|| format!("{n} is not an integer")),
        Value::String(s) => Ok(PropertyValue::Str(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(to_property)
            .collect::<Result<Vec<_>, _>>()
            .map(PropertyValue::List),
        Value::Null => Err("null is not a valid value".into()),
        Value::Object(_) => Err("nested objects are not supported".into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(yaml: &str) -> RawDeviceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn parses_a_valid_device() {
        let raw = device(
            r"
vlans:
  - id: 10
    name: users
  - id: 20
interfaces:
  - id: '1'
    untagged_vlan: 10
    tagged_vlans: [20]
    acl_in: guests
acls:
  - id: guests
    type: extended
acl_rules:
  - id: guests/10
    action: deny
    destination: 10.0.0.0/8
static_routes:
  - id: 0.0.0.0/0
    gateway: 192.0.2.1
",
        );
        let snap = parse_device("core-1", &raw).unwrap();
        assert_eq!(snap.len(), 6);

        let port = snap.get(&EntityKey::new(EntityKind::Interface, "1")).unwrap();
        assert_eq!(port.depends_on.len(), 3);

        let rule = snap.get(&EntityKey::new(EntityKind::AclRule, "guests/10")).unwrap();
        assert!(rule.depends_on.contains(&EntityKey::new(EntityKind::Acl, "guests")));
        assert!(rule.property("protocol").is_none(), "default protocol is not stored");
    }

    #[test]
    fn vlan_ids_are_taken_as_written_by_the_switch() {
        let raw = device("vlans:\n  - id: '010'\n  - id: 10\n  - id: '+10'\n");
        let err = parse_device("core-1", &raw).unwrap_err();
        let entities: Vec<&str> = err.violations.iter().map(|v| v.entity.as_str()).collect();
        assert_eq!(entities, vec!["vlan:010", "vlan:+10"]);
        assert!(err.violations[0].message.contains("'10'"));
    }

    #[test]
    fn default_interface_cannot_carry_dependencies() {
        let raw = device("vlans: [{ id: 10 }]\ninterfaces:\n  - id: '3'\n    depends_on: ['vlan:10']\n");
        let err = parse_device("core-1", &raw).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].entity, "interface:3");
        assert!(err.violations[0].message.contains("depends_on"));

        let plain = device("interfaces: [{ id: '3', poe_enabled: true }]\n");
        assert!(parse_device("core-1", &plain).unwrap().is_empty());
    }

    #[test]
    fn reports_every_violation() {
        let raw = device(
            r"
vlans:
  - id: 1
  - id: 10
    name: this-name-is-far-too-long-for-a-vlan-on-aruba
  - id: 10
interfaces:
  - id: '2'
    untagged_vlan: 30
    speed: 1000
acl_rules:
  - id: guests/5
",
        );
        let err = parse_device("core-1", &raw).unwrap_err();
        let messages: Vec<String> = err.violations.iter().map(ToString::to_string).collect();

        assert!(messages.iter().any(|m| m.contains("default VLAN 1")), "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("longer than 32")), "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("duplicate vlan")), "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("unknown property 'speed'")), "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("references vlan:30")), "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("required property 'action'")), "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("references acl:guests")), "{messages:#?}");
    }

    #[test]
    fn generic_entities_need_a_known_kind() {
        let raw = device(
            r"
entities:
  - kind: bridge
    id: br0
  - kind: vlan
    id: 30
",
        );
        let err = parse_device("edge", &raw).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].entity, "entities[0]");
    }

    #[test]
    fn explicit_dependencies_are_kept() {
        let raw = device(
            r"
vlans:
  - id: 10
  - id: 20
    depends_on: ['vlan:10']
",
        );
        let snap = parse_device("edge", &raw).unwrap();
        let vlan20 = snap.get(&EntityKey::vlan(20)).unwrap();
        assert!(vlan20.depends_on.contains(&EntityKey::vlan(10)));
    }

    #[test]
    fn factory_default_interfaces_are_not_declared() {
        let raw = device(
            r"
interfaces:
  - id: '3'
    enabled: true
    untagged_vlan: 1
",
        );
        let snap = parse_device("edge", &raw).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn devices_are_validated_independently() {
        let raw: RawDesiredConfig = serde_yaml::from_str(
            r"
devices:
  good:
    vlans: [{ id: 10 }]
  bad:
    vlans: [{ id: 5000 }]
",
        )
        .unwrap();
        let parsed = parse_config(&raw);
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].1.is_ok());
        assert!(parsed[1].1.is_err());
    }
}
