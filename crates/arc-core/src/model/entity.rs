// ── Configuration entity types ──
//
// `EntityKey` (kind + identifier) is the stable identity every other
// component keys on: snapshots, the diff, and the dependency graph.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::schema;

// ── EntityKind ──────────────────────────────────────────────────────

/// The configuration primitives the engine reconciles.
///
/// Declaration order doubles as the canonical sort order of snapshots.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Vlan,
    Interface,
    Acl,
    AclRule,
    StaticRoute,
}

impl EntityKind {
    /// Section name used in declared configuration files.
    pub fn section(self) -> &'static str {
        match self {
            Self::Vlan => "vlans",
            Self::Interface => "interfaces",
            Self::Acl => "acls",
            Self::AclRule => "acl_rules",
            Self::StaticRoute => "static_routes",
        }
    }

    /// All kinds, in canonical order.
    pub fn all() -> Vec<Self> {
        <Self as strum::IntoEnumIterator>::iter().collect()
    }
}

// ── EntityKey ───────────────────────────────────────────────────────

/// Stable identity of an entity on one device: `kind:identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn vlan(vlan_id: i64) -> Self {
        Self::new(EntityKind::Vlan, vlan_id.to_string())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for EntityKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'kind:identifier', got '{s}'"))?;
        let kind = kind
            .parse::<EntityKind>()
            .map_err(|_| format!("unknown entity kind '{kind}' in '{s}'"))?;
        if id.is_empty() {
            return Err(format!("empty identifier in '{s}'"));
        }
        Ok(Self::new(kind, id))
    }
}

impl Serialize for EntityKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── PropertyValue ───────────────────────────────────────────────────

/// A typed property value.
///
/// `Null` only appears in update change maps, where it means "reset this
/// property to the device default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "(default)"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u16> for PropertyValue {
    fn from(i: u16) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Ordered attribute map. Equality is order-independent (map semantics).
pub type Properties = IndexMap<String, PropertyValue>;

// ── ConfigEntity ────────────────────────────────────────────────────

/// A named, typed configuration object on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntity {
    pub kind: EntityKind,
    pub id: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<EntityKey>,
}

impl ConfigEntity {
    /// Build an entity in canonical form: properties at their device
    /// default are dropped and dependencies are derived from the
    /// reference-carrying properties, plus any `extra_deps`.
    pub fn normalized(
        kind: EntityKind,
        id: impl Into<String>,
        mut properties: Properties,
        extra_deps: impl IntoIterator<Item = EntityKey>,
    ) -> Self {
        let id = id.into();
        schema::canonicalize(kind, &id, &mut properties);
        let mut depends_on = schema::derive_dependencies(kind, &id, &properties);
        depends_on.extend(extra_deps);
        Self {
            kind,
            id,
            properties,
            depends_on,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind, self.id.clone())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Apply an update change map: `Null` removes, anything else sets.
    /// Dependencies are replaced wholesale by `depends_on`.
    pub fn apply_changes(&mut self, changes: &Properties, depends_on: &BTreeSet<EntityKey>) {
        for (name, value) in changes {
            if value.is_null() {
                self.properties.shift_remove(name);
            } else {
                self.properties.insert(name.clone(), value.clone());
            }
        }
        self.depends_on.clone_from(depends_on);
    }
}
