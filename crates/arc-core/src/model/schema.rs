// ── Per-kind property schema ──
//
// Which properties each entity kind accepts, their types, ranges and
// device defaults. Shared by the parser (validation) and by live-state
// normalization so both sides of a diff land in the same canonical form:
// properties at their default value are absent, VLAN lists are sorted.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use super::entity::{EntityKey, EntityKind, Properties, PropertyValue};

/// The switch default VLAN. Always present, never modelled.
pub const DEFAULT_VLAN: i64 = 1;

pub const MAX_VLAN_ID: i64 = 4094;
pub const MAX_VLAN_NAME_LEN: usize = 32;
pub const MAX_PORT_NAME_LEN: usize = 64;
pub const MAX_ACL_NAME_LEN: usize = 64;

pub const ACL_TYPES: &[&str] = &["standard", "extended"];
pub const RULE_ACTIONS: &[&str] = &["permit", "deny"];
pub const RULE_PROTOCOLS: &[&str] = &["ip", "tcp", "udp", "icmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    Int { min: i64, max: i64 },
    Str { max_len: usize },
    Choice(&'static [&'static str]),
    /// `any` or an IPv4 CIDR prefix.
    Address,
    /// Plain IPv4 address.
    Ipv4,
    /// List of VLAN ids.
    VlanList,
    /// Reference to an ACL by name.
    AclName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
    EmptyList,
}

impl DefaultValue {
    fn matches(self, value: &PropertyValue) -> bool {
        match (self, value) {
            (Self::Bool(d), PropertyValue::Bool(v)) => d == *v,
            (Self::Int(d), PropertyValue::Int(v)) => d == *v,
            (Self::Str(d), PropertyValue::Str(v)) => d == v,
            (Self::EmptyList, PropertyValue::List(v)) => v.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub ty: PropertyType,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

const fn prop(name: &'static str, ty: PropertyType, default: Option<DefaultValue>) -> PropertySpec {
    PropertySpec {
        name,
        ty,
        required: false,
        default,
    }
}

const VLAN_PROPS: &[PropertySpec] = &[
    // The default name ("VLAN<id>") depends on the id; see `is_default`.
    prop("name", PropertyType::Str { max_len: MAX_VLAN_NAME_LEN }, None),
    prop("voice", PropertyType::Bool, Some(DefaultValue::Bool(false))),
    prop("jumbo", PropertyType::Bool, Some(DefaultValue::Bool(false))),
];

const INTERFACE_PROPS: &[PropertySpec] = &[
    prop("name", PropertyType::Str { max_len: MAX_PORT_NAME_LEN }, Some(DefaultValue::Str(""))),
    prop("enabled", PropertyType::Bool, Some(DefaultValue::Bool(true))),
    prop("poe_enabled", PropertyType::Bool, Some(DefaultValue::Bool(true))),
    prop(
        "untagged_vlan",
        PropertyType::Int { min: 1, max: MAX_VLAN_ID },
        Some(DefaultValue::Int(DEFAULT_VLAN)),
    ),
    prop("tagged_vlans", PropertyType::VlanList, Some(DefaultValue::EmptyList)),
    prop("acl_in", PropertyType::AclName, None),
];

const ACL_PROPS: &[PropertySpec] = &[prop(
    "type",
    PropertyType::Choice(ACL_TYPES),
    Some(DefaultValue::Str("standard")),
)];

const ACL_RULE_PROPS: &[PropertySpec] = &[
    PropertySpec {
        name: "action",
        ty: PropertyType::Choice(RULE_ACTIONS),
        required: true,
        default: None,
    },
    prop("protocol", PropertyType::Choice(RULE_PROTOCOLS), Some(DefaultValue::Str("ip"))),
    prop("source", PropertyType::Address, Some(DefaultValue::Str("any"))),
    prop("destination", PropertyType::Address, Some(DefaultValue::Str("any"))),
];

const STATIC_ROUTE_PROPS: &[PropertySpec] = &[
    prop("gateway", PropertyType::Ipv4, None),
    prop("vlan", PropertyType::Int { min: 1, max: MAX_VLAN_ID }, None),
    prop("distance", PropertyType::Int { min: 1, max: 255 }, Some(DefaultValue::Int(1))),
    prop("name", PropertyType::Str { max_len: 32 }, Some(DefaultValue::Str(""))),
];

/// Accepted properties for `kind`.
pub fn properties_for(kind: EntityKind) -> &'static [PropertySpec] {
    match kind {
        EntityKind::Vlan => VLAN_PROPS,
        EntityKind::Interface => INTERFACE_PROPS,
        EntityKind::Acl => ACL_PROPS,
        EntityKind::AclRule => ACL_RULE_PROPS,
        EntityKind::StaticRoute => STATIC_ROUTE_PROPS,
    }
}

pub fn spec_for(kind: EntityKind, name: &str) -> Option<&'static PropertySpec> {
    properties_for(kind).iter().find(|p| p.name == name)
}

fn is_default(kind: EntityKind, id: &str, name: &str, value: &PropertyValue) -> bool {
    if kind == EntityKind::Vlan && name == "name" {
        return value
            .as_str()
            .is_some_and(|s| s.is_empty() || s == format!("VLAN{id}"));
    }
    spec_for(kind, name)
        .and_then(|spec| spec.default)
        .is_some_and(|d| d.matches(value))
}

/// Bring `properties` into canonical form: drop values equal to the device
/// default and sort VLAN lists.
pub fn canonicalize(kind: EntityKind, id: &str, properties: &mut Properties) {
    properties.retain(|name, value| !is_default(kind, id, name, value));
    for (name, value) in properties.iter_mut() {
        let is_vlan_list = spec_for(kind, name).is_some_and(|s| s.ty == PropertyType::VlanList);
        if is_vlan_list {
            if let PropertyValue::List(items) = value {
                items.sort_by_key(|v| v.as_int().unwrap_or(i64::MAX));
            }
        }
    }
}

/// Dependencies implied by reference-carrying properties.
///
/// The default VLAN is never a dependency target.
pub fn derive_dependencies(kind: EntityKind, id: &str, properties: &Properties) -> BTreeSet<EntityKey> {
    let mut deps = BTreeSet::new();
    let mut add_vlan = |value: &PropertyValue| {
        if let Some(vid) = value.as_int() {
            if vid != DEFAULT_VLAN {
                deps.insert(EntityKey::vlan(vid));
            }
        }
    };

    match kind {
        EntityKind::Interface => {
            if let Some(v) = properties.get("untagged_vlan") {
                add_vlan(v);
            }
            if let Some(list) = properties.get("tagged_vlans").and_then(PropertyValue::as_list) {
                list.iter().for_each(&mut add_vlan);
            }
            if let Some(acl) = properties.get("acl_in").and_then(PropertyValue::as_str) {
                deps.insert(EntityKey::new(EntityKind::Acl, acl));
            }
        }
        EntityKind::StaticRoute => {
            if let Some(v) = properties.get("vlan") {
                add_vlan(v);
            }
        }
        EntityKind::AclRule => {
            if let Some((acl, _)) = id.split_once('/') {
                deps.insert(EntityKey::new(EntityKind::Acl, acl));
            }
        }
        EntityKind::Vlan | EntityKind::Acl => {}
    }
    deps
}

// ── Identifier rules ────────────────────────────────────────────────

/// Check that `id` is well formed for `kind`.
pub fn validate_identifier(kind: EntityKind, id: &str) -> Result<(), String> {
    match kind {
        EntityKind::Vlan => {
            let vid: i64 = id
                .parse()
                .map_err(|_| format!("VLAN id '{id}' is not a number"))?;
            // The switch reports "10"; "010" or "+10" would never match it.
            if vid.to_string() != id {
                return Err(format!("VLAN id '{id}' must be written as '{vid}'"));
            }
            if vid == DEFAULT_VLAN {
                return Err("the default VLAN 1 always exists and cannot be declared".into());
            }
            if !(1..=MAX_VLAN_ID).contains(&vid) {
                return Err(format!("VLAN id {vid} is outside 1-{MAX_VLAN_ID}"));
            }
            Ok(())
        }
        EntityKind::Interface => {
            let valid = !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'));
            if valid {
                Ok(())
            } else {
                Err(format!("interface id '{id}' is not a valid port identifier"))
            }
        }
        EntityKind::Acl => validate_acl_name(id),
        EntityKind::AclRule => {
            let (acl, seq) = id
                .split_once('/')
                .ok_or_else(|| format!("ACL rule id '{id}' must be '<acl>/<sequence>'"))?;
            validate_acl_name(acl)?;
            match seq.parse::<u32>() {
                Ok(n) if n.to_string() != seq => {
                    Err(format!("ACL rule sequence '{seq}' must be written as '{n}'"))
                }
                Ok(n) if n > 0 => Ok(()),
                _ => Err(format!("ACL rule sequence '{seq}' must be a positive integer")),
            }
        }
        EntityKind::StaticRoute => {
            let (addr, len) = parse_cidr(id)
                .ok_or_else(|| format!("static route id '{id}' is not an IPv4 CIDR prefix"))?;
            if network_address(addr, len) != addr {
                return Err(format!("static route '{id}' has host bits set"));
            }
            if format!("{addr}/{len}") != id {
                return Err(format!("static route '{id}' must be written as '{addr}/{len}'"));
            }
            Ok(())
        }
    }
}

fn validate_acl_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        Err("ACL name must not be empty".into())
    } else if name.contains('/') {
        Err(format!("ACL name '{name}' must not contain '/'"))
    } else if name.len() > MAX_ACL_NAME_LEN {
        Err(format!("ACL name '{name}' is longer than {MAX_ACL_NAME_LEN} characters"))
    } else {
        Ok(())
    }
}

// ── Property rules ──────────────────────────────────────────────────

/// Validate `properties` of one entity, returning every problem found.
pub fn validate_properties(kind: EntityKind, properties: &Properties) -> Vec<String> {
    let mut problems = Vec::new();

    for (name, value) in properties {
        if let Err(e) = check_property(kind, name, value) {
            problems.push(e);
        }
    }

    for spec in properties_for(kind).iter().filter(|s| s.required) {
        if !properties.contains_key(spec.name) {
            problems.push(format!("missing required property '{}'", spec.name));
        }
    }

    match kind {
        EntityKind::Interface => check_interface(properties, &mut problems),
        EntityKind::StaticRoute => {
            let has_gateway = properties.contains_key("gateway");
            let has_vlan = properties.contains_key("vlan");
            if has_gateway == has_vlan {
                problems.push("a static route needs exactly one of 'gateway' or 'vlan'".into());
            }
        }
        EntityKind::Vlan | EntityKind::Acl | EntityKind::AclRule => {}
    }

    problems
}

/// Type and range check of a single property, ignoring its siblings.
pub fn check_property(kind: EntityKind, name: &str, value: &PropertyValue) -> Result<(), String> {
    let spec = spec_for(kind, name).ok_or_else(|| format!("unknown property '{name}' for {kind}"))?;
    check_type(spec.ty, value).map_err(|e| format!("property '{name}': {e}"))
}

fn check_interface(properties: &Properties, problems: &mut Vec<String>) {
    let Some(tagged) = properties.get("tagged_vlans").and_then(PropertyValue::as_list) else {
        return;
    };
    let mut seen = BTreeSet::new();
    for vid in tagged.iter().filter_map(PropertyValue::as_int) {
        if !seen.insert(vid) {
            problems.push(format!("VLAN {vid} is listed twice in 'tagged_vlans'"));
        }
    }
    let untagged = properties
        .get("untagged_vlan")
        .and_then(PropertyValue::as_int)
        .unwrap_or(DEFAULT_VLAN);
    if seen.contains(&untagged) {
        problems.push(format!("VLAN {untagged} is both untagged and tagged"));
    }
}

fn check_type(ty: PropertyType, value: &PropertyValue) -> Result<(), String> {
    let mismatch = |expected: &str| format!("expected {expected}, got {}", value.type_name());
    match ty {
        PropertyType::Bool => value.as_bool().map(|_| ()).ok_or_else(|| mismatch("a boolean")),
        PropertyType::Int { min, max } => {
            let i = value.as_int().ok_or_else(|| mismatch("an integer"))?;
            if (min..=max).contains(&i) {
                Ok(())
            } else {
                Err(format!("{i} is outside {min}-{max}"))
            }
        }
        PropertyType::Str { max_len } => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            if s.chars().count() > max_len {
                Err(format!("'{s}' is longer than {max_len} characters"))
            } else {
                Ok(())
            }
        }
        PropertyType::Choice(choices) => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            if choices.contains(&s) {
                Ok(())
            } else {
                Err(format!("'{s}' is not one of {}", choices.join("|")))
            }
        }
        PropertyType::Address => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            if s == "any" || parse_cidr(s).is_some() {
                Ok(())
            } else {
                Err(format!("'{s}' is neither 'any' nor an IPv4 CIDR prefix"))
            }
        }
        PropertyType::Ipv4 => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            s.parse::<Ipv4Addr>()
                .map(|_| ())
                .map_err(|_| format!("'{s}' is not an IPv4 address"))
        }
        PropertyType::VlanList => {
            let items = value.as_list().ok_or_else(|| mismatch("a list"))?;
            for item in items {
                check_type(PropertyType::Int { min: 1, max: MAX_VLAN_ID }, item)?;
            }
            Ok(())
        }
        PropertyType::AclName => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            validate_acl_name(s)
        }
    }
}

// ── IPv4 helpers ────────────────────────────────────────────────────

/// Parse `a.b.c.d/len`.
pub fn parse_cidr(s: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, len) = s.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let len: u8 = len.parse().ok()?;
    (len <= 32).then_some((addr, len))
}

pub fn prefix_to_mask(len: u8) -> Ipv4Addr {
    let bits = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len.min(32))) };
    Ipv4Addr::from(bits)
}

/// Prefix length of a contiguous netmask, `None` for non-contiguous masks.
pub fn mask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let len = bits.leading_ones();
    (bits.checked_shl(len).unwrap_or(0) == 0).then(|| u8::try_from(len).unwrap_or(32))
}

pub fn network_address(addr: Ipv4Addr, len: u8) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) & u32::from(prefix_to_mask(len)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, PropertyValue)]) -> Properties {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn default_vlan_cannot_be_declared() {
        let err = validate_identifier(EntityKind::Vlan, "1").unwrap_err();
        assert!(err.contains("default VLAN"));
        assert!(validate_identifier(EntityKind::Vlan, "4095").is_err());
        assert!(validate_identifier(EntityKind::Vlan, "10").is_ok());
    }

    #[test]
    fn numeric_ids_must_be_canonical() {
        for id in ["010", "+10", " 10"] {
            let err = validate_identifier(EntityKind::Vlan, id).unwrap_err();
            assert!(err.contains("'10'") || err.contains("not a number"), "{id}: {err}");
        }
        assert!(validate_identifier(EntityKind::AclRule, "guests/010").is_err());
        assert!(validate_identifier(EntityKind::StaticRoute, "10.20.0.0/016").is_err());
    }

    #[test]
    fn acl_rule_ids_need_acl_and_sequence() {
        assert!(validate_identifier(EntityKind::AclRule, "guests/10").is_ok());
        assert!(validate_identifier(EntityKind::AclRule, "guests").is_err());
        assert!(validate_identifier(EntityKind::AclRule, "/10").is_err());
        assert!(validate_identifier(EntityKind::AclRule, "guests/0").is_err());
    }

    #[test]
    fn route_ids_must_be_network_prefixes() {
        assert!(validate_identifier(EntityKind::StaticRoute, "10.20.0.0/16").is_ok());
        assert!(validate_identifier(EntityKind::StaticRoute, "10.20.0.1/16").is_err());
        assert!(validate_identifier(EntityKind::StaticRoute, "10.20.0.0").is_err());
    }

    #[test]
    fn collects_every_property_problem() {
        let p = props(&[
            ("name", "x".repeat(40).into()),
            ("voice", 3i64.into()),
            ("colour", "blue".into()),
        ]);
        let problems = validate_properties(EntityKind::Vlan, &p);
        assert_eq!(problems.len(), 3, "{problems:?}");
    }

    #[test]
    fn tagged_list_rules() {
        let p = props(&[
            ("untagged_vlan", 10i64.into()),
            (
                "tagged_vlans",
                PropertyValue::List(vec![20i64.into(), 10i64.into(), 20i64.into()]),
            ),
        ]);
        let problems = validate_properties(EntityKind::Interface, &p);
        assert!(problems.iter().any(|p| p.contains("listed twice")));
        assert!(problems.iter().any(|p| p.contains("both untagged and tagged")));
    }

    #[test]
    fn route_needs_exactly_one_next_hop() {
        let both = props(&[("gateway", "10.0.0.1".into()), ("vlan", 20i64.into())]);
        assert_eq!(validate_properties(EntityKind::StaticRoute, &both).len(), 1);
        assert_eq!(validate_properties(EntityKind::StaticRoute, &Properties::new()).len(), 1);
    }

    #[test]
    fn rule_action_is_required() {
        let problems = validate_properties(EntityKind::AclRule, &Properties::new());
        assert_eq!(problems, vec!["missing required property 'action'".to_owned()]);
    }

    #[test]
    fn canonicalize_drops_defaults_and_sorts_lists() {
        let mut p = props(&[
            ("name", "VLAN10".into()),
            ("voice", false.into()),
            ("jumbo", true.into()),
        ]);
        canonicalize(EntityKind::Vlan, "10", &mut p);
        assert_eq!(p, props(&[("jumbo", true.into())]));

        let mut p = props(&[
            ("enabled", true.into()),
            ("tagged_vlans", PropertyValue::List(vec![30i64.into(), 20i64.into()])),
        ]);
        canonicalize(EntityKind::Interface, "1", &mut p);
        assert_eq!(
            p,
            props(&[("tagged_vlans", PropertyValue::List(vec![20i64.into(), 30i64.into()]))])
        );
    }

    #[test]
    fn interface_dependencies_skip_default_vlan() {
        let p = props(&[
            ("untagged_vlan", 10i64.into()),
            ("tagged_vlans", PropertyValue::List(vec![1i64.into(), 20i64.into()])),
            ("acl_in", "guests".into()),
        ]);
        let deps = derive_dependencies(EntityKind::Interface, "1", &p);
        let expected: BTreeSet<EntityKey> = [
            EntityKey::vlan(10),
            EntityKey::vlan(20),
            EntityKey::new(EntityKind::Acl, "guests"),
        ]
        .into_iter()
        .collect();
        assert_eq!(deps, expected);
    }

    #[test]
    fn mask_conversions() {
        assert_eq!(prefix_to_mask(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(prefix_to_mask(0), Ipv4Addr::UNSPECIFIED);
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 0, 0)), Some(16));
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 255, 255)), Some(32));
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 0, 255, 0)), None);
    }
}
