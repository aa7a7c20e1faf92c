// Aruba wire payloads <-> canonical entities.
//
// Decoding runs every entity through `ConfigEntity::normalized`, so values
// at their switch default vanish and the default VLAN never shows up as a
// dependency. Ports left in factory state decode to no entity at all.

use std::net::Ipv4Addr;

use arc_api::{
    Acl, AclAction, AclRule, AclType, IpAddress, IpRoute, Port, PortConfig, PortMode, PortPoe,
    RouteMode, TrafficMatch, Vlan, VlanPort,
};

use crate::model::schema::{self, DEFAULT_VLAN};
use crate::model::{ConfigEntity, EntityKind, Properties, PropertyValue};

fn props() -> Properties {
    Properties::new()
}

// ── VLANs ───────────────────────────────────────────────────────────

pub(super) fn vlan_from_wire(vlan: &Vlan) -> Option<ConfigEntity> {
    if i64::from(vlan.vlan_id) == DEFAULT_VLAN {
        return None;
    }
    let mut p = props();
    p.insert("name".into(), vlan.name.clone().into());
    p.insert("voice".into(), vlan.is_voice_enabled.into());
    p.insert("jumbo".into(), vlan.is_jumbo_enabled.into());
    Some(ConfigEntity::normalized(EntityKind::Vlan, vlan.vlan_id.to_string(), p, []))
}

pub(super) fn vlan_to_wire(entity: &ConfigEntity) -> Result<Vlan, String> {
    let vlan_id = vlan_id(&entity.id)?;
    Ok(Vlan {
        vlan_id,
        name: str_prop(entity, "name").map_or_else(|| format!("VLAN{vlan_id}"), str::to_owned),
        is_jumbo_enabled: bool_prop(entity, "jumbo").unwrap_or(false),
        is_voice_enabled: bool_prop(entity, "voice").unwrap_or(false),
        status: None,
        vlan_type: None,
    })
}

pub(super) fn vlan_id(id: &str) -> Result<u16, String> {
    id.parse().map_err(|_| format!("'{id}' is not a VLAN id"))
}

// ── Interfaces ──────────────────────────────────────────────────────

/// Merge port admin state, VLAN membership and PoE state into one
/// interface. `None` for ports in factory state.
pub(super) fn interface_from_wire(
    port: &Port,
    memberships: &[VlanPort],
    poe: Option<&PortPoe>,
) -> Option<ConfigEntity> {
    let mine = || memberships.iter().filter(|m| m.port_id == port.id);
    let untagged = mine()
        .find(|m| m.port_mode == PortMode::Untagged)
        .map_or(DEFAULT_VLAN, |m| i64::from(m.vlan_id));
    let tagged: Vec<PropertyValue> = mine()
        .filter(|m| m.port_mode == PortMode::Tagged)
        .map(|m| PropertyValue::Int(i64::from(m.vlan_id)))
        .collect();

    let mut p = props();
    p.insert("name".into(), port.name.clone().into());
    p.insert("enabled".into(), port.is_port_enabled.into());
    if let Some(poe) = poe {
        p.insert("poe_enabled".into(), poe.is_poe_enabled.into());
    }
    p.insert("untagged_vlan".into(), untagged.into());
    p.insert("tagged_vlans".into(), PropertyValue::List(tagged));
    if let Some(acl) = port.ipv4_acl_in.as_deref().filter(|a| !a.is_empty()) {
        p.insert("acl_in".into(), acl.into());
    }

    let entity = ConfigEntity::normalized(EntityKind::Interface, port.id.clone(), p, []);
    (!entity.properties.is_empty()).then_some(entity)
}

pub(super) fn port_to_wire(entity: &ConfigEntity) -> Result<PortConfig, String> {
    let untagged = match entity.property("untagged_vlan") {
        Some(v) => vlan_id_value(v)?,
        None => 1,
    };
    let tagged = match entity.property("tagged_vlans").and_then(PropertyValue::as_list) {
        Some(list) => list.iter().map(vlan_id_value).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(PortConfig {
        id: entity.id.clone(),
        name: str_prop(entity, "name").unwrap_or_default().to_owned(),
        is_port_enabled: bool_prop(entity, "enabled").unwrap_or(true),
        is_poe_enabled: Some(bool_prop(entity, "poe_enabled").unwrap_or(true)),
        untagged_vlan: untagged,
        tagged_vlans: tagged,
        ipv4_acl_in: str_prop(entity, "acl_in").map(str::to_owned),
    })
}

/// Factory configuration for a port; what an interface delete writes.
pub(super) fn port_defaults(port_id: &str) -> PortConfig {
    PortConfig {
        id: port_id.to_owned(),
        name: String::new(),
        is_port_enabled: true,
        is_poe_enabled: Some(true),
        untagged_vlan: 1,
        tagged_vlans: Vec::new(),
        ipv4_acl_in: None,
    }
}

fn vlan_id_value(value: &PropertyValue) -> Result<u16, String> {
    value
        .as_int()
        .and_then(|i| u16::try_from(i).ok())
        .ok_or_else(|| format!("{value} is not a VLAN id"))
}

// ── ACLs ────────────────────────────────────────────────────────────

pub(super) fn acl_from_wire(acl: &Acl) -> ConfigEntity {
    let kind = match acl.acl_type {
        AclType::Standard => "standard",
        AclType::Extended => "extended",
    };
    let mut p = props();
    p.insert("type".into(), kind.into());
    ConfigEntity::normalized(EntityKind::Acl, acl.acl_name.clone(), p, [])
}

pub(super) fn acl_to_wire(entity: &ConfigEntity) -> Acl {
    let acl_type = match str_prop(entity, "type") {
        Some("extended") => AclType::Extended,
        _ => AclType::Standard,
    };
    Acl {
        id: entity.id.clone(),
        acl_name: entity.id.clone(),
        acl_type,
    }
}

/// Decode a rule. Rules matching on a wildcard (non-contiguous) mask are
/// not modelled and decode to `None`.
pub(super) fn acl_rule_from_wire(acl_name: &str, rule: &AclRule) -> Option<ConfigEntity> {
    let action = match rule.acl_action {
        AclAction::Permit => "permit",
        AclAction::Deny => "deny",
    };
    let tm = &rule.traffic_match;
    let mut p = props();
    p.insert("action".into(), action.into());
    p.insert(
        "protocol".into(),
        tm.protocol_type
            .as_deref()
            .map_or_else(|| "ip".to_owned(), str::to_ascii_lowercase)
            .into(),
    );
    p.insert(
        "source".into(),
        address_from_wire(tm.source_ip_address.as_ref(), tm.source_ip_mask.as_ref())?.into(),
    );
    p.insert(
        "destination".into(),
        address_from_wire(tm.destination_ip_address.as_ref(), tm.destination_ip_mask.as_ref())?
            .into(),
    );
    let id = format!("{acl_name}/{}", rule.sequence_no);
    Some(ConfigEntity::normalized(EntityKind::AclRule, id, p, []))
}

pub(super) fn acl_rule_to_wire(entity: &ConfigEntity) -> Result<AclRule, String> {
    let (acl, seq) = split_rule_id(&entity.id)?;
    let acl_action = match str_prop(entity, "action") {
        Some("permit") => AclAction::Permit,
        Some("deny") => AclAction::Deny,
        other => return Err(format!("invalid rule action {other:?}")),
    };
    let (source_ip_address, source_ip_mask) = address_to_wire(str_prop(entity, "source"))?;
    let (destination_ip_address, destination_ip_mask) =
        address_to_wire(str_prop(entity, "destination"))?;
    Ok(AclRule {
        acl_id: acl.to_owned(),
        sequence_no: seq,
        acl_action,
        traffic_match: TrafficMatch {
            protocol_type: Some(str_prop(entity, "protocol").unwrap_or("ip").to_ascii_uppercase()),
            source_ip_address,
            source_ip_mask,
            destination_ip_address,
            destination_ip_mask,
        },
    })
}

pub(super) fn split_rule_id(id: &str) -> Result<(&str, u32), String> {
    let (acl, seq) = id
        .split_once('/')
        .ok_or_else(|| format!("'{id}' is not an ACL rule id"))?;
    let seq = seq
        .parse()
        .map_err(|_| format!("'{seq}' is not a rule sequence number"))?;
    Ok((acl, seq))
}

/// `any`, a CIDR prefix, or `None` for a wildcard mask.
fn address_from_wire(addr: Option<&IpAddress>, mask: Option<&IpAddress>) -> Option<String> {
    let parsed = addr
        .and_then(|a| a.octets.parse::<Ipv4Addr>().ok())
        .zip(mask.and_then(|m| m.octets.parse::<Ipv4Addr>().ok()));
    match parsed {
        Some((addr, mask)) if !mask.is_unspecified() => {
            schema::mask_to_prefix(mask).map(|len| format!("{addr}/{len}"))
        }
        _ => Some("any".to_owned()),
    }
}

#[allow(clippy::type_complexity)]
fn address_to_wire(value: Option<&str>) -> Result<(Option<IpAddress>, Option<IpAddress>), String> {
    match value {
        None | Some("any") => Ok((None, None)),
        Some(cidr) => {
            let (addr, len) =
                schema::parse_cidr(cidr).ok_or_else(|| format!("'{cidr}' is not a CIDR prefix"))?;
            Ok((
                Some(IpAddress::v4(addr.to_string())),
                Some(IpAddress::v4(schema::prefix_to_mask(len).to_string())),
            ))
        }
    }
}

// ── Static routes ───────────────────────────────────────────────────

/// Decode a route. Black-hole and reject routes are not modelled and
/// decode to `Ok(None)`.
pub(super) fn route_from_wire(route: &IpRoute) -> Result<Option<ConfigEntity>, String> {
    let dest: Ipv4Addr = route
        .destination
        .octets
        .parse()
        .map_err(|_| format!("route destination '{}' is not IPv4", route.destination.octets))?;
    let mask: Ipv4Addr = route
        .mask
        .octets
        .parse()
        .map_err(|_| format!("route mask '{}' is not IPv4", route.mask.octets))?;
    let len = schema::mask_to_prefix(mask)
        .ok_or_else(|| format!("route mask {mask} is not contiguous"))?;

    let mut p = props();
    match route.ip_route_mode {
        RouteMode::Gateway => {
            let gw = route
                .gateway
                .as_ref()
                .ok_or_else(|| format!("gateway route {dest}/{len} without gateway"))?;
            p.insert("gateway".into(), gw.octets.clone().into());
        }
        RouteMode::Vlan => {
            let vid = route
                .vlan_id
                .ok_or_else(|| format!("VLAN route {dest}/{len} without VLAN"))?;
            p.insert("vlan".into(), vid.into());
        }
        RouteMode::BlackHole | RouteMode::Reject => return Ok(None),
    }
    if let Some(distance) = route.distance {
        p.insert("distance".into(), PropertyValue::Int(i64::from(distance)));
    }
    if let Some(name) = &route.name {
        p.insert("name".into(), name.clone().into());
    }

    let id = format!("{}/{len}", schema::network_address(dest, len));
    Ok(Some(ConfigEntity::normalized(EntityKind::StaticRoute, id, p, [])))
}

pub(super) fn route_to_wire(entity: &ConfigEntity) -> Result<IpRoute, String> {
    let (dest, len) = schema::parse_cidr(&entity.id)
        .ok_or_else(|| format!("'{}' is not a CIDR prefix", entity.id))?;
    let gateway = str_prop(entity, "gateway").map(IpAddress::v4);
    let vlan = match entity.property("vlan") {
        Some(v) => Some(vlan_id_value(v)?),
        None => None,
    };
    let ip_route_mode = match (&gateway, vlan) {
        (Some(_), None) => RouteMode::Gateway,
        (None, Some(_)) => RouteMode::Vlan,
        _ => return Err(format!("route {} needs exactly one of gateway or vlan", entity.id)),
    };
    let distance = match entity.property("distance").and_then(PropertyValue::as_int) {
        Some(d) => u8::try_from(d).map_err(|_| format!("route distance {d} out of range"))?,
        None => 1,
    };
    Ok(IpRoute {
        id: String::new(),
        destination: IpAddress::v4(dest.to_string()),
        mask: IpAddress::v4(schema::prefix_to_mask(len).to_string()),
        ip_route_mode,
        gateway,
        vlan_id: vlan,
        distance: Some(distance),
        name: str_prop(entity, "name").map(str::to_owned),
    })
}

// ── Property accessors ──────────────────────────────────────────────

fn str_prop<'a>(entity: &'a ConfigEntity, name: &str) -> Option<&'a str> {
    entity.property(name).and_then(PropertyValue::as_str)
}

fn bool_prop(entity: &ConfigEntity, name: &str) -> Option<bool> {
    entity.property(name).and_then(PropertyValue::as_bool)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::EntityKey;

    fn member(vlan_id: u16, port: &str, port_mode: PortMode) -> VlanPort {
        VlanPort {
            vlan_id,
            port_id: port.into(),
            port_mode,
        }
    }

    fn port(id: &str) -> Port {
        Port {
            id: id.into(),
            name: String::new(),
            is_port_enabled: true,
            ipv4_acl_in: None,
        }
    }

    #[test]
    fn default_vlan_is_not_an_entity() {
        let vlan = Vlan {
            vlan_id: 1,
            name: "DEFAULT_VLAN".into(),
            ..Vlan::default()
        };
        assert!(vlan_from_wire(&vlan).is_none());
    }

    #[test]
    fn vlan_default_name_is_dropped() {
        let vlan = Vlan {
            vlan_id: 20,
            name: "VLAN20".into(),
            ..Vlan::default()
        };
        let entity = vlan_from_wire(&vlan).unwrap();
        assert!(entity.properties.is_empty());
        assert_eq!(vlan_to_wire(&entity).unwrap().name, "VLAN20");
    }

    #[test]
    fn factory_port_is_skipped() {
        let memberships = [member(1, "3", PortMode::Untagged)];
        assert!(interface_from_wire(&port("3"), &memberships, None).is_none());
    }

    #[test]
    fn port_membership_becomes_properties_and_dependencies() {
        let memberships = [
            member(1, "5", PortMode::Tagged),
            member(30, "5", PortMode::Tagged),
            member(10, "5", PortMode::Untagged),
            member(20, "6", PortMode::Untagged),
        ];
        let poe = PortPoe {
            port_id: "5".into(),
            is_poe_enabled: false,
            ..PortPoe::default()
        };
        let entity = interface_from_wire(&port("5"), &memberships, Some(&poe)).unwrap();

        assert_eq!(entity.property("untagged_vlan"), Some(&PropertyValue::Int(10)));
        assert_eq!(
            entity.property("tagged_vlans"),
            Some(&PropertyValue::List(vec![1i64.into(), 30i64.into()]))
        );
        assert_eq!(entity.property("poe_enabled"), Some(&PropertyValue::Bool(false)));
        assert!(!entity.depends_on.contains(&EntityKey::vlan(1)));
        assert!(entity.depends_on.contains(&EntityKey::vlan(30)));

        let wire = port_to_wire(&entity).unwrap();
        assert_eq!(wire.untagged_vlan, 10);
        assert_eq!(wire.tagged_vlans, vec![1, 30]);
        assert_eq!(wire.is_poe_enabled, Some(false));
    }

    #[test]
    fn acl_rule_addresses() {
        let rule = AclRule {
            acl_id: "guests".into(),
            sequence_no: 10,
            acl_action: AclAction::Deny,
            traffic_match: TrafficMatch {
                protocol_type: Some("TCP".into()),
                destination_ip_address: Some(IpAddress::v4("10.0.0.0")),
                destination_ip_mask: Some(IpAddress::v4("255.0.0.0")),
                ..TrafficMatch::default()
            },
        };
        let entity = acl_rule_from_wire("guests", &rule).unwrap();
        assert_eq!(entity.id, "guests/10");
        assert_eq!(entity.property("destination"), Some(&"10.0.0.0/8".into()));
        assert!(entity.property("source").is_none());
        assert_eq!(entity.property("protocol"), Some(&"tcp".into()));

        assert_eq!(acl_rule_to_wire(&entity).unwrap(), rule);
    }

    #[test]
    fn wildcard_mask_rules_are_not_modelled() {
        let rule = AclRule {
            acl_id: "guests".into(),
            sequence_no: 20,
            acl_action: AclAction::Permit,
            traffic_match: TrafficMatch {
                source_ip_address: Some(IpAddress::v4("10.0.0.1")),
                source_ip_mask: Some(IpAddress::v4("255.0.255.0")),
                ..TrafficMatch::default()
            },
        };
        assert!(acl_rule_from_wire("guests", &rule).is_none());
    }

    #[test]
    fn gateway_route_round_trip() {
        let route = IpRoute {
            id: "0.0.0.0-0-192.0.2.1".into(),
            destination: IpAddress::v4("0.0.0.0"),
            mask: IpAddress::v4("0.0.0.0"),
            ip_route_mode: RouteMode::Gateway,
            gateway: Some(IpAddress::v4("192.0.2.1")),
            vlan_id: None,
            distance: Some(1),
            name: None,
        };
        let entity = route_from_wire(&route).unwrap().unwrap();
        assert_eq!(entity.id, "0.0.0.0/0");
        assert!(entity.property("distance").is_none());

        let wire = route_to_wire(&entity).unwrap();
        assert_eq!(wire.gateway, route.gateway);
        assert_eq!(wire.mask.octets, "0.0.0.0");
    }

    #[test]
    fn blackhole_routes_are_ignored() {
        let route = IpRoute {
            id: String::new(),
            destination: IpAddress::v4("10.9.0.0"),
            mask: IpAddress::v4("255.255.0.0"),
            ip_route_mode: RouteMode::BlackHole,
            gateway: None,
            vlan_id: None,
            distance: None,
            name: None,
        };
        assert!(route_from_wire(&route).unwrap().is_none());
    }
}
