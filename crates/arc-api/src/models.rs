// Switch REST API payload types
//
// Models for the Aruba switch `rest/v1` JSON API. Collection endpoints wrap
// their items in `<thing>_element` arrays next to a `collection_result`
// counter. Fields use `#[serde(default)]` liberally because firmware
// releases disagree about which fields are present.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Session ──────────────────────────────────────────────────────────

/// Body of `POST login-sessions`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "userName")]
    pub user_name: &'a str,
    pub password: &'a str,
}

/// Answer of `POST login-sessions`. The cookie is a ready-to-use
/// `sessionId=...` string.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub cookie: String,
}

/// `{"total_elements_count": N, "filtered_elements_count": N}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionResult {
    #[serde(default)]
    pub total_elements_count: u32,
    #[serde(default)]
    pub filtered_elements_count: u32,
}

// ── Addresses ────────────────────────────────────────────────────────

/// `{"version": "IAV_IP_V4", "octets": "10.0.0.1"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub version: String,
    pub octets: String,
}

impl IpAddress {
    pub fn v4(octets: impl Into<String>) -> Self {
        Self {
            version: "IAV_IP_V4".into(),
            octets: octets.into(),
        }
    }
}

// ── VLANs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub vlan_id: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_jumbo_enabled: bool,
    #[serde(default)]
    pub is_voice_enabled: bool,
    #[serde(default, skip_serializing)]
    pub status: Option<String>,
    #[serde(default, rename = "type", skip_serializing)]
    pub vlan_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VlanElementList {
    #[serde(default)]
    #[allow(dead_code)]
    pub collection_result: CollectionResult,
    #[serde(default)]
    pub vlan_element: Vec<Vlan>,
}

/// How a port participates in a VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortMode {
    #[serde(rename = "POM_UNTAGGED")]
    Untagged,
    #[serde(rename = "POM_TAGGED_STATIC")]
    Tagged,
    #[serde(rename = "POM_FORBIDDEN")]
    Forbidden,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanPort {
    pub vlan_id: u16,
    pub port_id: String,
    pub port_mode: PortMode,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VlanPortElementList {
    #[serde(default)]
    pub vlan_port_element: Vec<VlanPort>,
}

// ── Ports ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub is_port_enabled: bool,
    #[serde(default)]
    pub ipv4_acl_in: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortElementList {
    #[serde(default)]
    pub port_element: Vec<Port>,
}

/// Full port configuration written by `PUT ports/{id}`.
///
/// Carries the port's VLAN membership so one request moves the port
/// between VLANs atomically on the switch side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub id: String,
    pub name: String,
    pub is_port_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_poe_enabled: Option<bool>,
    pub untagged_vlan: u16,
    pub tagged_vlans: Vec<u16>,
    pub ipv4_acl_in: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct PortPoe {
    #[serde(default)]
    pub uri: String,
    pub port_id: String,
    pub is_poe_enabled: bool,
    #[serde(default)]
    pub poe_priority: String,
    #[serde(default)]
    pub poe_allocation_method: String,
    #[serde(default)]
    pub allocated_power_in_watts: u32,
    #[serde(default)]
    pub port_configured_type: String,
    #[serde(default)]
    pub pre_standard_detect_enabled: bool,
}

#[derive(Deserialize, Debug)]
pub(crate) struct WiredElementList {
    #[serde(default)]
    #[allow(dead_code)]
    pub collection_result: HashMap<String, u32>,
    #[serde(default)]
    pub port_poe: Vec<PortPoe>,
}

// ── Static routes ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteMode {
    #[serde(rename = "IRM_GATEWAY")]
    Gateway,
    #[serde(rename = "IRM_VLAN")]
    Vlan,
    #[serde(rename = "IRM_BLACK_HOLE")]
    BlackHole,
    #[serde(rename = "IRM_REJECT")]
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRoute {
    /// `{destination}-{mask length}-{next hop}` as reported by the switch.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub destination: IpAddress,
    pub mask: IpAddress,
    pub ip_route_mode: RouteMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IpRouteElementList {
    #[serde(default)]
    pub ip_route_element: Vec<IpRoute>,
}

// ── ACLs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclType {
    #[serde(rename = "AT_STANDARD")]
    Standard,
    #[serde(rename = "AT_EXTENDED_OR_IPv6")]
    Extended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub id: String,
    pub acl_name: String,
    pub acl_type: AclType,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AclElementList {
    #[serde(default)]
    pub acl_element: Vec<Acl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclAction {
    #[serde(rename = "AA_PERMIT")]
    Permit,
    #[serde(rename = "AA_DENY")]
    Deny,
}

/// Match criteria of an ACL rule. `None` addresses mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficMatch {
    #[serde(default)]
    pub protocol_type: Option<String>,
    #[serde(default)]
    pub source_ip_address: Option<IpAddress>,
    #[serde(default)]
    pub source_ip_mask: Option<IpAddress>,
    #[serde(default)]
    pub destination_ip_address: Option<IpAddress>,
    #[serde(default)]
    pub destination_ip_mask: Option<IpAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    pub acl_id: String,
    pub sequence_no: u32,
    pub acl_action: AclAction,
    #[serde(default)]
    pub traffic_match: TrafficMatch,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AclRuleElementList {
    #[serde(default)]
    pub acl_rule_element: Vec<AclRule>,
}
