#![allow(clippy::unwrap_used)]
// ArubaSwitch against a mocked `rest/v1` surface.

use std::collections::BTreeSet;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arc_api::{Session, TransportConfig};
use arc_core::{
    ArubaSwitch, DeviceError, DeviceProtocol, EntityKey, EntityKind, Operation, Properties,
    PropertyValue,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mock_switch() -> (MockServer, ArubaSwitch) {
    let server = MockServer::start().await;

    get(&server, "/rest/v1/vlans", json!({
        "vlan_element": [
            { "vlan_id": 1, "name": "DEFAULT_VLAN" },
            { "vlan_id": 10, "name": "users" },
            { "vlan_id": 20, "name": "VLAN20", "is_voice_enabled": true }
        ]
    }))
    .await;
    get(&server, "/rest/v1/vlans-ports", json!({
        "vlan_port_element": [
            { "vlan_id": 10, "port_id": "1", "port_mode": "POM_UNTAGGED" },
            { "vlan_id": 20, "port_id": "1", "port_mode": "POM_TAGGED_STATIC" },
            { "vlan_id": 1, "port_id": "2", "port_mode": "POM_UNTAGGED" }
        ]
    }))
    .await;
    get(&server, "/rest/v1/ports", json!({
        "port_element": [
            { "id": "1", "name": "desk-1", "is_port_enabled": true, "ipv4_acl_in": "guests" },
            { "id": "2", "name": "", "is_port_enabled": true }
        ]
    }))
    .await;
    get(&server, "/rest/v1/poe/ports", json!({
        "port_poe": [
            { "port_id": "1", "is_poe_enabled": true },
            { "port_id": "2", "is_poe_enabled": true }
        ]
    }))
    .await;
    get(&server, "/rest/v1/acls", json!({
        "acl_element": [
            { "id": "guests", "acl_name": "guests", "acl_type": "AT_EXTENDED_OR_IPv6" }
        ]
    }))
    .await;
    get(&server, "/rest/v1/acls/guests/rules", json!({
        "acl_rule_element": [{
            "acl_id": "guests",
            "sequence_no": 10,
            "acl_action": "AA_DENY",
            "traffic_match": {
                "protocol_type": "IP",
                "destination_ip_address": { "version": "IAV_IP_V4", "octets": "10.0.0.0" },
                "destination_ip_mask": { "version": "IAV_IP_V4", "octets": "255.0.0.0" }
            }
        }]
    }))
    .await;
    get(&server, "/rest/v1/ip-route", json!({
        "ip_route_element": [
            {
                "id": "0.0.0.0-0-192.0.2.1",
                "destination": { "version": "IAV_IP_V4", "octets": "0.0.0.0" },
                "mask": { "version": "IAV_IP_V4", "octets": "0.0.0.0" },
                "ip_route_mode": "IRM_GATEWAY",
                "gateway": { "version": "IAV_IP_V4", "octets": "192.0.2.1" },
                "distance": 1
            },
            {
                "id": "10.66.0.0-16-blackhole",
                "destination": { "version": "IAV_IP_V4", "octets": "10.66.0.0" },
                "mask": { "version": "IAV_IP_V4", "octets": "255.255.0.0" },
                "ip_route_mode": "IRM_BLACK_HOLE"
            }
        ]
    }))
    .await;

    let session = Session::new(Url::parse(&server.uri()).unwrap(), &TransportConfig::default()).unwrap();
    (server, ArubaSwitch::new("core-1", session))
}

// ── Fetch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_normalizes_wire_state() {
    let (_server, mut switch) = mock_switch().await;

    let entities = switch.fetch(&EntityKind::all()).await.unwrap();
    let keys: BTreeSet<String> = entities.iter().map(|e| e.key().to_string()).collect();

    assert_eq!(
        keys,
        [
            "vlan:10",
            "vlan:20",
            "interface:1",
            "acl:guests",
            "acl_rule:guests/10",
            "static_route:0.0.0.0/0",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    );

    let port = entities
        .iter()
        .find(|e| e.kind == EntityKind::Interface)
        .unwrap();
    assert_eq!(port.property("untagged_vlan"), Some(&PropertyValue::Int(10)));
    assert_eq!(
        port.depends_on,
        [
            EntityKey::vlan(10),
            EntityKey::vlan(20),
            EntityKey::new(EntityKind::Acl, "guests"),
        ]
        .into_iter()
        .collect()
    );

    let vlan20 = entities.iter().find(|e| e.key() == EntityKey::vlan(20)).unwrap();
    assert!(vlan20.property("name").is_none(), "default name is canonical");
    assert_eq!(vlan20.property("voice"), Some(&PropertyValue::Bool(true)));
}

#[tokio::test]
async fn fetch_of_selected_kinds_only() {
    let (server, mut switch) = mock_switch().await;

    let entities = switch.fetch(&[EntityKind::Vlan]).await.unwrap();
    assert_eq!(entities.len(), 2);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() == "/rest/v1/vlans"));
}

#[tokio::test]
async fn missing_poe_endpoint_is_tolerated() {
    let server = MockServer::start().await;
    get(&server, "/rest/v1/ports", json!({ "port_element": [{ "id": "7", "name": "uplink" }] })).await;
    get(&server, "/rest/v1/vlans-ports", json!({ "vlan_port_element": [] })).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/poe/ports"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let session = Session::new(Url::parse(&server.uri()).unwrap(), &TransportConfig::default()).unwrap();
    let mut switch = ArubaSwitch::new("edge", session);

    let entities = switch.fetch(&[EntityKind::Interface]).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].property("name"), Some(&"uplink".into()));
}

// ── Apply ───────────────────────────────────────────────────────────

#[tokio::test]
async fn update_writes_the_merged_port() {
    let (server, mut switch) = mock_switch().await;
    switch.fetch(&EntityKind::all()).await.unwrap();

    Mock::given(method("PUT"))
        .and(path("/rest/v1/ports/1"))
        .and(body_partial_json(json!({
            "id": "1",
            "name": "desk-1",
            "untagged_vlan": 20,
            "tagged_vlans": [],
            "ipv4_acl_in": "guests"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut changes = Properties::new();
    changes.insert("untagged_vlan".into(), PropertyValue::Int(20));
    changes.insert("tagged_vlans".into(), PropertyValue::Null);
    switch
        .apply_operation(&Operation::update(EntityKind::Interface, "1", changes))
        .await
        .unwrap();
}

#[tokio::test]
async fn route_delete_uses_the_switch_route_id() {
    let (server, mut switch) = mock_switch().await;
    switch.fetch(&[EntityKind::StaticRoute]).await.unwrap();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/ip-route/0.0.0.0-0-192.0.2.1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    switch
        .apply_operation(&Operation::delete(EntityKind::StaticRoute, "0.0.0.0/0"))
        .await
        .unwrap();
}

#[tokio::test]
async fn interface_delete_restores_port_defaults() {
    let (server, mut switch) = mock_switch().await;

    Mock::given(method("PUT"))
        .and(path("/rest/v1/ports/1"))
        .and(body_partial_json(json!({
            "name": "",
            "is_port_enabled": true,
            "untagged_vlan": 1,
            "tagged_vlans": [],
            "ipv4_acl_in": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    switch
        .apply_operation(&Operation::delete(EntityKind::Interface, "1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn switch_errors_map_to_device_errors() {
    let (server, mut switch) = mock_switch().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/vlans"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/vlans/10"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/acls/guests"))
        .respond_with(ResponseTemplate::new(400).set_body_string("ACL in use"))
        .mount(&server)
        .await;

    let vlan30 = arc_core::ConfigEntity::normalized(EntityKind::Vlan, "30", Properties::new(), []);
    let busy = switch.apply_operation(&Operation::create(vlan30)).await.unwrap_err();
    assert!(busy.is_recoverable(), "{busy}");

    let expired = switch
        .apply_operation(&Operation::delete(EntityKind::Vlan, "10"))
        .await
        .unwrap_err();
    assert!(matches!(expired, DeviceError::NotAuthenticated(_)));

    let rejected = switch
        .apply_operation(&Operation::delete(EntityKind::Acl, "guests"))
        .await
        .unwrap_err();
    assert!(matches!(rejected, DeviceError::Rejected(msg) if msg.contains("ACL in use")));
}
