// arc-api: Async Rust client for the Aruba switch REST API (`rest/v1`)

pub mod acls;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod ports;
pub mod routes;
pub mod transport;
pub mod vlans;

pub use client::Session;
pub use error::Error;
pub use models::{
    Acl, AclAction, AclRule, AclType, IpAddress, IpRoute, Port, PortConfig, PortMode, PortPoe,
    RouteMode, TrafficMatch, Vlan, VlanPort,
};
pub use transport::{TlsMode, TransportConfig};
