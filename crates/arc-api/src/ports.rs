// Port endpoints
//
// Port administration (`ports`) and Power-over-Ethernet state
// (`poe/ports`, `ports/{id}/poe`).

use tracing::debug;

use crate::client::Session;
use crate::error::Error;
use crate::models::{Port, PortConfig, PortElementList, PortPoe, WiredElementList};

impl Session {
    /// List all physical ports.
    ///
    /// `GET rest/v1/ports`
    pub async fn list_ports(&self) -> Result<Vec<Port>, Error> {
        let url = self.endpoint(&["ports"])?;
        let list: PortElementList = self.get(url).await?;
        Ok(list.port_element)
    }

    /// Write the full configuration of one port, VLAN membership included.
    ///
    /// `PUT rest/v1/ports/{id}`
    pub async fn configure_port(&self, config: &PortConfig) -> Result<(), Error> {
        let url = self.endpoint(&["ports", &config.id])?;
        debug!(port = %config.id, "configuring port");
        let _: serde_json::Value = self.put(url, config).await?;
        Ok(())
    }

    /// PoE state of every port.
    ///
    /// `GET rest/v1/poe/ports`
    pub async fn get_ports(&self) -> Result<Vec<PortPoe>, Error> {
        let url = self.endpoint(&["poe", "ports"])?;
        let list: WiredElementList = self.get(url).await?;
        Ok(list.port_poe)
    }

    /// PoE state of a single port.
    ///
    /// `GET rest/v1/ports/{id}/poe`
    pub async fn get_port(&self, port_id: &str) -> Result<PortPoe, Error> {
        let url = self.endpoint(&["ports", port_id, "poe"])?;
        self.get(url).await
    }

    /// Write arbitrary PoE attributes to a port and return the new state.
    ///
    /// `PUT rest/v1/ports/{id}/poe`
    pub async fn set_port(&self, port_id: &str, data: &serde_json::Value) -> Result<PortPoe, Error> {
        let url = self.endpoint(&["ports", port_id, "poe"])?;
        debug!(port = port_id, "writing poe settings");
        self.put(url, data).await
    }
}
