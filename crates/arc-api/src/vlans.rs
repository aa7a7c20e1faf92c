// VLAN endpoints
//
// `vlans` holds VLAN definitions, `vlans-ports` the port memberships.
// The default VLAN (id 1) is always present and cannot be deleted.

use tracing::debug;

use crate::client::Session;
use crate::error::Error;
use crate::models::{Vlan, VlanElementList, VlanPort, VlanPortElementList};

impl Session {
    /// List all VLANs.
    ///
    /// `GET rest/v1/vlans`
    pub async fn list_vlans(&self) -> Result<Vec<Vlan>, Error> {
        let url = self.endpoint(&["vlans"])?;
        let list: VlanElementList = self.get(url).await?;
        Ok(list.vlan_element)
    }

    /// Create a VLAN.
    ///
    /// `POST rest/v1/vlans`
    pub async fn create_vlan(&self, vlan: &Vlan) -> Result<Vlan, Error> {
        let url = self.endpoint(&["vlans"])?;
        debug!(vlan_id = vlan.vlan_id, "creating vlan");
        self.post(url, vlan).await
    }

    /// Replace the writable attributes of a VLAN.
    ///
    /// `PUT rest/v1/vlans/{id}`
    pub async fn update_vlan(&self, vlan: &Vlan) -> Result<Vlan, Error> {
        let id = vlan.vlan_id.to_string();
        let url = self.endpoint(&["vlans", &id])?;
        debug!(vlan_id = vlan.vlan_id, "updating vlan");
        self.put(url, vlan).await
    }

    /// Delete a VLAN. Ports still tagged into it lose the membership.
    ///
    /// `DELETE rest/v1/vlans/{id}`
    pub async fn delete_vlan(&self, vlan_id: u16) -> Result<(), Error> {
        let id = vlan_id.to_string();
        let url = self.endpoint(&["vlans", &id])?;
        debug!(vlan_id, "deleting vlan");
        self.delete(url).await
    }

    /// List every port/VLAN membership.
    ///
    /// `GET rest/v1/vlans-ports`
    pub async fn list_vlan_ports(&self) -> Result<Vec<VlanPort>, Error> {
        let url = self.endpoint(&["vlans-ports"])?;
        let list: VlanPortElementList = self.get(url).await?;
        Ok(list.vlan_port_element)
    }
}
