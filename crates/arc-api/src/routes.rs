// Static route endpoints (`ip-route`).

use tracing::debug;

use crate::client::Session;
use crate::error::Error;
use crate::models::{IpRoute, IpRouteElementList};

impl Session {
    /// List static routes.
    ///
    /// `GET rest/v1/ip-route`
    pub async fn list_routes(&self) -> Result<Vec<IpRoute>, Error> {
        let url = self.endpoint(&["ip-route"])?;
        let list: IpRouteElementList = self.get(url).await?;
        Ok(list.ip_route_element)
    }

    /// `POST rest/v1/ip-route`
    pub async fn create_route(&self, route: &IpRoute) -> Result<IpRoute, Error> {
        let url = self.endpoint(&["ip-route"])?;
        debug!(destination = %route.destination.octets, "creating static route");
        self.post(url, route).await
    }

    /// `PUT rest/v1/ip-route/{id}`
    pub async fn update_route(&self, route_id: &str, route: &IpRoute) -> Result<IpRoute, Error> {
        let url = self.endpoint(&["ip-route", route_id])?;
        debug!(route = route_id, "updating static route");
        self.put(url, route).await
    }

    /// `DELETE rest/v1/ip-route/{id}`
    pub async fn delete_route(&self, route_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["ip-route", route_id])?;
        debug!(route = route_id, "deleting static route");
        self.delete(url).await
    }
}
