// ACL endpoints
//
// ACL definitions live under `acls`, their rules under `acls/{id}/rules`
// keyed by sequence number.

use tracing::debug;

use crate::client::Session;
use crate::error::Error;
use crate::models::{Acl, AclElementList, AclRule, AclRuleElementList};

impl Session {
    /// `GET rest/v1/acls`
    pub async fn list_acls(&self) -> Result<Vec<Acl>, Error> {
        let url = self.endpoint(&["acls"])?;
        let list: AclElementList = self.get(url).await?;
        Ok(list.acl_element)
    }

    /// `POST rest/v1/acls`
    pub async fn create_acl(&self, acl: &Acl) -> Result<Acl, Error> {
        let url = self.endpoint(&["acls"])?;
        debug!(acl = %acl.acl_name, "creating acl");
        self.post(url, acl).await
    }

    /// `PUT rest/v1/acls/{id}`
    pub async fn update_acl(&self, acl: &Acl) -> Result<Acl, Error> {
        let url = self.endpoint(&["acls", &acl.id])?;
        debug!(acl = %acl.acl_name, "updating acl");
        self.put(url, acl).await
    }

    /// `DELETE rest/v1/acls/{id}`
    pub async fn delete_acl(&self, acl_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["acls", acl_id])?;
        debug!(acl = acl_id, "deleting acl");
        self.delete(url).await
    }

    /// `GET rest/v1/acls/{id}/rules`
    pub async fn list_acl_rules(&self, acl_id: &str) -> Result<Vec<AclRule>, Error> {
        let url = self.endpoint(&["acls", acl_id, "rules"])?;
        let list: AclRuleElementList = self.get(url).await?;
        Ok(list.acl_rule_element)
    }

    /// `POST rest/v1/acls/{id}/rules`
    pub async fn create_acl_rule(&self, rule: &AclRule) -> Result<AclRule, Error> {
        let url = self.endpoint(&["acls", &rule.acl_id, "rules"])?;
        debug!(acl = %rule.acl_id, seq = rule.sequence_no, "creating acl rule");
        self.post(url, rule).await
    }

    /// `PUT rest/v1/acls/{id}/rules/{seq}`
    pub async fn update_acl_rule(&self, rule: &AclRule) -> Result<AclRule, Error> {
        let seq = rule.sequence_no.to_string();
        let url = self.endpoint(&["acls", &rule.acl_id, "rules", &seq])?;
        debug!(acl = %rule.acl_id, seq = rule.sequence_no, "updating acl rule");
        self.put(url, rule).await
    }

    /// `DELETE rest/v1/acls/{id}/rules/{seq}`
    pub async fn delete_acl_rule(&self, acl_id: &str, sequence_no: u32) -> Result<(), Error> {
        let seq = sequence_no.to_string();
        let url = self.endpoint(&["acls", acl_id, "rules", &seq])?;
        debug!(acl = acl_id, seq = sequence_no, "deleting acl rule");
        self.delete(url).await
    }
}
