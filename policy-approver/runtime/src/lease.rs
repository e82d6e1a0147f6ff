//! Leader election over a `coordination.k8s.io` Lease.

use anyhow::{Context, Result};
use k8s_openapi::{
    api::{apps::v1::Deployment, coordination::v1::Lease},
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kubert::lease::{Claim, ClaimParams, LeaseManager};
use policy_approver_k8s_api::{Api, Client, Error, ObjectMeta, Patch, PatchParams, Resource};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info};

/// Where the election Lease lives and how it is claimed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Election {
    pub namespace: String,
    pub lease_name: String,
    /// Owns the Lease, so it is removed with the approver.
    pub deployment_name: String,
    pub field_manager: String,
    pub lease_duration: Duration,
    pub renew_grace_period: Duration,
}

impl Election {
    /// Ensures the Lease exists and starts contending for it as `identity`.
    pub(crate) async fn claim(
        &self,
        client: Client,
        identity: &str,
    ) -> Result<watch::Receiver<Arc<Claim>>> {
        let deployment = Api::<Deployment>::namespaced(client.clone(), &self.namespace)
            .get(&self.deployment_name)
            .await
            .with_context(|| {
                format!(
                    "failed to get deployment {}/{}",
                    self.namespace, self.deployment_name
                )
            })?;
        let owner = deployment
            .controller_owner_ref(&())
            .context("deployment must have a name and uid")?;

        let leases = Api::<Lease>::namespaced(client, &self.namespace);
        let params = PatchParams::apply(&self.field_manager);
        match leases
            .patch(&self.lease_name, &params, &Patch::Apply(self.lease(owner)))
            .await
        {
            Ok(_) => info!(lease = %self.lease_name, "Created Lease"),
            // Conflicts mean another replica created it first.
            Err(Error::Api(error)) => debug!(%error, lease = %self.lease_name, "Lease exists"),
            Err(error) => return Err(error.into()),
        }

        let (claims, _task) = LeaseManager::init(leases, &self.lease_name)
            .await?
            .spawn(
                identity,
                ClaimParams {
                    lease_duration: self.lease_duration,
                    renew_grace_period: self.renew_grace_period,
                },
            )
            .await?;
        Ok(claims)
    }

    /// The Lease applied at startup. The resource version `0` makes the apply
    /// a create-only operation.
    fn lease(&self, owner: OwnerReference) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(self.lease_name.clone()),
                namespace: Some(self.namespace.clone()),
                resource_version: Some("0".to_string()),
                owner_references: Some(vec![owner]),
                labels: Some(BTreeMap::from([(
                    "app.kubernetes.io/managed-by".to_string(),
                    self.field_manager.clone(),
                )])),
                ..Default::default()
            },
            spec: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lease_is_create_only_and_owned() {
        let election = Election {
            namespace: "cert-manager".to_string(),
            lease_name: "approver-lease".to_string(),
            deployment_name: "approver".to_string(),
            field_manager: "approver-manager".to_string(),
            lease_duration: Duration::from_secs(30),
            renew_grace_period: Duration::from_secs(1),
        };
        let owner = OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "approver".to_string(),
            uid: "uid-0".to_string(),
            controller: Some(true),
            ..Default::default()
        };

        let lease = election.lease(owner.clone());
        assert_eq!(lease.metadata.name.as_deref(), Some("approver-lease"));
        assert_eq!(lease.metadata.namespace.as_deref(), Some("cert-manager"));
        assert_eq!(lease.metadata.resource_version.as_deref(), Some("0"));
        assert_eq!(lease.metadata.owner_references, Some(vec![owner]));
        assert_eq!(
            lease.metadata.labels,
            Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                "approver-manager".to_string()
            )]))
        );
        assert_eq!(lease.spec, None);
    }
}
