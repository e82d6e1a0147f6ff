use crate::Error;
use policy_approver_k8s_api::{
    Api, CertificateRequest, CertificateRequestCondition, CertificateRequestPolicy,
    CertificateRequestPolicyCondition, Client, Patch, PatchParams, ResourceExt,
};
use serde_json::json;
use tracing::debug;

/// Persists the conditions the approver computes.
///
/// Writes carry the object's resource version, so a write based on a stale
/// read fails with a conflict and the reconcile is retried from a fresh read.
#[async_trait::async_trait]
pub trait StatusWriter: Send + Sync {
    /// Adds `condition` to the request, replacing any condition of the same
    /// type.
    async fn set_request_condition(
        &self,
        request: &CertificateRequest,
        condition: CertificateRequestCondition,
    ) -> Result<(), Error>;

    /// Replaces the policy's conditions.
    async fn set_policy_conditions(
        &self,
        policy: &CertificateRequestPolicy,
        conditions: Vec<CertificateRequestPolicyCondition>,
    ) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct KubeStatusWriter {
    client: Client,
}

// === impl KubeStatusWriter ===

impl KubeStatusWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl StatusWriter for KubeStatusWriter {
    async fn set_request_condition(
        &self,
        request: &CertificateRequest,
        condition: CertificateRequestCondition,
    ) -> Result<(), Error> {
        // Requests are always namespaced.
        let namespace = request.namespace().unwrap_or_default();
        let name = request.name_any();
        let api = Api::<CertificateRequest>::namespaced(self.client.clone(), &namespace);
        let patch = request_patch(request, condition)?;
        api.patch_status(&name, &PatchParams::default(), &patch)
            .await?;
        debug!(%namespace, %name, "Patched CertificateRequest status");
        Ok(())
    }

    async fn set_policy_conditions(
        &self,
        policy: &CertificateRequestPolicy,
        conditions: Vec<CertificateRequestPolicyCondition>,
    ) -> Result<(), Error> {
        let name = policy.name_any();
        let api = Api::<CertificateRequestPolicy>::all(self.client.clone());
        let patch = policy_patch(policy, conditions)?;
        api.patch_status(&name, &PatchParams::default(), &patch)
            .await?;
        debug!(%name, "Patched CertificateRequestPolicy status");
        Ok(())
    }
}

fn request_patch(
    request: &CertificateRequest,
    condition: CertificateRequestCondition,
) -> Result<Patch<serde_json::Value>, Error> {
    let mut conditions = request
        .conditions()
        .iter()
        .filter(|c| c.type_ != condition.type_)
        .cloned()
        .collect::<Vec<_>>();
    conditions.push(condition);

    Ok(Patch::Merge(json!({
        "metadata": { "resourceVersion": request.resource_version() },
        "status": { "conditions": serde_json::to_value(conditions)? },
    })))
}

fn policy_patch(
    policy: &CertificateRequestPolicy,
    conditions: Vec<CertificateRequestPolicyCondition>,
) -> Result<Patch<serde_json::Value>, Error> {
    Ok(Patch::Merge(json!({
        "metadata": { "resourceVersion": policy.resource_version() },
        "status": { "conditions": serde_json::to_value(conditions)? },
    })))
}
