use anyhow::Result;
use kube::runtime::reflector::Store;
use policy_approver_core::{ListPolicies, NamespaceLookup, Policies};
use policy_approver_k8s_api::{
    Api, CertificateRequestPolicy, Client, Labels, Namespace, ResourceExt,
};

/// Reads namespace labels from the API server.
///
/// Lookups are made live rather than from a cache: they only happen for
/// requests matched by a policy with a label selector.
#[derive(Clone)]
pub struct KubeNamespaces {
    api: Api<Namespace>,
}

/// Lists policies from the policy controller's reflector.
#[derive(Clone)]
pub struct StorePolicies {
    store: Store<CertificateRequestPolicy>,
}

// === impl KubeNamespaces ===

impl KubeNamespaces {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait::async_trait]
impl NamespaceLookup for KubeNamespaces {
    async fn labels(&self, namespace: &str) -> Result<Labels> {
        let ns = self.api.get(namespace).await?;
        Ok(ns.metadata.labels.into())
    }
}

// === impl StorePolicies ===

impl StorePolicies {
    pub fn new(store: Store<CertificateRequestPolicy>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ListPolicies for StorePolicies {
    /// Policies are returned ordered by name.
    async fn list(&self) -> Result<Policies> {
        let mut policies = self.store.state();
        policies.sort_by_cached_key(|p| p.name_any());
        Ok(policies)
    }
}
