//! Filters that reduce the candidate policies for a request.
//!
//! Predicates run in a fixed order, local checks before remote ones:
//! [`Selector`], then [`Ready`], then [`RbacBound`].

use crate::wildcard;
use anyhow::{Context, Result};
use policy_approver_k8s_api::{
    policy::{IssuerRefSelector, NamespaceSelector},
    request::IssuerReference,
    CertificateRequest, CertificateRequestPolicy, Labels, ResourceExt,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

pub type Policies = Vec<Arc<CertificateRequestPolicy>>;

/// The verb a requester must be granted on a policy to be bound by it.
pub const USE_VERB: &str = "use";

#[async_trait::async_trait]
pub trait Predicate: Send + Sync {
    async fn filter(&self, request: &CertificateRequest, policies: Policies) -> Result<Policies>;
}

/// Resolves a namespace's labels.
#[async_trait::async_trait]
pub trait NamespaceLookup: Send + Sync {
    async fn labels(&self, namespace: &str) -> Result<Labels>;
}

/// Answers whether an identity may `use` a policy.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    async fn allowed(&self, check: &UseCheck) -> Result<bool>;
}

/// A single authorization query. A `namespace` of `None` asks about
/// cluster-wide access.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UseCheck {
    pub user: Option<String>,
    pub groups: Vec<String>,
    pub extra: BTreeMap<String, Vec<String>>,
    pub uid: Option<String>,
    pub policy: String,
    pub namespace: Option<String>,
}

/// Keeps policies whose issuer reference and namespace selectors match.
pub struct Selector {
    namespaces: Arc<dyn NamespaceLookup>,
}

/// Keeps policies whose cached status is Ready.
#[derive(Copy, Clone, Debug, Default)]
pub struct Ready;

/// Keeps policies the requester is authorized to use.
pub struct RbacBound {
    authorizer: Arc<dyn Authorizer>,
}

// === impl Selector ===

impl Selector {
    pub fn new(namespaces: Arc<dyn NamespaceLookup>) -> Self {
        Self { namespaces }
    }
}

#[async_trait::async_trait]
impl Predicate for Selector {
    async fn filter(&self, request: &CertificateRequest, policies: Policies) -> Result<Policies> {
        let namespace = request.namespace().unwrap_or_default();
        // Looked up at most once, and only if some policy selects on labels.
        let mut labels = None;

        let mut matched = Vec::with_capacity(policies.len());
        for policy in policies.into_iter() {
            let selector = &policy.spec.selector;

            if let Some(issuer_ref) = selector.issuer_ref.as_ref() {
                if !issuer_ref_matches(issuer_ref, &request.spec.issuer_ref) {
                    trace!(policy = %policy.name_any(), "Issuer reference does not match");
                    continue;
                }
            }

            if let Some(ns) = selector.namespace.as_ref() {
                if !namespace_name_matches(ns, &namespace) {
                    trace!(policy = %policy.name_any(), %namespace, "Namespace name does not match");
                    continue;
                }

                if !ns.match_labels.is_empty() {
                    if labels.is_none() {
                        let found = self
                            .namespaces
                            .labels(&namespace)
                            .await
                            .with_context(|| format!("failed to get namespace {namespace}"))?;
                        labels = Some(found);
                    }
                    if !labels
                        .as_ref()
                        .is_some_and(|l| l.contains_all(&ns.match_labels))
                    {
                        trace!(policy = %policy.name_any(), %namespace, "Namespace labels do not match");
                        continue;
                    }
                }
            }

            matched.push(policy);
        }

        Ok(matched)
    }
}

fn issuer_ref_matches(selector: &IssuerRefSelector, issuer_ref: &IssuerReference) -> bool {
    let field = |pattern: &Option<String>, value: &str| {
        pattern
            .as_deref()
            .map_or(true, |pattern| wildcard::matches(pattern, value))
    };
    field(&selector.name, &issuer_ref.name)
        && field(&selector.kind, &issuer_ref.kind)
        && field(&selector.group, &issuer_ref.group)
}

fn namespace_name_matches(selector: &NamespaceSelector, namespace: &str) -> bool {
    selector.match_names.is_empty()
        || selector
            .match_names
            .iter()
            .any(|pattern| wildcard::matches(pattern, namespace))
}

// === impl Ready ===

#[async_trait::async_trait]
impl Predicate for Ready {
    async fn filter(&self, _: &CertificateRequest, mut policies: Policies) -> Result<Policies> {
        policies.retain(|p| p.is_ready());
        Ok(policies)
    }
}

// === impl RbacBound ===

impl RbacBound {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }
}

#[async_trait::async_trait]
impl Predicate for RbacBound {
    async fn filter(&self, request: &CertificateRequest, policies: Policies) -> Result<Policies> {
        let namespace = request.namespace();

        let mut bound = Vec::with_capacity(policies.len());
        for policy in policies.into_iter() {
            let mut check = UseCheck::for_request(request, policy.name_any());

            // Namespaced bindings are the common case, so try them first.
            check.namespace = namespace.clone();
            let mut allowed = self
                .authorizer
                .allowed(&check)
                .await
                .with_context(|| format!("failed to authorize use of {}", check.policy))?;

            if !allowed && check.namespace.is_some() {
                check.namespace = None;
                allowed = self
                    .authorizer
                    .allowed(&check)
                    .await
                    .with_context(|| format!("failed to authorize use of {}", check.policy))?;
            }

            if allowed {
                bound.push(policy);
            } else {
                trace!(policy = %check.policy, user = ?check.user, "Requester is not bound to policy");
            }
        }

        Ok(bound)
    }
}

// === impl UseCheck ===

impl UseCheck {
    pub fn for_request(request: &CertificateRequest, policy: impl ToString) -> Self {
        let spec = &request.spec;
        Self {
            user: spec.username.clone(),
            groups: spec.groups.clone(),
            extra: spec.extra.clone(),
            uid: spec.uid.clone(),
            policy: policy.to_string(),
            namespace: None,
        }
    }
}
