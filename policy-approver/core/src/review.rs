use crate::{
    plugin::{Registry, Verdict},
    predicate::{self, Authorizer, NamespaceLookup, Policies, Predicate},
};
use anyhow::{Context, Result};
use policy_approver_k8s_api::{CertificateRequest, CertificateRequestPolicy, ResourceExt};
use std::sync::Arc;
use tracing::debug;

pub const MESSAGE_NO_POLICIES: &str = "No CertificateRequestPolicies exist";
pub const MESSAGE_NONE_APPLICABLE: &str = "No CertificateRequestPolicies bound or applicable";

/// Provides the current set of policy objects.
#[async_trait::async_trait]
pub trait ListPolicies: Send + Sync {
    async fn list(&self) -> Result<Policies>;
}

/// The outcome of reviewing a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Decision {
    Approved,
    Denied,

    /// No policy applies to the request; it stays pending.
    Unprocessed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewResponse {
    pub decision: Decision,
    pub message: String,
}

/// Decides requests against the policies that apply to them.
///
/// Holds no per-request state, so a single manager serves every reconcile.
pub struct Manager {
    policies: Arc<dyn ListPolicies>,
    predicates: Vec<Arc<dyn Predicate>>,
    registry: Arc<Registry>,
}

// === impl ReviewResponse ===

impl ReviewResponse {
    fn new(decision: Decision, message: impl ToString) -> Self {
        Self {
            decision,
            message: message.to_string(),
        }
    }
}

// === impl Manager ===

impl Manager {
    pub fn new(
        policies: Arc<dyn ListPolicies>,
        namespaces: Arc<dyn NamespaceLookup>,
        authorizer: Arc<dyn Authorizer>,
        registry: Arc<Registry>,
    ) -> Self {
        let predicates: Vec<Arc<dyn Predicate>> = vec![
            Arc::new(predicate::Selector::new(namespaces)),
            Arc::new(predicate::Ready),
            Arc::new(predicate::RbacBound::new(authorizer)),
        ];
        Self::with_predicates(policies, predicates, registry)
    }

    pub(crate) fn with_predicates(
        policies: Arc<dyn ListPolicies>,
        predicates: Vec<Arc<dyn Predicate>>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            policies,
            predicates,
            registry,
        }
    }

    /// Reviews a request.
    ///
    /// Errors mean no decision could be reached and the review should be
    /// retried; they are never a denial.
    pub async fn review(&self, request: &CertificateRequest) -> Result<ReviewResponse> {
        let mut policies = self.policies.list().await.context("failed to list policies")?;
        if policies.is_empty() {
            return Ok(ReviewResponse::new(
                Decision::Unprocessed,
                MESSAGE_NO_POLICIES,
            ));
        }

        for predicate in self.predicates.iter() {
            policies = predicate.filter(request, policies).await?;
            if policies.is_empty() {
                break;
            }
        }
        if policies.is_empty() {
            return Ok(ReviewResponse::new(
                Decision::Unprocessed,
                MESSAGE_NONE_APPLICABLE,
            ));
        }

        let mut denials = Vec::with_capacity(policies.len());
        for policy in policies.iter() {
            let (verdict, message) = self.evaluate(policy, request).await?;
            let name = policy.name_any();
            if verdict == Verdict::NotDenied {
                debug!(policy = %name, "Approved");
                return Ok(ReviewResponse::new(
                    Decision::Approved,
                    format!("Approved by CertificateRequestPolicy: {name:?}"),
                ));
            }
            debug!(policy = %name, %message, "Denied");
            denials.push((name, message));
        }

        denials.sort_by(|(a, _), (b, _)| a.cmp(b));
        let denials = denials
            .into_iter()
            .map(|(name, message)| format!("[{name}: {message}]"))
            .collect::<Vec<_>>();
        Ok(ReviewResponse::new(
            Decision::Denied,
            format!("No policy approved this request: {}", denials.join(" ")),
        ))
    }

    /// Runs every evaluator against a single policy.
    ///
    /// All evaluators run, even once one has denied, so that the denial
    /// message is complete.
    async fn evaluate(
        &self,
        policy: &CertificateRequestPolicy,
        request: &CertificateRequest,
    ) -> Result<(Verdict, String)> {
        let mut verdict = Verdict::NotDenied;
        let mut messages = Vec::new();
        for (name, evaluator) in self.registry.evaluators() {
            let rsp = evaluator
                .evaluate(policy, request)
                .await
                .with_context(|| format!("evaluator {name} failed"))?;
            if rsp.verdict == Verdict::Denied {
                verdict = Verdict::Denied;
            }
            if !rsp.message.is_empty() {
                messages.push(rsp.message);
            }
        }
        Ok((verdict, messages.join(", ")))
    }
}
