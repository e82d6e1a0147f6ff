use crate::{
    field_error::{self, FieldError},
    plugin::{Registry, Requeue},
    Conditions,
};
use anyhow::{Context, Result};
use policy_approver_k8s_api::{
    policy::CONDITION_READY, CertificateRequestPolicy, CertificateRequestPolicyCondition,
    ConditionStatus, Time,
};
use std::sync::Arc;

pub const REASON_READY: &str = "Ready";
pub const REASON_NOT_READY: &str = "NotReady";
pub const MESSAGE_READY: &str = "CertificateRequestPolicy is ready for approval evaluation";
pub const MESSAGE_NOT_READY: &str = "CertificateRequestPolicy is not ready for approval evaluation";

/// Merges every readiness plugin's view of a policy into its Ready condition.
#[derive(Clone, Debug)]
pub struct Aggregator {
    registry: Arc<Registry>,
}

/// The combined verdict of all readiness plugins for one policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub errors: Vec<FieldError>,
    pub requeue: Requeue,
}

/// The result of reconciling a policy's readiness.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadyUpdate {
    pub readiness: Readiness,

    /// The condition as it should be stored.
    pub condition: CertificateRequestPolicyCondition,

    /// The full condition list to write, or `None` if the stored status
    /// already matches and no write should happen.
    pub conditions: Option<Vec<CertificateRequestPolicyCondition>>,
}

// === impl Aggregator ===

impl Aggregator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Asks every readiness plugin, in registration order, whether the policy
    /// is ready. Any plugin error aborts the aggregation.
    pub async fn readiness(&self, policy: &CertificateRequestPolicy) -> Result<Readiness> {
        let mut readiness = Readiness {
            ready: true,
            errors: Vec::new(),
            requeue: Requeue::default(),
        };

        for (name, reconciler) in self.registry.reconcilers() {
            let rsp = reconciler
                .ready(policy)
                .await
                .with_context(|| format!("readiness plugin {name} failed"))?;
            readiness.ready &= rsp.ready;
            readiness.errors.extend(rsp.errors);
            readiness.requeue = readiness.requeue.merge(rsp.requeue);
        }

        Ok(readiness)
    }

    /// Computes the policy's Ready condition and whether it must be written.
    pub async fn reconcile(
        &self,
        policy: &CertificateRequestPolicy,
        now: Time,
    ) -> Result<ReadyUpdate> {
        let readiness = self.readiness(policy).await?;

        let mut conditions = Conditions::from_slice(policy.conditions());
        let changed = conditions.set(readiness.condition(policy.metadata.generation), now);
        let condition = conditions
            .get(CONDITION_READY)
            .cloned()
            .context("ready condition must be set")?;

        Ok(ReadyUpdate {
            readiness,
            condition,
            conditions: changed.then(|| conditions.into_vec()),
        })
    }
}

// === impl Readiness ===

impl Readiness {
    pub fn message(&self) -> String {
        if self.ready {
            return MESSAGE_READY.to_string();
        }
        if self.errors.is_empty() {
            return MESSAGE_NOT_READY.to_string();
        }
        format!(
            "{MESSAGE_NOT_READY}: {}",
            field_error::aggregate(&self.errors)
        )
    }

    fn condition(&self, observed_generation: Option<i64>) -> CertificateRequestPolicyCondition {
        let reason = if self.ready {
            REASON_READY
        } else {
            REASON_NOT_READY
        };
        CertificateRequestPolicyCondition {
            type_: CONDITION_READY.to_string(),
            status: ConditionStatus::from(self.ready),
            reason: Some(reason.to_string()),
            message: Some(self.message()),
            last_transition_time: None,
            observed_generation,
        }
    }
}
