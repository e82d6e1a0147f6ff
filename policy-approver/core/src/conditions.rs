use policy_approver_k8s_api::{CertificateRequestPolicyCondition as Condition, Time};
use std::collections::BTreeMap;

/// A policy's status conditions, keyed by condition type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions(BTreeMap<String, Condition>);

// === impl Conditions ===

impl Conditions {
    /// Later entries of a repeated type replace earlier ones.
    pub fn from_slice(conditions: &[Condition]) -> Self {
        Self(
            conditions
                .iter()
                .map(|c| (c.type_.clone(), c.clone()))
                .collect(),
        )
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.get(type_)
    }

    /// Stores `condition`, returning false if the stored value is unchanged.
    ///
    /// The transition time is carried over from the stored condition when
    /// the status has not changed, regardless of reason, message or observed
    /// generation. Otherwise it is set to `now`.
    pub fn set(&mut self, mut condition: Condition, now: Time) -> bool {
        condition.last_transition_time = match self.0.get(&condition.type_) {
            Some(stored) if stored.status == condition.status => {
                stored.last_transition_time.clone().or(Some(now))
            }
            _ => Some(now),
        };

        if self.0.get(&condition.type_) == Some(&condition) {
            return false;
        }
        self.0.insert(condition.type_.clone(), condition);
        true
    }

    pub fn into_vec(self) -> Vec<Condition> {
        self.0.into_values().collect()
    }
}
