use crate::{condition::ConditionStatus, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONDITION_APPROVED: &str = "Approved";
pub const CONDITION_DENIED: &str = "Denied";

/// A pending certificate-issuance request, as consumed by the approver.
///
/// Only the fields the approver reads are modeled; everything else on the
/// object is preserved by the API server since status is written with merge
/// patches.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "CertificateRequest",
    status = "CertificateRequestStatus",
    shortname = "cr",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestSpec {
    /// PEM encoded x509 certificate signing request.
    #[serde(default)]
    pub request: String,

    pub issuer_ref: IssuerReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(default, rename = "isCA", skip_serializing_if = "Option::is_none")]
    pub is_ca: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct IssuerReference {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub group: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<CertificateRequestCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub failure_time: Option<Time>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestCondition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<Time>,
}

// === impl CertificateRequest ===

impl CertificateRequest {
    pub fn conditions(&self) -> &[CertificateRequestCondition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    fn has_true_condition(&self, type_: &str) -> bool {
        self.conditions()
            .iter()
            .any(|c| c.type_ == type_ && c.status == ConditionStatus::True)
    }

    pub fn is_approved(&self) -> bool {
        self.has_true_condition(CONDITION_APPROVED)
    }

    pub fn is_denied(&self) -> bool {
        self.has_true_condition(CONDITION_DENIED)
    }

    /// Approved and Denied are write-once: once either is set, the request
    /// must never be decided again.
    pub fn is_terminal(&self) -> bool {
        self.is_approved() || self.is_denied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_request() {
        let cr: CertificateRequest = serde_json::from_value(serde_json::json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "CertificateRequest",
            "metadata": { "name": "req", "namespace": "ns-0" },
            "spec": {
                "request": "LS0tLS1CRUdJTi==",
                "issuerRef": { "name": "ca", "kind": "Issuer", "group": "cert-manager.io" },
                "isCA": false,
                "username": "alice",
                "uid": "1234",
                "groups": ["system:authenticated"],
                "extra": { "scopes": ["a", "b"] },
            },
        }))
        .expect("request must deserialize");

        assert_eq!(cr.spec.issuer_ref.name, "ca");
        assert_eq!(cr.spec.issuer_ref.kind, "Issuer");
        assert_eq!(cr.spec.username.as_deref(), Some("alice"));
        assert_eq!(cr.spec.extra["scopes"], vec!["a", "b"]);
        assert!(!cr.is_terminal());
    }

    #[test]
    fn terminal_conditions() {
        let mk = |type_: &str, status| {
            let mut cr = CertificateRequest::new("req", Default::default());
            cr.status = Some(CertificateRequestStatus {
                conditions: vec![CertificateRequestCondition {
                    type_: type_.to_string(),
                    status,
                    reason: None,
                    message: None,
                    last_transition_time: None,
                }],
                ..Default::default()
            });
            cr
        };

        assert!(mk(CONDITION_APPROVED, ConditionStatus::True).is_approved());
        assert!(mk(CONDITION_APPROVED, ConditionStatus::True).is_terminal());
        assert!(mk(CONDITION_DENIED, ConditionStatus::True).is_denied());
        assert!(mk(CONDITION_DENIED, ConditionStatus::True).is_terminal());
        assert!(!mk(CONDITION_APPROVED, ConditionStatus::False).is_terminal());
        assert!(!mk("Ready", ConditionStatus::True).is_terminal());
    }
}
