use crate::predicate::{Authorizer, NamespaceLookup, UseCheck};
use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use policy_approver_k8s_api::{
    policy::{
        IssuerRefSelector, NamespaceSelector, PolicySelector, CONDITION_READY,
    },
    request::IssuerReference,
    CertificateRequest, CertificateRequestPolicy, CertificateRequestPolicyCondition,
    CertificateRequestPolicySpec, CertificateRequestPolicyStatus, CertificateRequestSpec,
    ConditionStatus, Labels, ObjectMeta, Time,
};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

pub(crate) fn time(secs: i64) -> Time {
    Time(Utc.timestamp_opt(secs, 0).unwrap())
}

pub(crate) fn mk_request(ns: &str, issuer: (&str, &str, &str)) -> CertificateRequest {
    let (name, kind, group) = issuer;
    let mut cr = CertificateRequest::new(
        "req-0",
        CertificateRequestSpec {
            issuer_ref: IssuerReference {
                name: name.to_string(),
                kind: kind.to_string(),
                group: group.to_string(),
            },
            username: Some("alice".to_string()),
            uid: Some("uid-alice".to_string()),
            groups: vec!["system:authenticated".to_string()],
            extra: BTreeMap::from([("scopes".to_string(), vec!["a".to_string()])]),
            ..Default::default()
        },
    );
    cr.metadata.namespace = Some(ns.to_string());
    cr
}

pub(crate) fn mk_policy(name: &str, selector: PolicySelector) -> CertificateRequestPolicy {
    CertificateRequestPolicy {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: CertificateRequestPolicySpec {
            selector,
            ..Default::default()
        },
        status: None,
    }
}

pub(crate) fn with_ready(
    mut policy: CertificateRequestPolicy,
    status: ConditionStatus,
) -> CertificateRequestPolicy {
    policy.status = Some(CertificateRequestPolicyStatus {
        conditions: vec![CertificateRequestPolicyCondition {
            type_: CONDITION_READY.to_string(),
            status,
            reason: None,
            message: None,
            last_transition_time: Some(time(0)),
            observed_generation: Some(1),
        }],
    });
    policy
}

pub(crate) fn ready_policy(name: &str) -> Arc<CertificateRequestPolicy> {
    Arc::new(with_ready(
        mk_policy(name, PolicySelector::default()),
        ConditionStatus::True,
    ))
}

pub(crate) fn issuer_selector(
    name: Option<&str>,
    kind: Option<&str>,
    group: Option<&str>,
) -> PolicySelector {
    PolicySelector {
        issuer_ref: Some(IssuerRefSelector {
            name: name.map(Into::into),
            kind: kind.map(Into::into),
            group: group.map(Into::into),
        }),
        namespace: None,
    }
}

pub(crate) fn namespace_selector(
    match_names: &[&str],
    match_labels: &[(&str, &str)],
) -> PolicySelector {
    PolicySelector {
        issuer_ref: None,
        namespace: Some(NamespaceSelector {
            match_names: match_names.iter().map(|n| n.to_string()).collect(),
            match_labels: match_labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }),
    }
}

pub(crate) fn names(policies: &[Arc<CertificateRequestPolicy>]) -> Vec<String> {
    policies
        .iter()
        .map(|p| p.metadata.name.clone().unwrap_or_default())
        .collect()
}

/// Serves namespace labels from a fixed map; unknown namespaces fail.
#[derive(Default)]
pub(crate) struct FakeNamespaces {
    pub labels: HashMap<String, Labels>,
    pub lookups: AtomicUsize,
}

#[async_trait::async_trait]
impl NamespaceLookup for FakeNamespaces {
    async fn labels(&self, namespace: &str) -> Result<Labels> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.labels.get(namespace) {
            Some(labels) => Ok(labels.clone()),
            None => bail!("namespace {namespace:?} not found"),
        }
    }
}

/// Allows `(policy, namespace)` pairs from a fixed set and records every
/// check it is asked.
#[derive(Default)]
pub(crate) struct FakeAuthorizer {
    pub allowed: HashSet<(String, Option<String>)>,
    pub fail: bool,
    pub checks: Mutex<Vec<UseCheck>>,
}

impl FakeAuthorizer {
    pub(crate) fn allowing<'a>(
        pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    ) -> Self {
        Self {
            allowed: pairs
                .into_iter()
                .map(|(p, ns)| (p.to_string(), ns.map(Into::into)))
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn checks(&self) -> Vec<UseCheck> {
        self.checks.lock().clone()
    }
}

#[async_trait::async_trait]
impl Authorizer for FakeAuthorizer {
    async fn allowed(&self, check: &UseCheck) -> Result<bool> {
        self.checks.lock().push(check.clone());
        if self.fail {
            bail!("authorization backend unavailable");
        }
        Ok(self
            .allowed
            .contains(&(check.policy.clone(), check.namespace.clone())))
    }
}
