use anyhow::Result;
use policy_approver_core::{predicate::USE_VERB, Authorizer, UseCheck};
use policy_approver_k8s_api::{
    policy::{POLICY_API_GROUP, POLICY_RESOURCE},
    Api, Client, ObjectMeta, PostParams, ResourceAttributes, SubjectAccessReview,
    SubjectAccessReviewSpec,
};
use tracing::trace;

/// Answers `use` checks by creating `SubjectAccessReview`s.
#[derive(Clone)]
pub struct SubjectAccessReviews {
    api: Api<SubjectAccessReview>,
}

// === impl SubjectAccessReviews ===

impl SubjectAccessReviews {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait::async_trait]
impl Authorizer for SubjectAccessReviews {
    async fn allowed(&self, check: &UseCheck) -> Result<bool> {
        let rsp = self
            .api
            .create(&PostParams::default(), &review(check))
            .await?;
        let allowed = rsp.status.map(|s| s.allowed).unwrap_or(false);
        trace!(policy = %check.policy, namespace = ?check.namespace, allowed);
        Ok(allowed)
    }
}

fn review(check: &UseCheck) -> SubjectAccessReview {
    let UseCheck {
        user,
        groups,
        extra,
        uid,
        policy,
        namespace,
    } = check.clone();

    SubjectAccessReview {
        metadata: ObjectMeta::default(),
        spec: SubjectAccessReviewSpec {
            user,
            uid,
            groups: (!groups.is_empty()).then_some(groups),
            extra: (!extra.is_empty()).then_some(extra),
            resource_attributes: Some(ResourceAttributes {
                group: Some(POLICY_API_GROUP.to_string()),
                resource: Some(POLICY_RESOURCE.to_string()),
                name: Some(policy),
                namespace,
                verb: Some(USE_VERB.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    #[test]
    fn namespaced_review() {
        let check = UseCheck {
            user: Some("alice".to_string()),
            groups: vec!["system:authenticated".to_string()],
            extra: btreemap! { "scopes".to_string() => vec!["a".to_string()] },
            uid: Some("uid-alice".to_string()),
            policy: "p1".to_string(),
            namespace: Some("ns-0".to_string()),
        };

        let spec = review(&check).spec;
        assert_eq!(spec.user.as_deref(), Some("alice"));
        assert_eq!(spec.uid.as_deref(), Some("uid-alice"));
        assert_eq!(spec.groups, Some(vec!["system:authenticated".to_string()]));
        assert_eq!(
            spec.extra,
            Some(btreemap! { "scopes".to_string() => vec!["a".to_string()] })
        );
        assert_eq!(
            spec.resource_attributes,
            Some(ResourceAttributes {
                group: Some("policy.cert-manager.io".to_string()),
                resource: Some("certificaterequestpolicies".to_string()),
                name: Some("p1".to_string()),
                namespace: Some("ns-0".to_string()),
                verb: Some("use".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn cluster_review_omits_namespace_and_empty_identity_fields() {
        let check = UseCheck {
            user: Some("bob".to_string()),
            policy: "p1".to_string(),
            ..Default::default()
        };

        let spec = review(&check).spec;
        assert_eq!(spec.groups, None);
        assert_eq!(spec.extra, None);
        let attrs = spec.resource_attributes.expect("resource attributes");
        assert_eq!(attrs.namespace, None);
        assert_eq!(attrs.name.as_deref(), Some("p1"));
    }
}
