#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod labels;
pub mod policy;
pub mod request;

pub use self::{
    condition::ConditionStatus,
    labels::Labels,
    policy::{
        CertificateRequestPolicy, CertificateRequestPolicyCondition,
        CertificateRequestPolicySpec, CertificateRequestPolicyStatus,
    },
    request::{
        CertificateRequest, CertificateRequestCondition, CertificateRequestSpec,
        CertificateRequestStatus,
    },
};
pub use k8s_openapi::{
    api::{
        self,
        authorization::v1::{
            ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
            SubjectAccessReviewStatus,
        },
        core::v1::{Namespace, ObjectReference},
        rbac::v1::{ClusterRoleBinding, RoleBinding},
    },
    apimachinery::pkg::apis::meta::v1::Time,
};
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    Client, Error, Resource,
};
