#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Kubernetes glue for the approver: reconcilers for `CertificateRequest`s
//! and `CertificateRequestPolicy`s, and the cluster-backed implementations of
//! the core lookup, authorization, eventing and status contracts.

pub mod authz;
pub mod events;
mod leader;
pub mod lookup;
pub mod policy;
pub mod request;
pub mod status;


pub use self::{
    authz::SubjectAccessReviews,
    events::{EventPublisher, KubeEventPublisher},
    leader::Leader,
    lookup::{KubeNamespaces, StorePolicies},
    status::{KubeStatusWriter, StatusWriter},
};
pub use kube::runtime::controller::Action;

use std::time::Duration;

/// How long a failed reconcile waits before it is retried.
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to review request: {0:#}")]
    Review(anyhow::Error),

    #[error("failed to determine policy readiness: {0:#}")]
    Readiness(anyhow::Error),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}
