//! Kubernetes Events emitted on the objects the approver acts on.
//!
//! Events are fire-and-forget: a failure to publish one is logged and never
//! fails the reconcile that emitted it.

use kube::{
    runtime::events::{Event, Recorder, Reporter},
    Client,
};
use policy_approver_k8s_api::ObjectReference;
use tracing::warn;

pub use kube::runtime::events::EventType;

/// Event reasons. These, and the type each is emitted with, are part of the
/// approver's observable behavior.
pub mod reasons {
    pub const APPROVED: &str = "Approved";
    pub const DENIED: &str = "Denied";
    pub const UNPROCESSED: &str = "Unprocessed";
    pub const EVALUATION_ERROR: &str = "EvaluationError";
    pub const UNKNOWN_RESPONSE: &str = "UnknownResponse";
    pub const READY: &str = "Ready";
    pub const NOT_READY: &str = "NotReady";
}

pub mod actions {
    pub const REVIEW: &str = "Review";
    pub const RECONCILE: &str = "Reconcile";
}

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        resource: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    );
}

pub struct KubeEventPublisher {
    recorder: Recorder,
}

// === impl KubeEventPublisher ===

impl KubeEventPublisher {
    pub fn new(client: Client, controller: impl ToString, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: action.to_string(),
            secondary: None,
        };
        if let Err(error) = self.recorder.publish(&event, resource).await {
            warn!(
                kind = ?resource.kind,
                namespace = ?resource.namespace,
                name = ?resource.name,
                reason,
                %error,
                "Failed to publish event"
            );
        }
    }
}
