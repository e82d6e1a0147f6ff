//! Approves or denies pending `CertificateRequest`s.

use crate::{
    events::{actions, reasons, EventPublisher, EventType},
    leader::{Leader, FOLLOWER_REQUEUE},
    Action, Error, StatusWriter, ERROR_REQUEUE,
};
use chrono::Utc;
use kube::runtime::reflector::{ObjectRef, Store};
use policy_approver_core::{Decision, Manager};
use policy_approver_k8s_api::{
    request::{CONDITION_APPROVED, CONDITION_DENIED},
    CertificateRequest, CertificateRequestCondition, ConditionStatus, ObjectReference, Resource,
    ResourceExt, Time,
};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// The reason set on the Approved and Denied conditions the approver writes.
pub const CONDITION_REASON: &str = "policy.cert-manager.io";

/// How long to wait before retrying a review that produced a decision this
/// controller does not know how to act on.
pub const UNKNOWN_RESPONSE_REQUEUE: Duration = Duration::from_secs(5);

pub struct Context {
    pub manager: Manager,
    pub events: Arc<dyn EventPublisher>,
    pub status: Arc<dyn StatusWriter>,
    pub leader: Leader,
}

pub async fn reconcile(
    request: Arc<CertificateRequest>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    // Approved and Denied are write-once.
    if request.is_terminal() {
        return Ok(Action::await_change());
    }
    if !ctx.leader.is_current() {
        debug!("Not the leader; skipping review");
        return Ok(Action::requeue(FOLLOWER_REQUEUE));
    }

    let resource = request.object_ref(&());
    let rsp = match ctx.manager.review(&request).await {
        Ok(rsp) => rsp,
        Err(error) => {
            ctx.events
                .publish(
                    &resource,
                    EventType::Warning,
                    reasons::EVALUATION_ERROR,
                    actions::REVIEW,
                    format!("{error:#}"),
                )
                .await;
            return Err(Error::Review(error));
        }
    };

    let (type_, event_type, reason) = match rsp.decision {
        Decision::Unprocessed => {
            debug!(message = %rsp.message, "Request not processed");
            ctx.events
                .publish(
                    &resource,
                    EventType::Normal,
                    reasons::UNPROCESSED,
                    actions::REVIEW,
                    rsp.message,
                )
                .await;
            return Ok(Action::await_change());
        }
        Decision::Approved => (CONDITION_APPROVED, EventType::Normal, reasons::APPROVED),
        Decision::Denied => (CONDITION_DENIED, EventType::Warning, reasons::DENIED),
        decision => return Ok(unknown_response(&ctx, &resource, &decision).await),
    };

    let condition = CertificateRequestCondition {
        type_: type_.to_string(),
        status: ConditionStatus::True,
        reason: Some(CONDITION_REASON.to_string()),
        message: Some(rsp.message.clone()),
        last_transition_time: Some(Time(Utc::now())),
    };
    ctx.status.set_request_condition(&request, condition).await?;
    info!(decision = %type_, message = %rsp.message, "Decided request");

    ctx.events
        .publish(&resource, event_type, reason, actions::REVIEW, rsp.message)
        .await;
    Ok(Action::await_change())
}

/// Reports a decision this controller does not know how to act on and
/// retries the review shortly. The request is left pending.
async fn unknown_response(
    ctx: &Context,
    resource: &ObjectReference,
    decision: &(dyn fmt::Debug + Sync),
) -> Action {
    warn!(?decision, "Unknown review decision");
    ctx.events
        .publish(
            resource,
            EventType::Warning,
            reasons::UNKNOWN_RESPONSE,
            actions::REVIEW,
            format!("Policy returned an unknown response: {decision:?}"),
        )
        .await;
    Action::requeue(UNKNOWN_RESPONSE_REQUEUE)
}

pub fn error_policy(request: Arc<CertificateRequest>, error: &Error, _: Arc<Context>) -> Action {
    warn!(
        namespace = ?request.namespace(),
        name = %request.name_any(),
        %error,
        "Failed to reconcile CertificateRequest"
    );
    Action::requeue(ERROR_REQUEUE)
}

/// References every cached request that has not yet been decided.
///
/// Used to re-review pending requests when something that may change their
/// outcome changes, such as a policy becoming ready or a new role binding.
pub fn pending(store: &Store<CertificateRequest>) -> Vec<ObjectRef<CertificateRequest>> {
    store
        .state()
        .iter()
        .filter(|r| !r.is_terminal())
        .map(|r| ObjectRef::from_obj(r.as_ref()))
        .collect()
}
