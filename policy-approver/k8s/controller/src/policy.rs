//! Maintains the Ready condition of `CertificateRequestPolicy`s.

use crate::{
    events::{actions, reasons, EventPublisher, EventType},
    leader::{Leader, FOLLOWER_REQUEUE},
    Action, Error, StatusWriter, ERROR_REQUEUE,
};
use chrono::Utc;
use policy_approver_core::{Aggregator, Requeue};
use policy_approver_k8s_api::{CertificateRequestPolicy, Resource, ResourceExt, Time};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// The interval used when a readiness plugin asks to be revisited without
/// saying when.
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(10);

pub struct Context {
    pub aggregator: Aggregator,
    pub events: Arc<dyn EventPublisher>,
    pub status: Arc<dyn StatusWriter>,
    pub leader: Leader,
}

pub async fn reconcile(
    policy: Arc<CertificateRequestPolicy>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    if !ctx.leader.is_current() {
        debug!("Not the leader; skipping readiness");
        return Ok(Action::requeue(FOLLOWER_REQUEUE));
    }

    let update = ctx
        .aggregator
        .reconcile(&policy, Time(Utc::now()))
        .await
        .map_err(Error::Readiness)?;

    match update.conditions {
        Some(conditions) => {
            ctx.status.set_policy_conditions(&policy, conditions).await?;
            debug!(ready = update.readiness.ready, "Updated Ready condition");
        }
        None => debug!(ready = update.readiness.ready, "Ready condition unchanged"),
    }

    // Emitted whether or not the condition was written.
    let (event_type, reason) = if update.readiness.ready {
        (EventType::Normal, reasons::READY)
    } else {
        (EventType::Warning, reasons::NOT_READY)
    };
    ctx.events
        .publish(
            &policy.object_ref(&()),
            event_type,
            reason,
            actions::RECONCILE,
            update.condition.message.unwrap_or_default(),
        )
        .await;

    Ok(action(update.readiness.requeue))
}

pub fn error_policy(
    policy: Arc<CertificateRequestPolicy>,
    error: &Error,
    _: Arc<Context>,
) -> Action {
    warn!(
        name = %policy.name_any(),
        %error,
        "Failed to reconcile CertificateRequestPolicy"
    );
    Action::requeue(ERROR_REQUEUE)
}

fn action(requeue: Requeue) -> Action {
    match requeue.requested_after() {
        Some(after) => Action::requeue(after),
        None if requeue.requeue => Action::requeue(DEFAULT_REQUEUE),
        None => Action::await_change(),
    }
}
