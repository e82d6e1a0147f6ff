use kubert::lease::Claim;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// How long a replica that does not hold the write lease waits before it
/// checks again.
pub const FOLLOWER_REQUEUE: Duration = Duration::from_secs(10);

/// Decides whether this replica may decide requests and write status.
#[derive(Clone, Debug)]
pub enum Leader {
    /// Leader election is disabled; this replica always writes.
    Always,

    Lease {
        identity: String,
        claims: watch::Receiver<Arc<Claim>>,
    },
}

// === impl Leader ===

impl Leader {
    pub fn lease(identity: impl ToString, claims: watch::Receiver<Arc<Claim>>) -> Self {
        Self::Lease {
            identity: identity.to_string(),
            claims,
        }
    }

    pub fn is_current(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Lease { identity, claims } => claims.borrow().is_current_for(identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn claim(holder: &str, expiry: chrono::DateTime<Utc>) -> Arc<Claim> {
        Arc::new(Claim {
            holder: holder.to_string(),
            expiry,
        })
    }

    #[test]
    fn follows_the_current_claim() {
        let (tx, rx) = watch::channel(claim("pod-a", Utc::now() + ChronoDuration::hours(1)));
        let a = Leader::lease("pod-a", rx.clone());
        let b = Leader::lease("pod-b", rx);
        assert!(a.is_current());
        assert!(!b.is_current());

        tx.send(claim("pod-b", Utc::now() + ChronoDuration::hours(1)))
            .unwrap();
        assert!(!a.is_current());
        assert!(b.is_current());
    }

    #[test]
    fn expired_claims_are_not_current() {
        let (_tx, rx) = watch::channel(claim("pod-a", Utc::now() - ChronoDuration::seconds(1)));
        assert!(!Leader::lease("pod-a", rx).is_current());
    }

    #[test]
    fn always_is_current() {
        assert!(Leader::Always.is_current());
    }
}
