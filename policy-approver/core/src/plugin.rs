use crate::FieldError;
use anyhow::Result;
use policy_approver_k8s_api::{CertificateRequest, CertificateRequestPolicy};
use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

/// A single plugin's verdict for a (policy, request) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Denied,
    NotDenied,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationResponse {
    pub verdict: Verdict,

    /// Explains the verdict. Empty messages are omitted from denial text.
    pub message: String,
}

/// Renders a verdict for a request against a single policy.
///
/// Implementations must be safe to call concurrently for different policies.
/// An error means the verdict could not be determined; it is never treated
/// as a denial.
#[async_trait::async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        policy: &CertificateRequestPolicy,
        request: &CertificateRequest,
    ) -> Result<EvaluationResponse>;
}

/// Asks the readiness aggregator to revisit the policy later.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Requeue {
    pub requeue: bool,
    pub after: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadyResponse {
    pub ready: bool,
    pub errors: Vec<FieldError>,
    pub requeue: Requeue,
}

/// Determines whether a policy is usable from this plugin's point of view.
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync {
    async fn ready(&self, policy: &CertificateRequestPolicy) -> Result<ReadyResponse>;
}

/// A named plugin and the capabilities it provides.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    evaluator: Option<Arc<dyn Evaluator>>,
    reconciler: Option<Arc<dyn Reconciler>>,
}

/// The immutable, ordered set of plugins the approver runs with.
///
/// Registration order is evaluation order.
#[derive(Clone, Default)]
pub struct Registry {
    evaluators: Vec<(String, Arc<dyn Evaluator>)>,
    reconcilers: Vec<(String, Arc<dyn Reconciler>)>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("plugin {0:?} is registered more than once")]
    DuplicatePlugin(String),

    #[error("plugin names must not be empty")]
    EmptyName,
}

// === impl EvaluationResponse ===

impl EvaluationResponse {
    pub fn denied(message: impl ToString) -> Self {
        Self {
            verdict: Verdict::Denied,
            message: message.to_string(),
        }
    }

    pub fn not_denied() -> Self {
        Self {
            verdict: Verdict::NotDenied,
            message: String::new(),
        }
    }
}

// === impl Requeue ===

impl Requeue {
    pub fn after(after: Duration) -> Self {
        Self {
            requeue: true,
            after: Some(after),
        }
    }

    /// Combines two requests: a requeue happens if either asks for one, at
    /// the earliest interval either asks for. An interval without `requeue`
    /// set is not a request and is ignored.
    pub fn merge(self, other: Self) -> Self {
        let after = match (self.requested_after(), other.requested_after()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            requeue: self.requeue || other.requeue,
            after,
        }
    }

    /// The interval this asks to be requeued after, if it asks for one.
    pub fn requested_after(&self) -> Option<Duration> {
        self.after.filter(|_| self.requeue)
    }
}

// === impl ReadyResponse ===

impl ReadyResponse {
    pub fn ready() -> Self {
        Self {
            ready: true,
            ..Default::default()
        }
    }

    pub fn not_ready(errors: impl IntoIterator<Item = FieldError>) -> Self {
        Self {
            ready: false,
            errors: errors.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_requeue(self, requeue: Requeue) -> Self {
        Self { requeue, ..self }
    }
}

// === impl Plugin ===

impl Plugin {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            evaluator: None,
            reconciler: None,
        }
    }

    pub fn with_evaluator(self, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator: Some(evaluator),
            ..self
        }
    }

    pub fn with_reconciler(self, reconciler: Arc<dyn Reconciler>) -> Self {
        Self {
            reconciler: Some(reconciler),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("evaluator", &self.evaluator.is_some())
            .field("reconciler", &self.reconciler.is_some())
            .finish()
    }
}

// === impl Registry ===

impl Registry {
    pub fn new(plugins: impl IntoIterator<Item = Plugin>) -> Result<Self, RegistryError> {
        let mut names = HashSet::new();
        let mut evaluators = Vec::new();
        let mut reconcilers = Vec::new();

        for Plugin {
            name,
            evaluator,
            reconciler,
        } in plugins
        {
            if name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !names.insert(name.clone()) {
                return Err(RegistryError::DuplicatePlugin(name));
            }
            if let Some(evaluator) = evaluator {
                evaluators.push((name.clone(), evaluator));
            }
            if let Some(reconciler) = reconciler {
                reconcilers.push((name, reconciler));
            }
        }

        Ok(Self {
            evaluators,
            reconcilers,
        })
    }

    pub fn evaluators(&self) -> impl Iterator<Item = (&str, &Arc<dyn Evaluator>)> + '_ {
        self.evaluators.iter().map(|(name, e)| (name.as_str(), e))
    }

    pub fn reconcilers(&self) -> impl Iterator<Item = (&str, &Arc<dyn Reconciler>)> + '_ {
        self.reconcilers.iter().map(|(name, r)| (name.as_str(), r))
    }

    pub fn has_evaluators(&self) -> bool {
        !self.evaluators.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "evaluators",
                &self.evaluators.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field(
                "reconcilers",
                &self.reconcilers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    #[async_trait::async_trait]
    impl Evaluator for Nop {
        async fn evaluate(
            &self,
            _: &CertificateRequestPolicy,
            _: &CertificateRequest,
        ) -> Result<EvaluationResponse> {
            Ok(EvaluationResponse::not_denied())
        }
    }

    #[async_trait::async_trait]
    impl Reconciler for Nop {
        async fn ready(&self, _: &CertificateRequestPolicy) -> Result<ReadyResponse> {
            Ok(ReadyResponse::ready())
        }
    }

    #[test]
    fn registry_preserves_order_and_capabilities() {
        let registry = Registry::new([
            Plugin::new("b").with_evaluator(Arc::new(Nop)),
            Plugin::new("a")
                .with_evaluator(Arc::new(Nop))
                .with_reconciler(Arc::new(Nop)),
            Plugin::new("c").with_reconciler(Arc::new(Nop)),
            Plugin::new("flags-only"),
        ])
        .expect("registry must build");

        let evaluators = registry.evaluators().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(evaluators, ["b", "a"]);
        let reconcilers = registry.reconcilers().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(reconcilers, ["a", "c"]);
        assert!(registry.has_evaluators());
    }

    #[test]
    fn registry_rejects_duplicates() {
        let err = Registry::new([
            Plugin::new("a").with_evaluator(Arc::new(Nop)),
            Plugin::new("a").with_reconciler(Arc::new(Nop)),
        ])
        .expect_err("duplicate names must fail");
        assert_eq!(err, RegistryError::DuplicatePlugin("a".to_string()));
    }

    #[test]
    fn registry_rejects_empty_names() {
        let err = Registry::new([Plugin::new("")]).expect_err("empty names must fail");
        assert_eq!(err, RegistryError::EmptyName);
    }

    #[test]
    fn requeue_merge_takes_earliest() {
        let merged = Requeue::after(Duration::from_secs(60)).merge(Requeue::after(Duration::from_secs(1)));
        assert_eq!(merged, Requeue::after(Duration::from_secs(1)));

        let merged = Requeue::default().merge(Requeue::after(Duration::from_secs(60)));
        assert_eq!(merged, Requeue::after(Duration::from_secs(60)));

        let bare = Requeue {
            requeue: true,
            after: None,
        };
        assert_eq!(Requeue::default().merge(bare), bare);
        assert_eq!(Requeue::default().merge(Requeue::default()), Requeue::default());
    }

    #[test]
    fn requeue_merge_ignores_intervals_not_requested() {
        let stray = Requeue {
            requeue: false,
            after: Some(Duration::from_secs(1)),
        };
        assert_eq!(stray.requested_after(), None);
        assert_eq!(Requeue::default().merge(stray), Requeue::default());

        let merged = stray.merge(Requeue::after(Duration::from_secs(30)));
        assert_eq!(merged, Requeue::after(Duration::from_secs(30)));

        let bare = Requeue {
            requeue: true,
            after: None,
        };
        assert_eq!(bare.merge(stray), bare);
    }
}
