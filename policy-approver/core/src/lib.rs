#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Decides whether cert-manager `CertificateRequest`s are approved or denied
//! by the `CertificateRequestPolicy` resources that apply to them, and
//! computes the readiness of those policies.

mod conditions;
mod field_error;
pub mod plugin;
pub mod predicate;
pub mod readiness;
pub mod review;
pub mod wildcard;

#[cfg(test)]
mod tests;

pub use self::{
    conditions::Conditions,
    field_error::{aggregate as aggregate_field_errors, FieldError, FieldErrorKind},
    plugin::{
        EvaluationResponse, Evaluator, Plugin, ReadyResponse, Reconciler, Registry,
        RegistryError, Requeue, Verdict,
    },
    predicate::{Authorizer, NamespaceLookup, Policies, UseCheck},
    readiness::{Aggregator, Readiness, ReadyUpdate},
    review::{Decision, ListPolicies, Manager, ReviewResponse},
};
