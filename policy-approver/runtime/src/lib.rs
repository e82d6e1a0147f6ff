#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use policy_approver_core as core;
pub use policy_approver_k8s_api as k8s;
pub use policy_approver_k8s_controller as controller;

mod args;
mod flags;
mod lease;

pub use self::{args::Args, flags::FlagRegistrar};
