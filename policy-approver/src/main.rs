#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// The approver ships without evaluator or readiness plugins; builds that
/// embed plugins pass them, and any flag registrars, here.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    policy_approver_runtime::Args::parse_and_run(Vec::new(), &[]).await
}
