use crate::{
    flags::{self, FlagRegistrar},
    lease::Election,
};
use anyhow::{bail, Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use futures::prelude::*;
use kube::runtime::{watcher, Controller};
use policy_approver_core::{Aggregator, Manager, Plugin, Registry};
use policy_approver_k8s_api::{
    Api, CertificateRequest, CertificateRequestPolicy, ClusterRoleBinding, RoleBinding,
};
use policy_approver_k8s_controller::{
    policy, request, EventPublisher, KubeEventPublisher, KubeNamespaces, KubeStatusWriter,
    Leader, StatusWriter, StorePolicies, SubjectAccessReviews,
};
use std::{ffi::OsString, sync::Arc, time::Duration};
use tracing::{debug, info, info_span, warn, Instrument};

/// Identifies the approver as the writer of events and conditions.
const CONTROLLER_NAME: &str = "policy.cert-manager.io";

#[derive(Debug, Parser)]
#[clap(
    name = "policy-approver",
    about = "Approves cert-manager CertificateRequests against CertificateRequestPolicies"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "policy_approver=info,warn",
        env = "POLICY_APPROVER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Namespace the approver runs in; holds the leader election Lease.
    #[clap(long, default_value = "cert-manager")]
    controller_namespace: String,

    /// Name of the approver's Deployment, which owns the leader election
    /// Lease.
    #[clap(long, default_value = "cert-manager-approver-policy")]
    controller_deployment_name: String,

    /// Decides requests and writes status without holding the leader
    /// election Lease.
    #[clap(long)]
    leader_election_disabled: bool,

    #[clap(long, default_value = "policy-approver-write")]
    leader_election_lease_name: String,

    /// Seconds a claim on the leader election Lease stays valid without
    /// being renewed.
    #[clap(long, default_value = "30")]
    leader_election_lease_duration_secs: u64,
}

impl Args {
    /// Parses the process arguments, including any flags contributed by
    /// `registrars`, and runs the approver with `plugins`.
    pub async fn parse_and_run(
        plugins: Vec<Plugin>,
        registrars: &[&dyn FlagRegistrar],
    ) -> Result<()> {
        let matches = flags::augment(Self::command(), registrars).get_matches();
        Self::from_matches(&matches, registrars)?.run(plugins).await
    }

    /// Like `parse_and_run`'s parsing, but from an explicit argument list and
    /// returning clap's errors instead of exiting.
    pub fn try_parse_with<I, T>(itr: I, registrars: &[&dyn FlagRegistrar]) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = flags::augment(Self::command(), registrars).try_get_matches_from(itr)?;
        Self::from_matches(&matches, registrars)
    }

    fn from_matches(matches: &ArgMatches, registrars: &[&dyn FlagRegistrar]) -> Result<Self> {
        let args = Self::from_arg_matches(matches)?;
        flags::configure(matches, registrars)?;
        Ok(args)
    }

    pub async fn run(self, plugins: Vec<Plugin>) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            controller_namespace,
            controller_deployment_name,
            leader_election_disabled,
            leader_election_lease_name,
            leader_election_lease_duration_secs,
        } = self;

        let registry = Arc::new(Registry::new(plugins)?);

        let mut prom = <prometheus_client::registry::Registry>::default();
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(?registry, "Plugins registered");
        if !registry.has_evaluators() {
            warn!("No evaluator plugins are registered; every bound and ready policy approves");
        }

        let hostname = std::env::var("HOSTNAME").ok();
        let leader = if leader_election_disabled {
            Leader::Always
        } else {
            let hostname = hostname
                .as_deref()
                .context("HOSTNAME must be set when leader election is enabled")?;
            let election = Election {
                namespace: controller_namespace,
                lease_name: leader_election_lease_name,
                deployment_name: controller_deployment_name,
                field_manager: CONTROLLER_NAME.to_string(),
                lease_duration: Duration::from_secs(leader_election_lease_duration_secs),
                renew_grace_period: Duration::from_secs(1),
            };
            let claims = election.claim(runtime.client(), hostname).await?;
            Leader::lease(hostname, claims)
        };

        let client = runtime.client();
        let events: Arc<dyn EventPublisher> = Arc::new(KubeEventPublisher::new(
            client.clone(),
            CONTROLLER_NAME,
            hostname,
        ));
        let status: Arc<dyn StatusWriter> = Arc::new(KubeStatusWriter::new(client.clone()));

        // Maintain the Ready condition of policies. The controller's store is
        // also the policy cache requests are reviewed against.
        let policies = Api::<CertificateRequestPolicy>::all(client.clone());
        let policy_controller = Controller::new(policies.clone(), watcher::Config::default());
        let policy_store = policy_controller.store();
        let policy_ctx = Arc::new(policy::Context {
            aggregator: Aggregator::new(registry.clone()),
            events: events.clone(),
            status: status.clone(),
            leader: leader.clone(),
        });
        let policy_reconciles = policy_controller
            .run(policy::reconcile, policy::error_policy, policy_ctx)
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!(%obj, "Reconciled"),
                    Err(error) => warn!(%error, "Reconcile failed"),
                }
            });
        let drain = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = policy_reconciles => {}
                    release = drain.signaled() => {
                        debug!("Stopping");
                        drop(release);
                    }
                }
            }
            .instrument(info_span!("certificaterequestpolicies")),
        );

        // Review requests, re-reviewing every pending request whenever a
        // policy or an RBAC binding changes.
        let manager = Manager::new(
            Arc::new(StorePolicies::new(policy_store.clone())),
            Arc::new(KubeNamespaces::new(client.clone())),
            Arc::new(SubjectAccessReviews::new(client.clone())),
            registry,
        );
        let request_controller = Controller::new(
            Api::<CertificateRequest>::all(client.clone()),
            watcher::Config::default(),
        );
        let requests = request_controller.store();
        let request_controller = request_controller
            .watches(policies, watcher::Config::default(), {
                let requests = requests.clone();
                move |_: CertificateRequestPolicy| request::pending(&requests)
            })
            .watches(
                Api::<RoleBinding>::all(client.clone()),
                watcher::Config::default(),
                {
                    let requests = requests.clone();
                    move |_: RoleBinding| request::pending(&requests)
                },
            )
            .watches(
                Api::<ClusterRoleBinding>::all(client),
                watcher::Config::default(),
                move |_: ClusterRoleBinding| request::pending(&requests),
            );
        let request_ctx = Arc::new(request::Context {
            manager,
            events,
            status,
            leader,
        });
        let drain = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                // Requests are only reviewed once the policy cache is complete.
                let request_reconciles = async move {
                    if policy_store.wait_until_ready().await.is_err() {
                        return;
                    }
                    info!("Policy cache ready");
                    request_controller
                        .run(request::reconcile, request::error_policy, request_ctx)
                        .for_each(|res| async move {
                            match res {
                                Ok((obj, _)) => debug!(%obj, "Reconciled"),
                                Err(error) => warn!(%error, "Reconcile failed"),
                            }
                        })
                        .await
                };
                tokio::select! {
                    _ = request_reconciles => {}
                    release = drain.signaled() => {
                        debug!("Stopping");
                        drop(release);
                    }
                }
            }
            .instrument(info_span!("certificaterequests")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait
        // for the controllers to stop before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
