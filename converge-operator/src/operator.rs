//! Operator loop: sweeps the manifest directory, reconciles what is due and
//! writes status back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use converge_engine::client::CloudClient;
use converge_engine::resource::Resource;
use converge_engine::workflow::DEFAULT_RETRY;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::reconciler::{
    DataFederationReconciler, FederatedAuthReconciler, ProjectReconciler, Reconciled, Reconciler,
};
use crate::store::FileStore;

/// Operator settings, usually taken from the command line.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub org_id: Option<String>,
    /// Delay between passes of a converged resource.
    pub resync_interval: Duration,
    pub object_deletion_protection: bool,
    pub subobject_deletion_protection: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            org_id: None,
            resync_interval: Duration::from_secs(30),
            object_deletion_protection: false,
            subobject_deletion_protection: false,
        }
    }
}

/// When a resource is next due.
#[derive(Debug, Clone)]
struct Schedule {
    /// `None` parks the resource until its manifest changes.
    next: Option<Instant>,
    /// Declared part of the manifest as of the last pass.
    fingerprint: String,
}

/// Metadata and spec, serialized. Status changes do not alter it.
fn fingerprint(resource: &Resource) -> String {
    let declared = match resource {
        Resource::Project(p) => serde_json::to_string(&(&p.metadata, &p.spec)),
        Resource::DataFederation(d) => serde_json::to_string(&(&d.metadata, &d.spec)),
        Resource::FederatedAuth(f) => serde_json::to_string(&(&f.metadata, &f.spec)),
    };
    declared.unwrap_or_default()
}

pub struct Operator {
    store: FileStore,
    resync_interval: Duration,
    projects: ProjectReconciler,
    data_federations: DataFederationReconciler,
    federated_auth: FederatedAuthReconciler,
    /// Schedule per manifest key. Keys whose manifest vanished are pruned.
    schedules: HashMap<String, Schedule>,
}

impl Operator {
    pub fn new(store: FileStore, client: Arc<dyn CloudClient>, config: OperatorConfig) -> Self {
        Self {
            store,
            resync_interval: config.resync_interval,
            projects: ProjectReconciler::new(
                Arc::clone(&client),
                config.subobject_deletion_protection,
            ),
            data_federations: DataFederationReconciler::new(Arc::clone(&client)),
            federated_auth: FederatedAuthReconciler::new(
                client,
                config.org_id,
                config.object_deletion_protection,
            ),
            schedules: HashMap::new(),
        }
    }

    fn is_due(&self, key: &str, resource: &Resource, now: Instant) -> bool {
        match self.schedules.get(key) {
            None => true,
            Some(schedule) if schedule.fingerprint != fingerprint(resource) => true,
            Some(schedule) => schedule.next.is_some_and(|next| next <= now),
        }
    }

    async fn reconcile_resource(&self, resource: Resource) -> Result<Reconciled<Resource>> {
        let reconciled = match resource {
            Resource::Project(p) => self.projects.reconcile(p).await?.map(Resource::Project),
            Resource::DataFederation(d) => self
                .data_federations
                .reconcile(d)
                .await?
                .map(Resource::DataFederation),
            Resource::FederatedAuth(f) => self
                .federated_auth
                .reconcile(f)
                .await?
                .map(Resource::FederatedAuth),
        };
        Ok(reconciled)
    }

    /// Reconcile and persist one manifest.
    async fn reconcile_key(&mut self, key: &str, resource: Resource) -> Result<()> {
        let kind = resource.kind();
        let reconciled = self
            .reconcile_resource(resource.clone())
            .await
            .with_context(|| format!("Failed to reconcile {} {}", kind, key))?;

        let result = &reconciled.result;
        if result.is_warning() {
            warn!("{} {} reconciled with warnings", kind, key);
        } else if result.is_ok() {
            info!("{} {} is ready", kind, key);
        } else {
            info!("{} {} not ready: {}", kind, key, result);
        }

        if reconciled.resource != resource {
            self.store
                .put(key, &reconciled.resource)
                .await
                .with_context(|| format!("Failed to persist {} {}", kind, key))?;
        }

        let next = match result.requeue_after() {
            Some(delay) => Some(Instant::now() + delay),
            None if result.is_ok() => Some(Instant::now() + self.resync_interval),
            None => None,
        };
        self.schedules.insert(
            key.to_string(),
            Schedule {
                next,
                fingerprint: fingerprint(&reconciled.resource),
            },
        );
        Ok(())
    }

    /// One sweep over the manifest directory. Returns how many resources ran.
    pub async fn reconcile_all(&mut self) -> Result<usize> {
        let keys = self
            .store
            .keys()
            .await
            .context("Failed to list manifests")?;

        // Prune schedules of removed manifests
        let present: HashSet<&String> = keys.iter().collect();
        self.schedules.retain(|key, _| present.contains(key));

        let now = Instant::now();
        let mut processed = 0;

        for key in &keys {
            let resource = match self.store.get(key).await {
                Ok(resource) => resource,
                Err(e) => {
                    error!("Failed to load manifest {}: {}", key, e);
                    continue;
                }
            };

            if !self.is_due(key, &resource, now) {
                debug!("{} not due yet", key);
                continue;
            }

            if let Err(e) = self.reconcile_key(key, resource).await {
                error!("{:#}", e);
            }
            processed += 1;
        }

        Ok(processed)
    }

    /// Run sweeps until Ctrl-C.
    pub async fn run(&mut self) -> Result<()> {
        let tick = self.resync_interval.min(DEFAULT_RETRY);
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            "Watching {} (sweep every {:?})",
            self.store.dir().display(),
            tick
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.reconcile_all().await {
                        Ok(0) => {}
                        Ok(n) => debug!("Sweep reconciled {} resources", n),
                        Err(e) => error!("Sweep failed: {:#}", e),
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }
}
