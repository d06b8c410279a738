//! Federated auth reconciler.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use converge_engine::client::CloudClient;
use converge_engine::federation::ensure_federated_auth;
use converge_engine::resource::FederatedAuth;
use tracing::info;

use super::{Reconciled, Reconciler};

pub struct FederatedAuthReconciler {
    client: Arc<dyn CloudClient>,
    org_id: Option<String>,
    /// Deletion protection for top-level objects.
    protected: bool,
}

impl FederatedAuthReconciler {
    pub fn new(client: Arc<dyn CloudClient>, org_id: Option<String>, protected: bool) -> Self {
        Self {
            client,
            org_id,
            protected,
        }
    }
}

#[async_trait]
impl Reconciler for FederatedAuthReconciler {
    type Resource = FederatedAuth;

    async fn reconcile(&self, mut auth: FederatedAuth) -> Result<Reconciled<FederatedAuth>> {
        if auth.metadata.reconciliation_should_be_skipped() {
            info!(
                "Skipping federated auth {}: reconciliation policy is skip",
                auth.metadata.key()
            );
            return Ok(Reconciled::skipped(auth));
        }

        info!("Reconciling federated auth {}", auth.metadata.key());

        let mut conditions = auth.status.conditions.clone();
        let result = ensure_federated_auth(
            self.client.as_ref(),
            &auth,
            self.org_id.as_deref(),
            self.protected,
            &mut conditions,
        )
        .await;
        auth.status.conditions = conditions;

        if result.is_ok() {
            let spec = auth.spec.clone();
            auth.metadata
                .set_last_applied(&spec)
                .context("Failed to record last applied configuration")?;
        }

        Ok(Reconciled {
            resource: auth,
            result,
        })
    }
}
