//! Data federation reconciler - converges private endpoints.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use converge_engine::client::CloudClient;
use converge_engine::condition::{ConditionPublisher, ConditionType};
use converge_engine::endpoint::ensure_private_endpoints;
use converge_engine::resource::DataFederation;
use tracing::info;

use super::{Reconciled, Reconciler};

pub struct DataFederationReconciler {
    client: Arc<dyn CloudClient>,
}

impl DataFederationReconciler {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reconciler for DataFederationReconciler {
    type Resource = DataFederation;

    async fn reconcile(
        &self,
        mut federation: DataFederation,
    ) -> Result<Reconciled<DataFederation>> {
        if federation.metadata.reconciliation_should_be_skipped() {
            info!(
                "Skipping data federation {}: reconciliation policy is skip",
                federation.metadata.key()
            );
            return Ok(Reconciled::skipped(federation));
        }

        info!(
            "Reconciling data federation {} in project {}",
            federation.spec.name, federation.spec.project_id
        );

        let mut conditions = federation.status.conditions.clone();
        let result = ensure_private_endpoints(
            self.client.as_ref(),
            &federation.spec.project_id,
            &federation.spec.private_endpoints,
            &mut conditions,
        )
        .await;
        conditions.set_from_result(ConditionType::Ready, &result);
        federation.status.conditions = conditions;

        Ok(Reconciled {
            resource: federation,
            result,
        })
    }
}
