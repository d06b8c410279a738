//! Project reconciler - converges cloud provider integrations.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use converge_engine::client::CloudClient;
use converge_engine::condition::{ConditionPublisher, ConditionType};
use converge_engine::integration::ensure_cloud_provider_integrations;
use converge_engine::resource::Project;
use converge_engine::workflow::{Reason, WorkflowResult};
use tracing::{info, warn};

use super::{Reconciled, Reconciler};

pub struct ProjectReconciler {
    client: Arc<dyn CloudClient>,
    /// Deletion protection for project sub-resources.
    protected: bool,
}

impl ProjectReconciler {
    pub fn new(client: Arc<dyn CloudClient>, protected: bool) -> Self {
        Self { client, protected }
    }
}

#[async_trait]
impl Reconciler for ProjectReconciler {
    type Resource = Project;

    async fn reconcile(&self, mut project: Project) -> Result<Reconciled<Project>> {
        if project.metadata.reconciliation_should_be_skipped() {
            info!(
                "Skipping project {}: reconciliation policy is skip",
                project.metadata.key()
            );
            return Ok(Reconciled::skipped(project));
        }

        let mut conditions = project.status.conditions.clone();

        if project.id().is_empty() {
            warn!("Project {} has no remote id yet", project.metadata.key());
            let result = WorkflowResult::terminate(
                Reason::Internal,
                "project has no remote id, set status.id to the remote project id",
            )
            .without_retry();
            conditions.set_from_result(ConditionType::Ready, &result);
            project.status.conditions = conditions;
            return Ok(Reconciled {
                resource: project,
                result,
            });
        }

        info!(
            "Reconciling project {} ({})",
            project.metadata.key(),
            project.id()
        );

        let ensured = ensure_cloud_provider_integrations(
            self.client.as_ref(),
            &project,
            self.protected,
            &mut conditions,
        )
        .await;
        conditions.set_from_result(ConditionType::Ready, &ensured.result);

        project.status.conditions = conditions;
        if let Some(statuses) = ensured.statuses {
            project.status.cloud_provider_integrations = statuses;
        }

        if ensured.result.is_ok() {
            let spec = project.spec.clone();
            project
                .metadata
                .set_last_applied(&spec)
                .context("Failed to record last applied configuration")?;
        }

        Ok(Reconciled {
            resource: project,
            result: ensured.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_engine::resource::{
        CloudProviderIntegration, ObjectMeta, ProjectSpec, ANNOTATION_RECONCILIATION_POLICY,
    };
    use converge_engine::status::Phase;
    use converge_engine::test_util::FakeCloud;

    fn project(id: &str) -> Project {
        let mut project = Project {
            metadata: ObjectMeta::new("team"),
            spec: ProjectSpec {
                name: "team".to_string(),
                cloud_provider_integrations: vec![CloudProviderIntegration::new("AWS", "arn:1")],
                ..Default::default()
            },
            ..Default::default()
        };
        project.status.id = id.to_string();
        project
    }

    #[tokio::test]
    async fn test_ok_pass_records_last_applied() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.seed_role("p-1", "AWS", "arn:1");
        let reconciler = ProjectReconciler::new(cloud.clone(), true);

        let reconciled = reconciler.reconcile(project("p-1")).await.unwrap();
        assert!(reconciled.result.is_ok());

        let project = reconciled.resource;
        assert_eq!(
            project.metadata.last_applied::<ProjectSpec>().unwrap(),
            Some(project.spec.clone())
        );
        assert!(project.status.conditions.is_true(ConditionType::Ready));
        assert_eq!(
            project.status.cloud_provider_integrations[0].phase,
            Phase::Authorized
        );
    }

    #[tokio::test]
    async fn test_in_progress_pass_keeps_old_snapshot() {
        let cloud = Arc::new(FakeCloud::new());
        let reconciler = ProjectReconciler::new(cloud.clone(), false);

        let reconciled = reconciler.reconcile(project("p-1")).await.unwrap();
        assert!(reconciled.result.is_in_progress());
        assert!(!reconciled.resource.metadata.has_last_applied());
        assert!(!reconciled
            .resource
            .status
            .conditions
            .is_true(ConditionType::Ready));
    }

    #[tokio::test]
    async fn test_skip_policy_makes_no_calls() {
        let cloud = Arc::new(FakeCloud::new());
        let reconciler = ProjectReconciler::new(cloud.clone(), false);
        let mut project = project("p-1");
        project
            .metadata
            .annotations
            .insert(ANNOTATION_RECONCILIATION_POLICY.to_string(), "skip".to_string());

        let reconciled = reconciler.reconcile(project.clone()).await.unwrap();
        assert!(reconciled.result.is_ok());
        assert_eq!(reconciled.resource, project);
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_project_id_is_not_retried() {
        let cloud = Arc::new(FakeCloud::new());
        let reconciler = ProjectReconciler::new(cloud.clone(), false);

        let reconciled = reconciler.reconcile(project("")).await.unwrap();
        assert!(reconciled.result.is_terminate());
        assert_eq!(reconciled.result.requeue_after(), None);
        assert!(cloud.calls().is_empty());
    }
}
