//! Operator sweeps against a manifest directory and the fake management API.

use std::sync::Arc;
use std::time::Duration;

use converge_engine::condition::ConditionType;
use converge_engine::resource::{
    CloudProviderIntegration, ObjectMeta, Project, ProjectSpec, Resource,
    ANNOTATION_RECONCILIATION_POLICY,
};
use converge_engine::status::Phase;
use converge_engine::test_util::FakeCloud;
use converge_operator::{FileStore, Operator, OperatorConfig};
use tempfile::TempDir;

fn project(name: &str, id: &str, arn: &str) -> Project {
    let mut project = Project {
        metadata: ObjectMeta::new(name),
        spec: ProjectSpec {
            name: name.to_string(),
            cloud_provider_integrations: vec![CloudProviderIntegration::new("AWS", arn)],
            ..Default::default()
        },
        ..Default::default()
    };
    project.status.id = id.to_string();
    project
}

fn setup() -> (TempDir, Arc<FakeCloud>, Operator) {
    let dir = TempDir::new().unwrap();
    let cloud = Arc::new(FakeCloud::new());
    let config = OperatorConfig {
        resync_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let operator = Operator::new(FileStore::new(dir.path()), cloud.clone(), config);
    (dir, cloud, operator)
}

async fn load_project(dir: &TempDir, key: &str) -> Project {
    match FileStore::new(dir.path()).get(key).await.unwrap() {
        Resource::Project(p) => p,
        other => panic!("expected a project, got {}", other.kind()),
    }
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_converged_resource_waits_for_resync() {
    let (dir, cloud, mut operator) = setup();
    cloud.seed_role("p-1", "AWS", "arn:1");
    let store = FileStore::new(dir.path());
    store
        .put("team", &Resource::Project(project("team", "p-1", "arn:1")))
        .await
        .unwrap();

    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    assert_eq!(operator.reconcile_all().await.unwrap(), 0);

    let stored = load_project(&dir, "team").await;
    assert!(stored.status.conditions.is_true(ConditionType::Ready));
    assert!(stored.metadata.has_last_applied());
}

#[tokio::test]
async fn test_spec_edit_triggers_pass_and_authorizes() {
    let (dir, cloud, mut operator) = setup();
    let store = FileStore::new(dir.path());
    store
        .put("team", &Resource::Project(project("team", "p-1", "")))
        .await
        .unwrap();

    // First pass creates the role, which cannot be authorized without an ARN.
    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    let stored = load_project(&dir, "team").await;
    assert_eq!(stored.status.cloud_provider_integrations.len(), 1);
    assert_eq!(stored.status.cloud_provider_integrations[0].phase, Phase::Created);
    assert!(!stored.metadata.has_last_applied());
    assert_eq!(cloud.roles("p-1").len(), 1);

    // Requeued, not due yet.
    assert_eq!(operator.reconcile_all().await.unwrap(), 0);

    let mut edited = stored;
    edited.spec.cloud_provider_integrations[0].iam_assumed_role_arn = "arn:1".to_string();
    store.put("team", &Resource::Project(edited)).await.unwrap();

    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    let stored = load_project(&dir, "team").await;
    let status = &stored.status.cloud_provider_integrations[0];
    assert_eq!(status.phase, Phase::Authorized);
    assert_eq!(status.iam_assumed_role_arn, "arn:1");
    assert!(stored.status.conditions.is_true(ConditionType::Ready));
    assert_eq!(
        stored.metadata.last_applied::<ProjectSpec>().unwrap(),
        Some(stored.spec.clone())
    );
    assert_eq!(cloud.roles("p-1").len(), 1);
}

#[tokio::test]
async fn test_non_retryable_failure_parks_until_edited() {
    let (dir, cloud, mut operator) = setup();
    cloud.seed_role("p-1", "AWS", "arn:1");
    let store = FileStore::new(dir.path());
    store
        .put("team", &Resource::Project(project("team", "", "arn:1")))
        .await
        .unwrap();

    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    assert_eq!(operator.reconcile_all().await.unwrap(), 0);
    assert!(cloud.calls().is_empty());

    let mut fixed = load_project(&dir, "team").await;
    fixed.status.id = "p-1".to_string();
    fixed.spec.name = "team-renamed".to_string();
    store.put("team", &Resource::Project(fixed)).await.unwrap();

    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    let stored = load_project(&dir, "team").await;
    assert!(stored.status.conditions.is_true(ConditionType::Ready));
}

// ============================================================================
// Manifest handling
// ============================================================================

#[tokio::test]
async fn test_skip_annotation_is_honored() {
    let (dir, cloud, mut operator) = setup();
    let store = FileStore::new(dir.path());
    let mut skipped = project("team", "p-1", "");
    skipped
        .metadata
        .annotations
        .insert(ANNOTATION_RECONCILIATION_POLICY.to_string(), "skip".to_string());
    let resource = Resource::Project(skipped);
    store.put("team", &resource).await.unwrap();

    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    assert!(cloud.calls().is_empty());
    assert_eq!(store.get("team").await.unwrap(), resource);
}

#[tokio::test]
async fn test_undecodable_manifest_is_skipped() {
    let (dir, cloud, mut operator) = setup();
    cloud.seed_role("p-1", "AWS", "arn:1");
    std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();
    FileStore::new(dir.path())
        .put("team", &Resource::Project(project("team", "p-1", "arn:1")))
        .await
        .unwrap();

    assert_eq!(operator.reconcile_all().await.unwrap(), 1);
    let stored = load_project(&dir, "team").await;
    assert!(stored.status.conditions.is_true(ConditionType::Ready));
}
