//! Deletion-protection gate.
//!
//! With protection enabled the operator may only mutate remote state it can
//! show it owns. Ownership is decided from three views of the same
//! collection: what was last applied successfully, what is declared now and
//! what exists remotely. Callers fetch the remote view once and hand it in,
//! or pass a closure that looks it up.

use std::future::Future;

use thiserror::Error;
use tracing::debug;

use crate::client::{ClientError, CloudProviderAccessRole};
use crate::identity::{difference, Identifiable};
use crate::resource::{Project, ProjectSpec};

pub const DELETION_PROTECTION_DOCS: &str =
    "see https://dochub.mongodb.org/core/ako-deletion-protection for further information";

/// Ownership could not be decided.
#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("malformed last applied configuration: {0}")]
    MalformedLastApplied(#[from] serde_json::Error),

    #[error("{0}")]
    Remote(#[from] ClientError),
}

/// Whether reconciliation may mutate the remote collection.
///
/// Permitted when protection is off, when nothing exists remotely, when
/// every remote item was part of the last applied configuration, or when
/// every currently declared item is already present remotely.
pub fn resolve<D, L, R>(protected: bool, last_applied: &[L], current: &[D], remote: &[R]) -> bool
where
    D: Identifiable,
    L: Identifiable,
    R: Identifiable,
{
    if !protected || remote.is_empty() {
        return true;
    }

    if difference(remote, last_applied).is_empty() {
        return true;
    }

    difference(current, remote).is_empty()
}

/// Ownership check for a project's cloud provider integrations.
///
/// Remote roles without an assumed role ARN are not user-visible yet and
/// take no part in the decision.
pub fn can_reconcile_integrations(
    protected: bool,
    project: &Project,
    remote: &[CloudProviderAccessRole],
) -> Result<bool, OwnershipError> {
    if !protected {
        return Ok(true);
    }

    let last_applied: ProjectSpec = project.metadata.last_applied()?.unwrap_or_default();
    let remote: Vec<&CloudProviderAccessRole> = remote
        .iter()
        .filter(|r| !r.iam_assumed_role_arn.is_empty())
        .collect();

    let permitted = resolve(
        protected,
        last_applied.integrations(),
        project.spec.integrations(),
        &remote,
    );
    debug!(
        project_id = %project.id(),
        remote = remote.len(),
        permitted,
        "resolved integration ownership"
    );
    Ok(permitted)
}

/// Generic ownership check for single-object resources.
///
/// `managed_by_operator` is true when the resource carries a last-applied
/// snapshot. Otherwise `diverged` is asked whether the remote object differs
/// from the declared one, and the operator owns it only if it does not.
pub async fn is_owner<F, Fut>(
    protected: bool,
    managed_by_operator: bool,
    diverged: F,
) -> Result<bool, OwnershipError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<bool, ClientError>>,
{
    if !protected || managed_by_operator {
        return Ok(true);
    }

    Ok(!diverged().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CloudProviderIntegration, ANNOTATION_LAST_APPLIED};

    fn cpi(arn: &str) -> CloudProviderIntegration {
        CloudProviderIntegration::new("AWS", arn)
    }

    fn role(id: &str, arn: &str) -> CloudProviderAccessRole {
        CloudProviderAccessRole {
            provider_name: "AWS".to_string(),
            role_id: id.to_string(),
            iam_assumed_role_arn: arn.to_string(),
            ..Default::default()
        }
    }

    fn project(
        current: Vec<CloudProviderIntegration>,
        last: Option<Vec<CloudProviderIntegration>>,
    ) -> Project {
        let mut project = Project::default();
        project.status.id = "p1".to_string();
        project.spec.cloud_provider_integrations = current;
        if let Some(last) = last {
            let spec = ProjectSpec {
                cloud_provider_integrations: last,
                ..Default::default()
            };
            project.metadata.set_last_applied(&spec).unwrap();
        }
        project
    }

    #[test]
    fn test_empty_remote_is_always_permitted() {
        let remote: Vec<CloudProviderIntegration> = vec![];
        assert!(resolve(true, &[cpi("a")], &[cpi("b"), cpi("")], &remote));
        assert!(resolve(true, &[] as &[CloudProviderIntegration], &[cpi("b")], &remote));
    }

    #[test]
    fn test_remote_equal_to_last_applied_is_permitted() {
        let last = [cpi("arn:1"), cpi("arn:2")];
        let remote = [cpi("arn:2"), cpi("arn:1")];
        assert!(resolve(true, &last, &[cpi("arn:7")], &remote));
        assert!(resolve(true, &last, &[] as &[CloudProviderIntegration], &remote));
    }

    #[test]
    fn test_drift_permitted_when_current_is_reflected() {
        let last = [cpi("arn:aws:iam::1")];
        let remote = [cpi("arn:aws:iam::1"), cpi("arn:aws:iam::2")];
        assert!(resolve(true, &last, &[cpi("arn:aws:iam::1")], &remote));
        assert!(!resolve(true, &last, &[cpi("arn:aws:iam::3")], &remote));
    }

    #[test]
    fn test_unlinked_current_item_blocks_on_drift() {
        let last: [CloudProviderIntegration; 0] = [];
        let remote = [cpi("arn:1")];
        assert!(!resolve(true, &last, &[cpi("")], &remote));
    }

    #[test]
    fn test_disabled_protection_permits_everything() {
        let last: [CloudProviderIntegration; 0] = [];
        assert!(resolve(false, &last, &[cpi("x")], &[cpi("y")]));
    }

    #[test]
    fn test_integrations_ignore_unauthorized_remote_roles() {
        let project = project(vec![cpi("arn:3")], None);
        let remote = vec![role("r1", "")];
        assert!(can_reconcile_integrations(true, &project, &remote).unwrap());

        let remote = vec![role("r1", ""), role("r2", "arn:2")];
        assert!(!can_reconcile_integrations(true, &project, &remote).unwrap());
    }

    #[test]
    fn test_integrations_use_last_applied_snapshot() {
        let project = project(vec![cpi("arn:3")], Some(vec![cpi("arn:2")]));
        let remote = vec![role("r2", "arn:2")];
        assert!(can_reconcile_integrations(true, &project, &remote).unwrap());
    }

    #[test]
    fn test_malformed_snapshot_is_an_error() {
        let mut project = project(vec![], None);
        project
            .metadata
            .annotations
            .insert(ANNOTATION_LAST_APPLIED.to_string(), "[".to_string());
        let err = can_reconcile_integrations(true, &project, &[role("r1", "arn:1")]).unwrap_err();
        assert!(matches!(err, OwnershipError::MalformedLastApplied(_)));
    }

    #[tokio::test]
    async fn test_is_owner() {
        let diverged = || async { Ok(true) };
        assert!(is_owner(false, false, diverged).await.unwrap());
        assert!(is_owner(true, true, diverged).await.unwrap());
        assert!(!is_owner(true, false, diverged).await.unwrap());
        assert!(is_owner(true, false, || async { Ok(false) }).await.unwrap());

        let failing = || async { Err(ClientError::NotFound("settings".to_string())) };
        assert!(matches!(
            is_owner(true, false, failing).await,
            Err(OwnershipError::Remote(_))
        ));
    }
}
