//! Cloud provider integrations: link, converge and report.
//!
//! A pass rebuilds the status list from the declared integrations and the
//! remote roles, then drives every entry one step through its lifecycle:
//!
//! ```text
//! New | FailedToCreate          -> create    -> Created | Authorized
//! Created | FailedToAuthorize   -> authorize -> Authorized (needs an ARN)
//! DeAuthorize | FailedToDeAuth  -> remove    -> dropped
//! Authorized                    -> unchanged
//! ```
//!
//! Remote calls are issued one at a time, declared entries first and removals
//! after them in role id order.

use std::collections::{HashSet, VecDeque};
use std::mem;

use tracing::{error, info, warn};

use crate::aggregate;
use crate::client::{CloudClient, CloudProviderAccessRole};
use crate::condition::{ConditionPublisher, ConditionType};
use crate::identity::{difference, Identifiable};
use crate::ownership::{self, OwnershipError, DELETION_PROTECTION_DOCS};
use crate::resource::{CloudProviderIntegration, Project};
use crate::status::{IntegrationStatus, Phase};
use crate::workflow::{Reason, WorkflowResult};

/// Outcome of [`ensure_cloud_provider_integrations`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ensured {
    pub result: WorkflowResult,
    /// New status list to persist. `None` leaves the stored one untouched.
    pub statuses: Option<Vec<IntegrationStatus>>,
}

impl Ensured {
    fn unchanged(result: WorkflowResult) -> Self {
        Self {
            result,
            statuses: None,
        }
    }
}

/// Pair declared integrations with remote roles.
///
/// Declared entries with an ARN link to the remote role with the same
/// provider and ARN. Entries still unlinked then claim remote roles that
/// have no ARN yet, lowest role id first. Remote roles left over are
/// appended as removals.
pub fn link_statuses(
    desired: &[CloudProviderIntegration],
    remote: &[CloudProviderAccessRole],
) -> Vec<IntegrationStatus> {
    let mut remote: Vec<&CloudProviderAccessRole> = remote.iter().collect();
    remote.sort_by(|a, b| a.role_id.cmp(&b.role_id));

    let mut statuses: Vec<IntegrationStatus> = desired
        .iter()
        .map(|d| IntegrationStatus::new(&d.provider_name, &d.iam_assumed_role_arn))
        .collect();

    for status in statuses.iter_mut() {
        let id = status.identifier();
        if id.is_empty() {
            continue;
        }
        if let Some(role) = remote.iter().filter(|r| r.identifier() == id).last() {
            *status = mem::take(status).linked(role);
        }
    }

    let mut unclaimed: VecDeque<&CloudProviderAccessRole> = remote
        .iter()
        .copied()
        .filter(|r| r.iam_assumed_role_arn.is_empty())
        .collect();

    for status in statuses.iter_mut() {
        if status.is_linked() {
            continue;
        }
        let Some(role) = unclaimed.pop_front() else {
            break;
        };
        *status = mem::take(status).linked(role);
    }

    let configured: Vec<&CloudProviderAccessRole> = remote
        .iter()
        .copied()
        .filter(|r| !r.iam_assumed_role_arn.is_empty())
        .collect();
    let stale: Vec<IntegrationStatus> = difference(&configured, &statuses)
        .into_iter()
        .chain(unclaimed.iter())
        .map(|role| IntegrationStatus::removal(role))
        .collect();

    statuses.extend(stale);
    statuses
}

/// Drive one status a single step. `None` means the entry was removed.
pub async fn step<C>(
    client: &C,
    project_id: &str,
    status: IntegrationStatus,
) -> Option<IntegrationStatus>
where
    C: CloudClient + ?Sized,
{
    match status.phase {
        Phase::New | Phase::FailedToCreate => {
            match client.create_role(project_id, &status.provider_name).await {
                Ok(role) => {
                    info!(
                        project_id,
                        role_id = %role.role_id,
                        "Created cloud provider access role"
                    );
                    Some(status.linked(&role))
                }
                Err(e) => {
                    error!(project_id, "failed to start new cloud provider access: {}", e);
                    Some(status.failed(Phase::FailedToCreate, e))
                }
            }
        }
        Phase::Created | Phase::FailedToAuthorize => {
            if status.iam_assumed_role_arn.is_empty() {
                return Some(status);
            }
            match client
                .authorize_role(
                    project_id,
                    &status.role_id,
                    &status.provider_name,
                    &status.iam_assumed_role_arn,
                )
                .await
            {
                Ok(role) => {
                    info!(
                        project_id,
                        role_id = %role.role_id,
                        "Authorized cloud provider access role"
                    );
                    Some(status.linked(&role))
                }
                Err(e) => {
                    error!(
                        project_id,
                        role_id = %status.role_id,
                        "failed to authorize cloud provider access: {}",
                        e
                    );
                    Some(status.failed(Phase::FailedToAuthorize, e))
                }
            }
        }
        Phase::DeAuthorize | Phase::FailedToDeAuthorize => {
            match client
                .deauthorize_role(project_id, &status.role_id, &status.provider_name)
                .await
            {
                Ok(()) => {
                    info!(
                        project_id,
                        role_id = %status.role_id,
                        "Removed cloud provider access role"
                    );
                    None
                }
                Err(e) => {
                    error!(
                        project_id,
                        role_id = %status.role_id,
                        "failed to delete cloud provider access: {}",
                        e
                    );
                    Some(status.failed(Phase::FailedToDeAuthorize, e))
                }
            }
        }
        Phase::Authorized => Some(status),
    }
}

/// Link and step every integration of a project against `remote`.
pub async fn sync_integrations<C>(
    client: &C,
    project_id: &str,
    desired: &[CloudProviderIntegration],
    remote: &[CloudProviderAccessRole],
) -> Vec<IntegrationStatus>
where
    C: CloudClient + ?Sized,
{
    let mut statuses = Vec::new();
    for status in link_statuses(desired, remote) {
        if let Some(status) = step(client, project_id, status).await {
            statuses.push(status);
        }
    }
    statuses
}

/// One reconciliation pass over a project's cloud provider integrations.
///
/// The remote role list is fetched once and shared by the ownership check
/// and the sync. The integration condition is always published, or cleared
/// when the project has neither declared nor recorded integrations.
pub async fn ensure_cloud_provider_integrations<C, P>(
    client: &C,
    project: &Project,
    protected: bool,
    conditions: &mut P,
) -> Ensured
where
    C: CloudClient + ?Sized,
    P: ConditionPublisher + ?Sized,
{
    let project_id = project.id();
    let mut fetched = None;

    if protected {
        let verdict = match client.list_roles(project_id).await {
            Ok(roles) => {
                let verdict = ownership::can_reconcile_integrations(protected, project, &roles);
                fetched = Some(roles);
                verdict
            }
            Err(e) => Err(OwnershipError::from(e)),
        };

        match verdict {
            Ok(true) => {}
            Ok(false) => {
                let result = WorkflowResult::terminate(
                    Reason::DeletionProtection,
                    format!(
                        "unable to reconcile Cloud Provider Integrations due to deletion protection being enabled. {}",
                        DELETION_PROTECTION_DOCS
                    ),
                )
                .without_retry();
                error!(project_id, "{}", result.message());
                conditions.set_from_result(ConditionType::CloudProviderIntegrationReady, &result);
                return Ensured::unchanged(result);
            }
            Err(e) => {
                let result = WorkflowResult::terminate(
                    Reason::Internal,
                    format!("unable to resolve ownership for deletion protection: {}", e),
                );
                error!(project_id, "{}", result.message());
                conditions.set_from_result(ConditionType::CloudProviderIntegrationReady, &result);
                return Ensured::unchanged(result);
            }
        }
    }

    let desired = project.spec.integrations();
    if desired.is_empty() && project.status.cloud_provider_integrations.is_empty() {
        conditions.unset(ConditionType::CloudProviderIntegrationReady);
        return Ensured::unchanged(WorkflowResult::ok());
    }

    let remote = match fetched {
        Some(roles) => roles,
        None => match client.list_roles(project_id).await {
            Ok(roles) => roles,
            Err(e) => {
                let result = WorkflowResult::terminate(
                    Reason::CloudIntegrationsNotReady,
                    format!("unable to fetch cloud provider access: {}", e),
                );
                error!(project_id, "{}", result.message());
                conditions.set_from_result(ConditionType::CloudProviderIntegrationReady, &result);
                return Ensured::unchanged(result);
            }
        },
    };

    let statuses = sync_integrations(client, project_id, desired, &remote).await;
    let deprecated = project.spec.uses_deprecated_access_roles();
    let result = aggregate::conclude(&statuses, deprecated, conditions);
    if deprecated && result.is_ok() {
        warn!(project_id, "{}", aggregate::ACCESS_ROLES_DEPRECATED);
    }

    Ensured {
        result,
        statuses: Some(statuses),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cpi(arn: &str) -> CloudProviderIntegration {
        CloudProviderIntegration::new("AWS", arn)
    }

    fn role(id: &str, arn: &str) -> CloudProviderAccessRole {
        CloudProviderAccessRole {
            provider_name: "AWS".to_string(),
            role_id: id.to_string(),
            iam_assumed_role_arn: arn.to_string(),
            created_date: Some(Utc::now()),
            authorized_date: (!arn.is_empty()).then(Utc::now),
            ..Default::default()
        }
    }

    fn summary(statuses: &[IntegrationStatus]) -> Vec<(String, String, Phase)> {
        statuses
            .iter()
            .map(|s| (s.iam_assumed_role_arn.clone(), s.role_id.clone(), s.phase))
            .collect()
    }

    #[test]
    fn test_link_exact_match() {
        let statuses = link_statuses(&[cpi("arn:1")], &[role("r1", "arn:1")]);
        assert_eq!(
            summary(&statuses),
            vec![("arn:1".into(), "r1".into(), Phase::Authorized)]
        );
    }

    #[test]
    fn test_link_claims_unauthorized_roles_in_role_id_order() {
        let desired = [cpi(""), cpi("arn:new")];
        let remote = [role("r2", ""), role("r1", "")];

        let statuses = link_statuses(&desired, &remote);
        assert_eq!(
            summary(&statuses),
            vec![
                ("".into(), "r1".into(), Phase::Created),
                ("arn:new".into(), "r2".into(), Phase::Created),
            ]
        );
    }

    #[test]
    fn test_link_unmatched_desired_is_new() {
        let statuses = link_statuses(&[cpi("")], &[]);
        assert_eq!(summary(&statuses), vec![("".into(), "".into(), Phase::New)]);
    }

    #[test]
    fn test_link_synthesizes_removals() {
        let desired = [cpi("arn:1")];
        let remote = [role("r3", ""), role("r1", "arn:1"), role("r2", "arn:9")];

        let statuses = link_statuses(&desired, &remote);
        assert_eq!(
            summary(&statuses),
            vec![
                ("arn:1".into(), "r1".into(), Phase::Authorized),
                ("arn:9".into(), "r2".into(), Phase::DeAuthorize),
                ("".into(), "r3".into(), Phase::DeAuthorize),
            ]
        );
    }

    #[test]
    fn test_link_is_deterministic() {
        let desired = [cpi(""), cpi("arn:1")];
        let remote = [role("r2", "arn:1"), role("r1", ""), role("r3", "arn:3")];
        let mut reversed = remote.clone();
        reversed.reverse();

        assert_eq!(
            link_statuses(&desired, &remote),
            link_statuses(&desired, &reversed)
        );
    }
}
