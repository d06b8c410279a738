//! Federated authentication of an organization.

use std::collections::BTreeSet;

use tracing::{error, info};

use crate::client::{ClientError, CloudClient, ConnectedOrgConfig};
use crate::condition::{ConditionPublisher, ConditionType};
use crate::ownership::{self, DELETION_PROTECTION_DOCS};
use crate::resource::FederatedAuth;
use crate::workflow::{Reason, WorkflowResult};

/// Compare two connected-org configs, ignoring list order.
pub fn settings_are_equal(desired: &ConnectedOrgConfig, remote: &ConnectedOrgConfig) -> bool {
    fn set(list: &[String]) -> BTreeSet<&str> {
        list.iter().map(String::as_str).collect()
    }

    desired.org_id == remote.org_id
        && desired.identity_provider_id == remote.identity_provider_id
        && desired.domain_restriction_enabled == remote.domain_restriction_enabled
        && set(&desired.domain_allow_list) == set(&remote.domain_allow_list)
        && set(&desired.post_auth_role_grants) == set(&remote.post_auth_role_grants)
}

/// Desired and current connected-org config for `org_id`.
async fn fetch<C>(
    client: &C,
    auth: &FederatedAuth,
    org_id: &str,
) -> Result<(String, ConnectedOrgConfig, ConnectedOrgConfig), ClientError>
where
    C: CloudClient + ?Sized,
{
    let settings = client.get_federation_settings(org_id).await?;
    let remote = client.get_connected_org_config(&settings.id, org_id).await?;
    let desired = auth
        .spec
        .to_connected_org_config(org_id, remote.identity_provider_id.clone());
    Ok((settings.id, desired, remote))
}

/// Whether the remote config differs from the declared one.
pub async fn managed_by_remote<C>(
    client: &C,
    auth: &FederatedAuth,
    org_id: &str,
) -> Result<bool, ClientError>
where
    C: CloudClient + ?Sized,
{
    let (_, desired, remote) = fetch(client, auth, org_id).await?;
    Ok(!settings_are_equal(&desired, &remote))
}

/// One reconciliation pass over a federated auth resource.
///
/// A disabled spec is left alone. Publishes `FederatedAuthReady` on every
/// path and `Ready` once the ownership checks passed.
pub async fn ensure_federated_auth<C, P>(
    client: &C,
    auth: &FederatedAuth,
    org_id: Option<&str>,
    protected: bool,
    conditions: &mut P,
) -> WorkflowResult
where
    C: CloudClient + ?Sized,
    P: ConditionPublisher + ?Sized,
{
    if !auth.spec.enabled {
        info!(
            "Federated auth {} is disabled, leaving remote config as is",
            auth.metadata.key()
        );
        let result = WorkflowResult::ok();
        conditions.set_from_result(ConditionType::FederatedAuthReady, &result);
        conditions.set_from_result(ConditionType::Ready, &result);
        return result;
    }

    let Some(org_id) = org_id.filter(|id| !id.is_empty()) else {
        let result = WorkflowResult::terminate(
            Reason::ApiAccessNotConfigured,
            "no organization id configured for federated authentication",
        )
        .without_retry();
        conditions.set_from_result(ConditionType::FederatedAuthReady, &result);
        return result;
    };

    let owner = ownership::is_owner(protected, auth.metadata.has_last_applied(), || {
        managed_by_remote(client, auth, org_id)
    })
    .await;

    match owner {
        Ok(true) => {}
        Ok(false) => {
            let result = WorkflowResult::terminate(
                Reason::DeletionProtection,
                format!(
                    "unable to reconcile FederatedAuthConfig due to deletion protection being enabled. {}",
                    DELETION_PROTECTION_DOCS
                ),
            )
            .without_retry();
            error!(org_id, "{}", result.message());
            conditions.set_from_result(ConditionType::FederatedAuthReady, &result);
            return result;
        }
        Err(e) => {
            let result = WorkflowResult::terminate(
                Reason::Internal,
                format!("unable to resolve ownership for deletion protection: {}", e),
            );
            error!(org_id, "{}", result.message());
            conditions.set_from_result(ConditionType::FederatedAuthReady, &result);
            return result;
        }
    }

    let result = sync_federated_auth(client, auth, org_id).await;
    conditions.set_from_result(ConditionType::FederatedAuthReady, &result);
    conditions.set_from_result(ConditionType::Ready, &result);
    result
}

async fn sync_federated_auth<C>(client: &C, auth: &FederatedAuth, org_id: &str) -> WorkflowResult
where
    C: CloudClient + ?Sized,
{
    let (settings_id, desired, remote) = match fetch(client, auth, org_id).await {
        Ok(found) => found,
        Err(e) => {
            error!(org_id, "failed to read federation settings: {}", e);
            return WorkflowResult::terminate(Reason::FederatedAuthNotReady, e.to_string());
        }
    };

    if settings_are_equal(&desired, &remote) {
        return WorkflowResult::ok();
    }

    match client
        .update_connected_org_config(&settings_id, &desired)
        .await
    {
        Ok(_) => {
            info!(org_id, federation_settings_id = %settings_id, "Updated connected org config");
            WorkflowResult::ok()
        }
        Err(e) => {
            error!(org_id, "failed to update connected org config: {}", e);
            WorkflowResult::terminate(Reason::FederatedAuthNotReady, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(domains: &[&str], grants: &[&str]) -> ConnectedOrgConfig {
        ConnectedOrgConfig {
            org_id: "o1".to_string(),
            identity_provider_id: Some("idp".to_string()),
            domain_allow_list: domains.iter().map(|d| d.to_string()).collect(),
            domain_restriction_enabled: true,
            post_auth_role_grants: grants.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_equality_ignores_order() {
        assert!(settings_are_equal(
            &config(&["a.com", "b.com"], &["ORG_MEMBER", "ORG_OWNER"]),
            &config(&["b.com", "a.com"], &["ORG_OWNER", "ORG_MEMBER"]),
        ));
    }

    #[test]
    fn test_inequality() {
        let base = config(&["a.com"], &["ORG_MEMBER"]);
        assert!(!settings_are_equal(&base, &config(&["c.com"], &["ORG_MEMBER"])));

        let mut other = base.clone();
        other.domain_restriction_enabled = false;
        assert!(!settings_are_equal(&base, &other));

        let mut other = base.clone();
        other.identity_provider_id = None;
        assert!(!settings_are_equal(&base, &other));
    }
}
