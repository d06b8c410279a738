//! In-memory management API.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::client::{
    ClientError, CloudClient, CloudProviderAccessRole, ConnectedOrgConfig, FederationSettings,
    Result,
};
use crate::resource::PrivateEndpoint;

/// 2024-01-01T00:00:00Z
const CREATED_AT: i64 = 1_704_067_200;
/// Five minutes after creation.
const AUTHORIZED_AT: i64 = CREATED_AT + 300;

const ATLAS_ACCOUNT_ARN: &str = "arn:aws:iam::000000000000:root";

/// Remote operations, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListRoles,
    CreateRole,
    AuthorizeRole,
    DeauthorizeRole,
    ListPrivateEndpoints,
    CreatePrivateEndpoint,
    DeletePrivateEndpoint,
    GetFederationSettings,
    GetConnectedOrgConfig,
    UpdateConnectedOrgConfig,
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::CreateRole
                | Operation::AuthorizeRole
                | Operation::DeauthorizeRole
                | Operation::CreatePrivateEndpoint
                | Operation::DeletePrivateEndpoint
                | Operation::UpdateConnectedOrgConfig
        )
    }
}

#[derive(Default)]
struct State {
    roles: HashMap<String, Vec<CloudProviderAccessRole>>,
    endpoints: HashMap<String, Vec<PrivateEndpoint>>,
    /// Federation settings by organization id.
    federations: HashMap<String, FederationSettings>,
    /// Connected-org configs by (federation settings id, org id).
    org_configs: HashMap<(String, String), ConnectedOrgConfig>,
    next_role: u64,
    calls: Vec<Operation>,
    failures: HashMap<Operation, VecDeque<String>>,
}

/// Deterministic fake of the management API.
///
/// Role ids are handed out sequentially and zero-padded (`role-0001`,
/// `role-0002`, ...) so they sort in creation order. All timestamps are
/// fixed, so two runs over the same input produce identical statuses.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and apply any injected failure.
    fn enter(&self, op: Operation) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(op);
        if let Some(detail) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(ClientError::Api {
                status: 500,
                code: "INJECTED_FAILURE".to_string(),
                detail,
            });
        }
        Ok(state)
    }

    /// Make the next call of `op` fail. Stacks when called repeatedly.
    pub fn fail_next(&self, op: Operation, detail: impl Into<String>) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(detail.into());
    }

    pub fn created_at() -> DateTime<Utc> {
        DateTime::from_timestamp(CREATED_AT, 0).unwrap_or_default()
    }

    pub fn authorized_at() -> DateTime<Utc> {
        DateTime::from_timestamp(AUTHORIZED_AT, 0).unwrap_or_default()
    }

    /// Add a role directly, bypassing the call log. Returns its role id.
    pub fn seed_role(&self, project_id: &str, provider: &str, arn: &str) -> String {
        let mut state = self.lock();
        state.next_role += 1;
        let role_id = format!("role-{:04}", state.next_role);
        let role = CloudProviderAccessRole {
            provider_name: provider.to_string(),
            role_id: role_id.clone(),
            iam_assumed_role_arn: arn.to_string(),
            atlas_aws_account_arn: ATLAS_ACCOUNT_ARN.to_string(),
            atlas_assumed_role_external_id: format!("external-{}", state.next_role),
            created_date: Some(Self::created_at()),
            authorized_date: (!arn.is_empty()).then(Self::authorized_at),
            feature_usages: Vec::new(),
        };
        state
            .roles
            .entry(project_id.to_string())
            .or_default()
            .push(role);
        role_id
    }

    pub fn seed_endpoint(&self, project_id: &str, endpoint: PrivateEndpoint) {
        self.lock()
            .endpoints
            .entry(project_id.to_string())
            .or_default()
            .push(endpoint);
    }

    pub fn seed_federation(
        &self,
        org_id: &str,
        settings: FederationSettings,
        config: ConnectedOrgConfig,
    ) {
        let mut state = self.lock();
        state
            .org_configs
            .insert((settings.id.clone(), org_id.to_string()), config);
        state.federations.insert(org_id.to_string(), settings);
    }

    pub fn roles(&self, project_id: &str) -> Vec<CloudProviderAccessRole> {
        self.lock()
            .roles
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn endpoints(&self, project_id: &str) -> Vec<PrivateEndpoint> {
        self.lock()
            .endpoints
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn org_config(&self, settings_id: &str, org_id: &str) -> Option<ConnectedOrgConfig> {
        self.lock()
            .org_configs
            .get(&(settings_id.to_string(), org_id.to_string()))
            .cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    /// Number of mutating calls made so far.
    pub fn mutations(&self) -> usize {
        self.lock().calls.iter().filter(|op| op.is_mutation()).count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn list_roles(&self, project_id: &str) -> Result<Vec<CloudProviderAccessRole>> {
        let state = self.enter(Operation::ListRoles)?;
        Ok(state.roles.get(project_id).cloned().unwrap_or_default())
    }

    async fn create_role(
        &self,
        project_id: &str,
        provider: &str,
    ) -> Result<CloudProviderAccessRole> {
        drop(self.enter(Operation::CreateRole)?);
        let role_id = self.seed_role(project_id, provider, "");
        let created = self
            .roles(project_id)
            .into_iter()
            .find(|r| r.role_id == role_id);
        created.ok_or_else(|| ClientError::NotFound(format!("role {}", role_id)))
    }

    async fn authorize_role(
        &self,
        project_id: &str,
        role_id: &str,
        provider: &str,
        iam_assumed_role_arn: &str,
    ) -> Result<CloudProviderAccessRole> {
        let mut state = self.enter(Operation::AuthorizeRole)?;
        let role = state
            .roles
            .get_mut(project_id)
            .and_then(|roles| {
                roles
                    .iter_mut()
                    .find(|r| r.role_id == role_id && r.provider_name == provider)
            })
            .ok_or_else(|| ClientError::NotFound(format!("role {}", role_id)))?;
        role.iam_assumed_role_arn = iam_assumed_role_arn.to_string();
        role.authorized_date = Some(Self::authorized_at());
        Ok(role.clone())
    }

    async fn deauthorize_role(
        &self,
        project_id: &str,
        role_id: &str,
        provider: &str,
    ) -> Result<()> {
        let mut state = self.enter(Operation::DeauthorizeRole)?;
        let roles = state.roles.entry(project_id.to_string()).or_default();
        let before = roles.len();
        roles.retain(|r| !(r.role_id == role_id && r.provider_name == provider));
        if roles.len() == before {
            return Err(ClientError::NotFound(format!("role {}", role_id)));
        }
        Ok(())
    }

    async fn list_private_endpoints(&self, project_id: &str) -> Result<Vec<PrivateEndpoint>> {
        let state = self.enter(Operation::ListPrivateEndpoints)?;
        Ok(state.endpoints.get(project_id).cloned().unwrap_or_default())
    }

    async fn create_private_endpoint(
        &self,
        project_id: &str,
        endpoint: &PrivateEndpoint,
    ) -> Result<PrivateEndpoint> {
        let mut state = self.enter(Operation::CreatePrivateEndpoint)?;
        let endpoints = state.endpoints.entry(project_id.to_string()).or_default();
        if endpoints.iter().any(|e| e.endpoint_id == endpoint.endpoint_id) {
            return Err(ClientError::Api {
                status: 409,
                code: "DUPLICATE_PRIVATE_ENDPOINT".to_string(),
                detail: format!("endpoint {} already exists", endpoint.endpoint_id),
            });
        }
        endpoints.push(endpoint.clone());
        Ok(endpoint.clone())
    }

    async fn delete_private_endpoint(&self, project_id: &str, endpoint_id: &str) -> Result<()> {
        let mut state = self.enter(Operation::DeletePrivateEndpoint)?;
        let endpoints = state.endpoints.entry(project_id.to_string()).or_default();
        let before = endpoints.len();
        endpoints.retain(|e| e.endpoint_id != endpoint_id);
        if endpoints.len() == before {
            return Err(ClientError::NotFound(format!("endpoint {}", endpoint_id)));
        }
        Ok(())
    }

    async fn get_federation_settings(&self, org_id: &str) -> Result<FederationSettings> {
        let state = self.enter(Operation::GetFederationSettings)?;
        state
            .federations
            .get(org_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("federation settings of {}", org_id)))
    }

    async fn get_connected_org_config(
        &self,
        federation_settings_id: &str,
        org_id: &str,
    ) -> Result<ConnectedOrgConfig> {
        let state = self.enter(Operation::GetConnectedOrgConfig)?;
        state
            .org_configs
            .get(&(federation_settings_id.to_string(), org_id.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("connected org {}", org_id)))
    }

    async fn update_connected_org_config(
        &self,
        federation_settings_id: &str,
        config: &ConnectedOrgConfig,
    ) -> Result<ConnectedOrgConfig> {
        let mut state = self.enter(Operation::UpdateConnectedOrgConfig)?;
        let key = (federation_settings_id.to_string(), config.org_id.clone());
        if !state.org_configs.contains_key(&key) {
            return Err(ClientError::NotFound(format!(
                "connected org {}",
                config.org_id
            )));
        }
        state.org_configs.insert(key, config.clone());
        Ok(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roles_are_sequential_and_deterministic() {
        let cloud = FakeCloud::new();
        let first = cloud.create_role("p1", "AWS").await.unwrap();
        let second = cloud.create_role("p1", "AWS").await.unwrap();

        assert_eq!(first.role_id, "role-0001");
        assert_eq!(second.role_id, "role-0002");
        assert_eq!(first.created_date, Some(FakeCloud::created_at()));
        assert!(!first.is_authorized());

        let authorized = cloud
            .authorize_role("p1", "role-0001", "AWS", "arn:aws:iam::1")
            .await
            .unwrap();
        assert_eq!(authorized.authorized_date, Some(FakeCloud::authorized_at()));
        assert_eq!(cloud.mutations(), 3);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let cloud = FakeCloud::new();
        cloud.fail_next(Operation::ListRoles, "unavailable");

        let err = cloud.list_roles("p1").await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
        assert!(cloud.list_roles("p1").await.unwrap().is_empty());
        assert_eq!(cloud.calls(), vec![Operation::ListRoles, Operation::ListRoles]);
        assert_eq!(cloud.mutations(), 0);
    }

    #[tokio::test]
    async fn test_unknown_objects_are_not_found() {
        let cloud = FakeCloud::new();
        assert!(matches!(
            cloud.deauthorize_role("p1", "role-9", "AWS").await,
            Err(ClientError::NotFound(_))
        ));
        assert!(matches!(
            cloud.delete_private_endpoint("p1", "vpce-1").await,
            Err(ClientError::NotFound(_))
        ));
        assert!(matches!(
            cloud.get_federation_settings("o1").await,
            Err(ClientError::NotFound(_))
        ));
    }
}
