//! Client for the cloud management API.
//!
//! The engine only talks to the remote side through [`CloudClient`]:
//! - [`HttpClient`]: the real REST client
//! - [`crate::test_util::FakeCloud`]: deterministic in-memory fake for tests

pub mod http;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::PrivateEndpoint;

pub use http::HttpClient;
pub use types::{
    CloudProviderAccessRole, ConnectedOrgConfig, FeatureId, FeatureUsage, FederationSettings,
};

/// Errors returned by the management API or while talking to it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error {status} ({code}): {detail}")]
    Api {
        status: u16,
        code: String,
        detail: String,
    },

    /// Requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// One method per remote operation the engine may invoke.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// List AWS IAM roles registered for cloud provider access in a project.
    async fn list_roles(&self, project_id: &str) -> Result<Vec<CloudProviderAccessRole>>;

    /// Start a new cloud provider access role.
    async fn create_role(
        &self,
        project_id: &str,
        provider: &str,
    ) -> Result<CloudProviderAccessRole>;

    /// Authorize a created role against an assumed role ARN.
    async fn authorize_role(
        &self,
        project_id: &str,
        role_id: &str,
        provider: &str,
        iam_assumed_role_arn: &str,
    ) -> Result<CloudProviderAccessRole>;

    /// Deauthorize and remove a role.
    async fn deauthorize_role(
        &self,
        project_id: &str,
        role_id: &str,
        provider: &str,
    ) -> Result<()>;

    /// List private network endpoints of a project.
    async fn list_private_endpoints(&self, project_id: &str) -> Result<Vec<PrivateEndpoint>>;

    async fn create_private_endpoint(
        &self,
        project_id: &str,
        endpoint: &PrivateEndpoint,
    ) -> Result<PrivateEndpoint>;

    async fn delete_private_endpoint(&self, project_id: &str, endpoint_id: &str) -> Result<()>;

    /// Federation settings attached to an organization.
    async fn get_federation_settings(&self, org_id: &str) -> Result<FederationSettings>;

    async fn get_connected_org_config(
        &self,
        federation_settings_id: &str,
        org_id: &str,
    ) -> Result<ConnectedOrgConfig>;

    async fn update_connected_org_config(
        &self,
        federation_settings_id: &str,
        config: &ConnectedOrgConfig,
    ) -> Result<ConnectedOrgConfig>;
}
