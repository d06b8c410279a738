//! REST client for the cloud management API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ClientError, CloudClient, CloudProviderAccessRole, ConnectedOrgConfig, FederationSettings,
    Result,
};
use crate::resource::PrivateEndpoint;

const ACCEPT: &str = "application/vnd.atlas.2023-11-15+json";

/// Error body returned by the API on non-success responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleList {
    #[serde(default)]
    aws_iam_roles: Vec<CloudProviderAccessRole>,
}

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleRequest<'a> {
    provider_name: &'a str,
    #[serde(rename = "iamAssumedRoleArn", skip_serializing_if = "Option::is_none")]
    iam_assumed_role_arn: Option<&'a str>,
}

/// HTTP implementation of [`CloudClient`].
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/atlas/v2{}", self.base_url, path);
        debug!(%method, %url, "management API request");
        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, ACCEPT);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(api_error(status, &body));
        }

        Ok(())
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    let parsed: ApiErrorBody = serde_json::from_slice(body).unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return ClientError::NotFound(parsed.detail);
    }
    ClientError::Api {
        status: status.as_u16(),
        code: parsed.error_code,
        detail: parsed.detail,
    }
}

#[async_trait]
impl CloudClient for HttpClient {
    async fn list_roles(&self, project_id: &str) -> Result<Vec<CloudProviderAccessRole>> {
        let path = format!("/groups/{}/cloudProviderAccess", project_id);
        let list: RoleList = self.send(self.request(Method::GET, &path)).await?;
        Ok(list.aws_iam_roles)
    }

    async fn create_role(
        &self,
        project_id: &str,
        provider: &str,
    ) -> Result<CloudProviderAccessRole> {
        let path = format!("/groups/{}/cloudProviderAccess", project_id);
        let body = RoleRequest {
            provider_name: provider,
            iam_assumed_role_arn: None,
        };
        self.send(self.request(Method::POST, &path).json(&body)).await
    }

    async fn authorize_role(
        &self,
        project_id: &str,
        role_id: &str,
        provider: &str,
        iam_assumed_role_arn: &str,
    ) -> Result<CloudProviderAccessRole> {
        let path = format!("/groups/{}/cloudProviderAccess/{}", project_id, role_id);
        let body = RoleRequest {
            provider_name: provider,
            iam_assumed_role_arn: Some(iam_assumed_role_arn),
        };
        self.send(self.request(Method::PATCH, &path).json(&body)).await
    }

    async fn deauthorize_role(
        &self,
        project_id: &str,
        role_id: &str,
        provider: &str,
    ) -> Result<()> {
        let path = format!(
            "/groups/{}/cloudProviderAccess/{}/{}",
            project_id, provider, role_id
        );
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    async fn list_private_endpoints(&self, project_id: &str) -> Result<Vec<PrivateEndpoint>> {
        let path = format!("/groups/{}/privateNetworkSettings/endpointIds", project_id);
        let page: Paginated<PrivateEndpoint> = self.send(self.request(Method::GET, &path)).await?;
        Ok(page.results)
    }

    async fn create_private_endpoint(
        &self,
        project_id: &str,
        endpoint: &PrivateEndpoint,
    ) -> Result<PrivateEndpoint> {
        let path = format!("/groups/{}/privateNetworkSettings/endpointIds", project_id);
        let page: Paginated<PrivateEndpoint> = self
            .send(self.request(Method::POST, &path).json(endpoint))
            .await?;
        page.results
            .into_iter()
            .find(|e| e.endpoint_id == endpoint.endpoint_id)
            .ok_or_else(|| ClientError::NotFound(endpoint.endpoint_id.clone()))
    }

    async fn delete_private_endpoint(&self, project_id: &str, endpoint_id: &str) -> Result<()> {
        let path = format!(
            "/groups/{}/privateNetworkSettings/endpointIds/{}",
            project_id, endpoint_id
        );
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    async fn get_federation_settings(&self, org_id: &str) -> Result<FederationSettings> {
        let path = format!("/orgs/{}/federationSettings", org_id);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn get_connected_org_config(
        &self,
        federation_settings_id: &str,
        org_id: &str,
    ) -> Result<ConnectedOrgConfig> {
        let path = format!(
            "/federationSettings/{}/connectedOrgConfigs/{}",
            federation_settings_id, org_id
        );
        self.send(self.request(Method::GET, &path)).await
    }

    async fn update_connected_org_config(
        &self,
        federation_settings_id: &str,
        config: &ConnectedOrgConfig,
    ) -> Result<ConnectedOrgConfig> {
        let path = format!(
            "/federationSettings/{}/connectedOrgConfigs/{}",
            federation_settings_id, config.org_id
        );
        self.send(self.request(Method::PATCH, &path).json(config)).await
    }
}
