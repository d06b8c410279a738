//! Desired-state records and their annotations.
//!
//! These are the resources an operator reads from its store. Spec holds
//! what the user declared, status holds what the last pass observed.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::types::role_identifier;
use crate::client::ConnectedOrgConfig;
use crate::condition::Conditions;
use crate::identity::Identifiable;
use crate::status::IntegrationStatus;

/// JSON snapshot of the last spec that reconciled successfully.
pub const ANNOTATION_LAST_APPLIED: &str = "mongodb.com/last-applied-configuration";
/// Reconciliation policy annotation. `skip` disables all work on the resource.
pub const ANNOTATION_RECONCILIATION_POLICY: &str = "mongodb.com/atlas-reconciliation-policy";
pub const RECONCILIATION_POLICY_SKIP: &str = "skip";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// `namespace/name`, or just the name when there is no namespace.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    pub fn reconciliation_should_be_skipped(&self) -> bool {
        self.annotations
            .get(ANNOTATION_RECONCILIATION_POLICY)
            .map(|p| p == RECONCILIATION_POLICY_SKIP)
            .unwrap_or(false)
    }

    pub fn has_last_applied(&self) -> bool {
        self.annotations.contains_key(ANNOTATION_LAST_APPLIED)
    }

    /// Decode the last-applied snapshot. A missing annotation yields `None`.
    pub fn last_applied<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.annotations
            .get(ANNOTATION_LAST_APPLIED)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
    }

    pub fn set_last_applied<T: Serialize>(&mut self, spec: &T) -> Result<(), serde_json::Error> {
        let raw = serde_json::to_string(spec)?;
        self.annotations
            .insert(ANNOTATION_LAST_APPLIED.to_string(), raw);
        Ok(())
    }
}

/// A requested cloud provider access integration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderIntegration {
    pub provider_name: String,
    /// Role ARN the integration assumes. Left empty until the user's IAM
    /// role exists, which is only possible after the remote role was created.
    #[serde(default, rename = "iamAssumedRoleArn")]
    pub iam_assumed_role_arn: String,
}

impl CloudProviderIntegration {
    pub fn new(provider: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            provider_name: provider.into(),
            iam_assumed_role_arn: arn.into(),
        }
    }
}

impl Identifiable for CloudProviderIntegration {
    fn identifier(&self) -> String {
        role_identifier(&self.provider_name, &self.iam_assumed_role_arn)
    }
}

/// A private network endpoint, both as declared and as listed remotely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateEndpoint {
    pub endpoint_id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, rename = "type")]
    pub endpoint_type: String,
}

impl Identifiable for PrivateEndpoint {
    fn identifier(&self) -> String {
        self.endpoint_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    pub name: String,
    /// Deprecated spelling of `cloud_provider_integrations`. Wins when set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cloud_provider_access_roles: Vec<CloudProviderIntegration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cloud_provider_integrations: Vec<CloudProviderIntegration>,
}

impl ProjectSpec {
    /// Declared integrations, honouring the deprecated field.
    pub fn integrations(&self) -> &[CloudProviderIntegration] {
        if !self.cloud_provider_access_roles.is_empty() {
            return &self.cloud_provider_access_roles;
        }
        &self.cloud_provider_integrations
    }

    pub fn uses_deprecated_access_roles(&self) -> bool {
        !self.cloud_provider_access_roles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// Remote project id.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cloud_provider_integrations: Vec<IntegrationStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Project {
    pub metadata: ObjectMeta,
    pub spec: ProjectSpec,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl Project {
    pub fn id(&self) -> &str {
        &self.status.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFederationSpec {
    pub name: String,
    pub project_id: String,
    #[serde(default)]
    pub private_endpoints: Vec<PrivateEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFederationStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFederation {
    pub metadata: ObjectMeta,
    pub spec: DataFederationSpec,
    #[serde(default)]
    pub status: DataFederationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedAuthSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub domain_allow_list: Vec<String>,
    #[serde(default)]
    pub domain_restriction_enabled: bool,
    #[serde(default)]
    pub post_auth_role_grants: Vec<String>,
}

impl FederatedAuthSpec {
    /// The connected-org config this spec asks for.
    pub fn to_connected_org_config(
        &self,
        org_id: &str,
        identity_provider_id: Option<String>,
    ) -> ConnectedOrgConfig {
        ConnectedOrgConfig {
            org_id: org_id.to_string(),
            identity_provider_id,
            domain_allow_list: self.domain_allow_list.clone(),
            domain_restriction_enabled: self.domain_restriction_enabled,
            post_auth_role_grants: self.post_auth_role_grants.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FederatedAuthStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FederatedAuth {
    pub metadata: ObjectMeta,
    pub spec: FederatedAuthSpec,
    #[serde(default)]
    pub status: FederatedAuthStatus,
}

/// Any resource kind the operator knows how to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Project(Project),
    DataFederation(DataFederation),
    FederatedAuth(FederatedAuth),
}

impl Resource {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Project(p) => &p.metadata,
            Resource::DataFederation(d) => &d.metadata,
            Resource::FederatedAuth(f) => &f.metadata,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Project(_) => "Project",
            Resource::DataFederation(_) => "DataFederation",
            Resource::FederatedAuth(_) => "FederatedAuth",
        }
    }
}
