//! Objects as reported by the management API.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identifiable;

/// A cloud provider access role as known remotely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderAccessRole {
    pub provider_name: String,
    #[serde(default)]
    pub role_id: String,
    /// Empty until the role has been authorized.
    #[serde(default, rename = "iamAssumedRoleArn")]
    pub iam_assumed_role_arn: String,
    #[serde(default, rename = "atlasAWSAccountArn")]
    pub atlas_aws_account_arn: String,
    #[serde(default)]
    pub atlas_assumed_role_external_id: String,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authorized_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub feature_usages: Vec<FeatureUsage>,
}

impl CloudProviderAccessRole {
    pub fn is_authorized(&self) -> bool {
        self.authorized_date.is_some()
    }
}

impl Identifiable for CloudProviderAccessRole {
    fn identifier(&self) -> String {
        role_identifier(&self.provider_name, &self.iam_assumed_role_arn)
    }
}

/// Identifier shared by desired integrations, statuses and remote roles.
pub(crate) fn role_identifier(provider: &str, arn: &str) -> String {
    if arn.is_empty() {
        return String::new();
    }
    format!("{}.{}", provider, arn)
}

/// A feature that uses a role (exports, data lakes, encryption at rest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsage {
    pub feature_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<FeatureId>,
}

/// The shapes a feature identifier comes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Plain id, e.g. a project id for encryption at rest.
    Id(String),
    /// Bucket-scoped id used by exports and data lakes.
    Bucket {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "bucketName")]
        bucket_name: String,
    },
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Id(id) => f.write_str(id),
            FeatureId::Bucket {
                group_id,
                bucket_name,
            } => write!(f, "{}/{}", group_id, bucket_name),
        }
    }
}

/// Organization-level federation settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationSettings {
    pub id: String,
    #[serde(default)]
    pub identity_provider_id: Option<String>,
}

/// How an organization is connected to a federation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedOrgConfig {
    pub org_id: String,
    #[serde(default)]
    pub identity_provider_id: Option<String>,
    #[serde(default)]
    pub domain_allow_list: Vec<String>,
    #[serde(default)]
    pub domain_restriction_enabled: bool,
    #[serde(default)]
    pub post_auth_role_grants: Vec<String>,
}
