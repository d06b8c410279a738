//! Per-integration status carried between passes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::types::role_identifier;
use crate::client::{CloudProviderAccessRole, FeatureUsage};
use crate::identity::Identifiable;

/// Lifecycle phase of one integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "AUTHORIZED")]
    Authorized,
    #[serde(rename = "FAILED_TO_CREATE")]
    FailedToCreate,
    #[serde(rename = "FAILED_TO_AUTHORIZE")]
    FailedToAuthorize,
    /// Remote-only role slated for removal.
    #[serde(rename = "DEAUTHORIZE")]
    DeAuthorize,
    #[serde(rename = "FAILED_TO_DEAUTHORIZE")]
    FailedToDeAuthorize,
}

impl Phase {
    pub fn is_removal(&self) -> bool {
        matches!(self, Phase::DeAuthorize | Phase::FailedToDeAuthorize)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::New => "NEW",
            Phase::Created => "CREATED",
            Phase::Authorized => "AUTHORIZED",
            Phase::FailedToCreate => "FAILED_TO_CREATE",
            Phase::FailedToAuthorize => "FAILED_TO_AUTHORIZE",
            Phase::DeAuthorize => "DEAUTHORIZE",
            Phase::FailedToDeAuthorize => "FAILED_TO_DEAUTHORIZE",
        };
        f.write_str(s)
    }
}

/// Status of one cloud provider integration as persisted on the project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    pub provider_name: String,
    #[serde(default, rename = "iamAssumedRoleArn")]
    pub iam_assumed_role_arn: String,
    #[serde(default)]
    pub role_id: String,
    #[serde(default, rename = "atlasAWSAccountArn")]
    pub atlas_aws_account_arn: String,
    #[serde(default)]
    pub atlas_assumed_role_external_id: String,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authorized_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_usages: Vec<FeatureUsage>,
    #[serde(rename = "status")]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl IntegrationStatus {
    pub fn new(provider: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            provider_name: provider.into(),
            iam_assumed_role_arn: arn.into(),
            ..Default::default()
        }
    }

    /// A removal entry for a role that exists only remotely.
    pub fn removal(role: &CloudProviderAccessRole) -> Self {
        Self {
            phase: Phase::DeAuthorize,
            ..Self::new(&role.provider_name, &role.iam_assumed_role_arn).linked(role)
        }
    }

    /// Copy remote-assigned data from `role`.
    ///
    /// The phase becomes `Created`, or `Authorized` when the role carries an
    /// authorization date. The requested ARN is kept as is and any earlier
    /// error is cleared.
    pub fn linked(self, role: &CloudProviderAccessRole) -> Self {
        let phase = if role.is_authorized() {
            Phase::Authorized
        } else {
            Phase::Created
        };
        let feature_usages = if role.feature_usages.is_empty() {
            self.feature_usages
        } else {
            role.feature_usages.clone()
        };

        Self {
            role_id: role.role_id.clone(),
            atlas_aws_account_arn: role.atlas_aws_account_arn.clone(),
            atlas_assumed_role_external_id: role.atlas_assumed_role_external_id.clone(),
            created_date: role.created_date,
            authorized_date: role.authorized_date,
            feature_usages,
            phase,
            error_message: String::new(),
            ..self
        }
    }

    /// Record a failed remote call.
    pub fn failed(self, phase: Phase, error: impl fmt::Display) -> Self {
        Self {
            phase,
            error_message: error.to_string(),
            ..self
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    /// Linked to a remote role with a known ARN.
    pub fn is_linked(&self) -> bool {
        !self.iam_assumed_role_arn.is_empty() && !self.role_id.is_empty()
    }
}

impl Identifiable for IntegrationStatus {
    fn identifier(&self) -> String {
        role_identifier(&self.provider_name, &self.iam_assumed_role_arn)
    }
}
