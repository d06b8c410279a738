//! Folds per-item outcomes into one pass result and its condition.

use crate::condition::{ConditionPublisher, ConditionType};
use crate::status::{IntegrationStatus, Phase};
use crate::workflow::{Reason, WorkflowResult};

pub const NOT_SYNCHRONIZED: &str = "not all items were synchronized successfully";
pub const NOT_AUTHORIZED: &str = "not all entries are authorized";
pub const ACCESS_ROLES_DEPRECATED: &str = "The CloudProviderAccessRole has been deprecated, please move your configuration under CloudProviderIntegration.";

/// Overall state of a set of integration statuses after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one item recorded an error.
    Failed,
    /// No errors, but something is not authorized yet.
    Pending,
    AllAuthorized,
}

impl Outcome {
    /// Errors win over pending items. Removed items are no longer in `statuses`.
    pub fn of(statuses: &[IntegrationStatus]) -> Self {
        if statuses.iter().any(IntegrationStatus::has_error) {
            return Outcome::Failed;
        }
        if statuses.iter().all(|s| s.phase == Phase::Authorized) {
            Outcome::AllAuthorized
        } else {
            Outcome::Pending
        }
    }

    /// The pass result for this outcome.
    pub fn to_result(self) -> WorkflowResult {
        match self {
            Outcome::Failed => {
                WorkflowResult::terminate(Reason::CloudIntegrationsNotReady, NOT_SYNCHRONIZED)
            }
            Outcome::Pending => {
                WorkflowResult::in_progress(Reason::CloudIntegrationsNotReady, NOT_AUTHORIZED)
            }
            Outcome::AllAuthorized => WorkflowResult::ok(),
        }
    }
}

/// Compute the result for `statuses` and publish the integration condition.
///
/// `deprecated` adds the deprecation notice to an otherwise ready condition
/// and flags the result as a warning.
pub fn conclude<P>(
    statuses: &[IntegrationStatus],
    deprecated: bool,
    conditions: &mut P,
) -> WorkflowResult
where
    P: ConditionPublisher + ?Sized,
{
    let result = Outcome::of(statuses).to_result();
    if result.is_ok() {
        let message = if deprecated {
            ACCESS_ROLES_DEPRECATED
        } else {
            ""
        };
        conditions.set_true_with_message(ConditionType::CloudProviderIntegrationReady, message);
        if deprecated {
            return result.with_warning();
        }
    } else {
        conditions.set_from_result(ConditionType::CloudProviderIntegrationReady, &result);
    }
    result
}
