//! Externally published readiness conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
    CloudProviderIntegrationReady,
    PrivateEndpointReady,
    FederatedAuthReady,
}

/// One condition on a resource status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

/// Sink for condition updates computed by a pass.
pub trait ConditionPublisher {
    fn set(
        &mut self,
        condition_type: ConditionType,
        status: bool,
        reason: Option<String>,
        message: Option<String>,
    );

    fn unset(&mut self, condition_type: ConditionType);

    /// Mirror a result: `Ok` is true, anything else false with reason and message.
    fn set_from_result(&mut self, condition_type: ConditionType, result: &WorkflowResult) {
        if result.is_ok() {
            let message = Some(result.message().to_string()).filter(|m| !m.is_empty());
            self.set(condition_type, true, None, message);
        } else {
            self.set(
                condition_type,
                false,
                result.reason().map(|r| r.to_string()),
                Some(result.message().to_string()),
            );
        }
    }

    fn set_true_with_message(&mut self, condition_type: ConditionType, message: &str) {
        let message = Some(message.to_string()).filter(|m| !m.is_empty());
        self.set(condition_type, true, None, message);
    }

    fn set_false(&mut self, condition_type: ConditionType) {
        self.set(condition_type, false, None, None);
    }
}

/// Condition list as persisted on a resource status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.condition_type == condition_type)
    }

    pub fn is_true(&self, condition_type: ConditionType) -> bool {
        self.get(condition_type).map(|c| c.status).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ConditionPublisher for Conditions {
    fn set(
        &mut self,
        condition_type: ConditionType,
        status: bool,
        reason: Option<String>,
        message: Option<String>,
    ) {
        match self.0.iter_mut().find(|c| c.condition_type == condition_type) {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = Utc::now();
                }
                existing.status = status;
                existing.reason = reason;
                existing.message = message;
            }
            None => self.0.push(Condition {
                condition_type,
                status,
                reason,
                message,
                last_transition_time: Utc::now(),
            }),
        }
    }

    fn unset(&mut self, condition_type: ConditionType) {
        self.0.retain(|c| c.condition_type != condition_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Reason;

    #[test]
    fn test_set_from_result_ok_is_true() {
        let mut conditions = Conditions::new();
        conditions.set_from_result(ConditionType::Ready, &WorkflowResult::ok());

        let ready = conditions.get(ConditionType::Ready).unwrap();
        assert!(ready.status);
        assert_eq!(ready.reason, None);
        assert_eq!(ready.message, None);
    }

    #[test]
    fn test_set_from_result_terminate_carries_reason() {
        let mut conditions = Conditions::new();
        let result = WorkflowResult::terminate(Reason::DeletionProtection, "blocked");
        conditions.set_from_result(ConditionType::CloudProviderIntegrationReady, &result);

        let c = conditions
            .get(ConditionType::CloudProviderIntegrationReady)
            .unwrap();
        assert!(!c.status);
        assert_eq!(c.reason.as_deref(), Some("DeletionProtection"));
        assert_eq!(c.message.as_deref(), Some("blocked"));
    }

    #[test]
    fn test_transition_time_only_moves_on_flip() {
        let mut conditions = Conditions::new();
        conditions.set_false(ConditionType::Ready);
        let first = conditions.get(ConditionType::Ready).unwrap().last_transition_time;

        conditions.set(ConditionType::Ready, false, Some("Still".into()), None);
        assert_eq!(
            conditions.get(ConditionType::Ready).unwrap().last_transition_time,
            first
        );
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_unset_removes_condition() {
        let mut conditions = Conditions::new();
        conditions.set_true_with_message(ConditionType::PrivateEndpointReady, "");
        conditions.set_false(ConditionType::Ready);

        conditions.unset(ConditionType::PrivateEndpointReady);
        assert!(conditions.get(ConditionType::PrivateEndpointReady).is_none());
        assert!(!conditions.is_true(ConditionType::Ready));
        assert_eq!(conditions.len(), 1);
    }
}
