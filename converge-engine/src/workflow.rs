//! Outcome of one reconciliation pass.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay before a pass that did not finish is retried.
pub const DEFAULT_RETRY: Duration = Duration::from_secs(10);

/// Machine-readable reason attached to non-Ok results and conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    Internal,
    DeletionProtection,
    CloudIntegrationsNotReady,
    PrivateEndpointsNotReady,
    FederatedAuthNotReady,
    ApiAccessNotConfigured,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Internal => "InternalError",
            Reason::DeletionProtection => "DeletionProtection",
            Reason::CloudIntegrationsNotReady => "CloudIntegrationsNotReady",
            Reason::PrivateEndpointsNotReady => "PrivateEndpointsNotReady",
            Reason::FederatedAuthNotReady => "FederatedAuthNotReady",
            Reason::ApiAccessNotConfigured => "ApiAccessNotConfigured",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Ok,
    InProgress,
    Terminate,
}

/// Result of a pass: `Ok`, `InProgress` or `Terminate`, optionally a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowResult {
    kind: Kind,
    reason: Option<Reason>,
    message: String,
    retryable: bool,
    warning: bool,
}

impl WorkflowResult {
    pub fn ok() -> Self {
        Self {
            kind: Kind::Ok,
            reason: None,
            message: String::new(),
            retryable: false,
            warning: false,
        }
    }

    pub fn in_progress(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            kind: Kind::InProgress,
            reason: Some(reason),
            message: message.into(),
            retryable: true,
            warning: false,
        }
    }

    /// A terminal failure for this pass. Retryable unless `without_retry` is applied.
    pub fn terminate(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            kind: Kind::Terminate,
            reason: Some(reason),
            message: message.into(),
            retryable: true,
            warning: false,
        }
    }

    pub fn without_retry(mut self) -> Self {
        self.retryable = false;
        self
    }

    pub fn with_warning(mut self) -> Self {
        self.warning = true;
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_ok(&self) -> bool {
        self.kind == Kind::Ok
    }

    pub fn is_in_progress(&self) -> bool {
        self.kind == Kind::InProgress
    }

    pub fn is_terminate(&self) -> bool {
        self.kind == Kind::Terminate
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn is_warning(&self) -> bool {
        self.warning
    }

    pub fn reason(&self) -> Option<Reason> {
        self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// How long the caller should wait before the next pass, if at all.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self.kind {
            Kind::Ok => None,
            Kind::InProgress => Some(DEFAULT_RETRY),
            Kind::Terminate if self.retryable => Some(DEFAULT_RETRY),
            Kind::Terminate => None,
        }
    }
}

impl fmt::Display for WorkflowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.reason) {
            (Kind::Ok, _) => write!(f, "ok"),
            (kind, Some(reason)) => write!(f, "{:?} ({}): {}", kind, reason, self.message),
            (kind, None) => write!(f, "{:?}: {}", kind, self.message),
        }
    }
}
