//! Reconcilers for the different resource kinds.
//!
//! Each reconciler takes a declared resource, runs one pass of the engine
//! against the management API and hands back the resource with its status
//! and annotations updated. Persisting is left to the caller.

pub mod data_federation;
pub mod federated_auth;
pub mod project;

use anyhow::Result;
use async_trait::async_trait;
use converge_engine::workflow::WorkflowResult;

pub use data_federation::DataFederationReconciler;
pub use federated_auth::FederatedAuthReconciler;
pub use project::ProjectReconciler;

/// A resource after one pass, plus the pass result.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<R> {
    pub resource: R,
    pub result: WorkflowResult,
}

impl<R> Reconciled<R> {
    pub fn map<T>(self, f: impl FnOnce(R) -> T) -> Reconciled<T> {
        Reconciled {
            resource: f(self.resource),
            result: self.result,
        }
    }

    /// Pass that did nothing because the resource opted out.
    pub fn skipped(resource: R) -> Self {
        Self {
            resource,
            result: WorkflowResult::ok(),
        }
    }
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The declared resource type.
    type Resource: Send;

    /// Reconcile the resource - compare declared vs remote state and take action.
    async fn reconcile(&self, resource: Self::Resource) -> Result<Reconciled<Self::Resource>>;
}
