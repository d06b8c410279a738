//! Convergence engine: keeps declared integrations in line with the cloud
//! management API.

pub mod aggregate;
pub mod client;
pub mod condition;
pub mod endpoint;
pub mod federation;
pub mod identity;
pub mod integration;
pub mod ownership;
pub mod resource;
pub mod status;
pub mod test_util;
pub mod workflow;

pub use client::{ClientError, CloudClient, HttpClient};
pub use condition::{Condition, ConditionPublisher, ConditionType, Conditions};
pub use endpoint::ensure_private_endpoints;
pub use federation::ensure_federated_auth;
pub use identity::{Diff, Identifiable};
pub use integration::{ensure_cloud_provider_integrations, Ensured};
pub use ownership::OwnershipError;
pub use resource::{DataFederation, FederatedAuth, Project, Resource};
pub use status::{IntegrationStatus, Phase};
pub use workflow::{Reason, WorkflowResult};
