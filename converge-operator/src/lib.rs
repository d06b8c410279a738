//! Converge operator: reads declared resources from a manifest directory and
//! keeps them converged with the cloud management API.

pub mod operator;
pub mod reconciler;
pub mod store;

pub use operator::{Operator, OperatorConfig};
pub use store::{FileStore, StoreError};
