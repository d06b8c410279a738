//! Test utilities for driving reconciliation passes without a network.
//!
//! [`FakeCloud`] is an in-memory, deterministic implementation of
//! [`crate::client::CloudClient`] used by unit and integration tests.

pub mod fake;

pub use fake::{FakeCloud, Operation};
