//! HTTP client for the clinic backend.
//!
//! `gateway` owns transport, auth headers and the refresh-and-retry
//! step; the other modules add typed endpoints on `ApiClient`.

pub mod appointments;
pub mod auth;
pub mod billing;
pub mod gateway;
pub mod prescriptions;
pub mod resources;

#[cfg(test)]
pub(crate) mod test_support;

pub use gateway::{normalize_body, ApiClient, ApiRequest};
pub use resources::{ResourceFeed, ResourceKind};
