//! Dashboard client library for runscope.
//!
//! Provides the HTTP client for the Tekton dashboard API, the
//! [`ResourceSource`] seam the loader fetches through, and the [`RunLoader`]
//! that drives a [`runscope_core::RunSession`] through its two fetch phases.

pub mod config;
pub mod error;
pub mod http;
pub mod loader;
pub mod source;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::DashboardClient;
pub use loader::{load_session, RunLoader};
pub use source::ResourceSource;
