//! Core traits, types, and error handling for prlab.
//!
//! This crate provides the provider-independent pieces used by the GitHub
//! and GitLab managers: the [`PullRequestsManager`] contract, the shared
//! REST client, the metadata cache and the line aligner.

pub mod align;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod notebook;
pub mod provider;
pub mod types;

pub use align::Alignment;
pub use cache::Cache;
pub use error::{Error, Result};
pub use http::{ApiRequest, AuthScheme, Payload, ProviderClient};
pub use notebook::{get_file_nbdiff, NotebookDiff, NotebookDiffer};
pub use provider::PullRequestsManager;
pub use types::*;
