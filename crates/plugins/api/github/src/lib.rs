//! GitHub pull requests manager for prlab.
//!
//! Implements [`prlab_core::PullRequestsManager`] on top of the GitHub REST
//! API v3, including an anonymous variant listing the pull requests of a
//! single repository.

mod client;
mod threads;
mod types;

pub use client::GitHubManager;
pub use types::*;

/// Default GitHub API URL.
pub use prlab_core::config::DEFAULT_GITHUB_API_URL as DEFAULT_GITHUB_URL;
