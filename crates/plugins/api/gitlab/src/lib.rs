//! GitLab merge requests manager for prlab.
//!
//! Implements [`prlab_core::PullRequestsManager`] on top of the GitLab REST
//! API v4. Comments on unchanged lines are retried with both coordinates
//! recovered from a client-side line alignment.

mod client;
mod types;

pub use client::GitLabManager;
pub use types::*;

/// Default GitLab API URL.
pub use prlab_core::config::DEFAULT_GITLAB_API_URL as DEFAULT_GITLAB_URL;
