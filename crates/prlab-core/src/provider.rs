//! Manager trait for pull request hosting services.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Comment, CommentRequest, CommentThread, FileChange, FileDiff, PrFilter, PullRequest, User,
};

/// Contract implemented by every hosting provider (GitHub, GitLab...).
///
/// Pull requests are addressed by their API URL as returned in
/// [`PullRequest::id`].
#[async_trait]
pub trait PullRequestsManager: Send + Sync {
    /// Get the provider name (e.g., "gitlab", "github")
    fn provider_name(&self) -> &'static str;

    /// Get the user owning the access token
    async fn get_current_user(&self) -> Result<User>;

    /// List the open pull requests created by or assigned to `username`.
    ///
    /// Drops every cached pull request description.
    async fn list_pull_requests(&self, username: &str, filter: PrFilter)
        -> Result<Vec<PullRequest>>;

    /// List the files modified by a pull request
    async fn list_files(&self, pr_id: &str) -> Result<Vec<FileChange>>;

    /// Get base and head content of a file
    async fn get_file_diff(&self, pr_id: &str, filename: &str) -> Result<FileDiff>;

    /// Get the threads of a file, or of the pull request when `filename` is `None`
    async fn get_threads(&self, pr_id: &str, filename: Option<&str>)
        -> Result<Vec<CommentThread>>;

    /// Create a new thread or answer an existing one
    async fn post_comment(&self, pr_id: &str, request: CommentRequest) -> Result<Comment>;
}
