//! GitHub API response types.
//!
//! These types represent the raw JSON responses from GitHub API.
//! They are deserialized and then mapped to unified types.

use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// GitHub user representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// =============================================================================
// Search
// =============================================================================

/// One page of `search/issues` results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<GitHubSearchItem>,
}

/// Issue-shaped search hit; pull requests carry a `pull_request` link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSearchItem {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub pull_request: Option<GitHubPullRequestLink>,
}

/// API locations of the pull request behind an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequestLink {
    pub url: String,
}

// =============================================================================
// Pull Request
// =============================================================================

/// GitHub pull request representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequest {
    pub id: u64,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub head: GitHubBranchRef,
    pub base: GitHubBranchRef,
}

/// GitHub branch reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubBranchRef {
    pub label: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    /// `null` once a fork has been deleted
    #[serde(default)]
    pub repo: Option<GitHubRepo>,
}

/// Repository holding a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    /// API URL of the repository
    pub url: String,
}

// =============================================================================
// Files
// =============================================================================

/// GitHub pull request file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubFile {
    pub filename: String,
    /// added, removed, modified, renamed, copied, changed, unchanged
    pub status: String,
}

// =============================================================================
// Comments
// =============================================================================

/// GitHub issue/PR comment (general comments, not code review).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubComment {
    pub id: u64,
    pub body: String,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    pub updated_at: String,
    /// ID of comment this is replying to (review comments only)
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
}

/// GitHub review comment (code review comment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubReviewComment {
    #[serde(flatten)]
    pub comment: GitHubComment,
    /// File path
    pub path: String,
    /// Line number (can be null for outdated comments)
    #[serde(default)]
    pub line: Option<u32>,
    /// Line in the base version
    #[serde(default)]
    pub original_line: Option<u32>,
}

// =============================================================================
// Create types
// =============================================================================

/// Request body for creating a comment.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

/// Request body for creating a review comment.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReviewCommentRequest {
    pub body: String,
    pub commit_id: String,
    pub path: String,
    pub line: u32,
    /// LEFT (base) or RIGHT (head)
    pub side: String,
}

/// Request body for answering a review comment.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyReviewCommentRequest {
    pub body: String,
    pub in_reply_to: u64,
}
