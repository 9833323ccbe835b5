//! Common types used across providers.
//!
//! These are the normalized shapes handed to the request-handling layer.
//! They serialize in camelCase because that is what the browser client reads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// Users and listing
// =============================================================================

/// The user owning the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// Which pull requests of a user to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrFilter {
    /// Pull requests authored by the user
    Created,
    /// Pull requests assigned to the user
    Assigned,
}

impl FromStr for PrFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PrFilter::Created),
            "assigned" => Ok(PrFilter::Assigned),
            other => Err(Error::InvalidInput(format!(
                "Invalid parameter 'filter'. Expected value 'created' or 'assigned', received '{}'.",
                other
            ))),
        }
    }
}

impl fmt::Display for PrFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrFilter::Created => f.write_str("created"),
            PrFilter::Assigned => f.write_str("assigned"),
        }
    }
}

/// A pull request (GitHub) or merge request (GitLab).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// API URL of the request; every other operation is addressed by it
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    /// Provider-native numeric id
    pub internal_id: u64,
    /// Web page of the request
    pub link: String,
}

// =============================================================================
// Files
// =============================================================================

/// Status of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl FileStatus {
    /// Derive the status from native flags.
    ///
    /// Renamed wins over added, added over removed; no flag means modified.
    pub fn from_flags(new_file: bool, renamed_file: bool, deleted_file: bool) -> Self {
        if renamed_file {
            FileStatus::Renamed
        } else if new_file {
            FileStatus::Added
        } else if deleted_file {
            FileStatus::Removed
        } else {
            FileStatus::Modified
        }
    }
}

/// A file touched by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub name: String,
    pub status: FileStatus,
}

/// One side of a file diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRevision {
    /// Branch label
    pub label: String,
    pub sha: String,
    /// Raw file text; empty when the file does not exist at this revision
    pub content: String,
}

/// Base and head content of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub base: FileRevision,
    pub head: FileRevision,
}

// =============================================================================
// Comments
// =============================================================================

/// A single comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub text: String,
    pub updated_at: String,
    pub user_name: String,
    pub user_picture: Option<String>,
    /// Comment this one answers (GitHub review comments)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<u64>,
    /// Discussion opened by this comment (GitLab new discussions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

/// A root comment and its ordered replies.
///
/// `filename` is `None` for pull-request-level conversation. `line` is the
/// head-side line, `original_line` the base-side one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    /// Identifier to reply to
    pub id: String,
    pub comments: Vec<Comment>,
    pub filename: Option<String>,
    pub line: Option<u32>,
    pub original_line: Option<u32>,
    pub pull_request_id: String,
}

/// Start a new thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub text: String,
    /// `None` to comment on the pull request itself
    #[serde(default)]
    pub filename: Option<String>,
    /// Line in the head version
    #[serde(default)]
    pub line: Option<u32>,
    /// Line in the base version
    #[serde(default)]
    pub original_line: Option<u32>,
}

/// Answer an existing thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReply {
    pub text: String,
    #[serde(default)]
    pub filename: Option<String>,
    /// Thread (GitLab discussion) or comment (GitHub) id
    pub in_reply_to: String,
}

/// Body of a comment creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentRequest {
    New(NewComment),
    Reply(CommentReply),
}

impl CommentRequest {
    pub fn text(&self) -> &str {
        match self {
            CommentRequest::New(c) => &c.text,
            CommentRequest::Reply(r) => &r.text,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            CommentRequest::New(c) => c.filename.as_deref(),
            CommentRequest::Reply(r) => r.filename.as_deref(),
        }
    }
}

impl From<NewComment> for CommentRequest {
    fn from(comment: NewComment) -> Self {
        CommentRequest::New(comment)
    }
}

impl From<CommentReply> for CommentRequest {
    fn from(reply: CommentReply) -> Self {
        CommentRequest::Reply(reply)
    }
}
