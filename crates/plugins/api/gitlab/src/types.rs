//! GitLab API response and request types.
//!
//! These types represent the raw JSON responses from GitLab REST API v4.
//! They are deserialized and then mapped to unified types.

use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// GitLab user representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabUser {
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Answer of the `version` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabVersion {
    #[serde(default)]
    pub version: String,
}

// =============================================================================
// Merge Request
// =============================================================================

/// GitLab merge request representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabMergeRequest {
    pub id: u64,
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub web_url: String,
    pub source_branch: String,
    pub target_branch: String,
    pub source_project_id: u64,
    pub target_project_id: u64,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub diff_refs: Option<GitLabDiffRefs>,
}

/// GitLab diff refs (SHA references for code positions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabDiffRefs {
    pub base_sha: String,
    pub head_sha: String,
    pub start_sha: String,
}

/// Answer of the merge request `changes` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabChanges {
    #[serde(default)]
    pub changes: Vec<GitLabDiff>,
}

/// GitLab file diff in a merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabDiff {
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
}

// =============================================================================
// Notes and Discussions
// =============================================================================

/// GitLab discussion (thread of notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabDiscussion {
    pub id: String,
    #[serde(default)]
    pub notes: Vec<GitLabNote>,
}

/// GitLab note (comment) representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabNote {
    pub id: u64,
    pub body: String,
    pub author: GitLabUser,
    pub updated_at: String,
    /// `DiffNote` for notes attached to a diff line
    #[serde(default, rename = "type")]
    pub note_type: Option<String>,
    #[serde(default)]
    pub position: Option<GitLabNotePosition>,
}

impl GitLabNote {
    pub fn is_diff_note(&self) -> bool {
        self.note_type.as_deref() == Some("DiffNote")
    }
}

/// Position of a diff note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabNotePosition {
    #[serde(default)]
    pub new_path: Option<String>,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub new_line: Option<u32>,
    #[serde(default)]
    pub old_line: Option<u32>,
}

// =============================================================================
// Create types
// =============================================================================

/// Request body for adding a note to a discussion.
#[derive(Debug, Clone, Serialize)]
pub struct CreateNoteRequest {
    pub body: String,
}

/// Request body for opening a discussion.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDiscussionRequest {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<DiscussionPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
}

/// Diff position of a new discussion.
///
/// The outer `Option` of each coordinate controls presence, the inner one
/// an explicit `null`.
#[derive(Debug, Clone, Serialize)]
pub struct DiscussionPosition {
    pub position_type: String,
    #[serde(flatten)]
    pub diff_refs: GitLabDiffRefs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line: Option<Option<u32>>,
}

impl DiscussionPosition {
    /// Text position on one side of the diff.
    pub fn text(diff_refs: GitLabDiffRefs) -> Self {
        Self {
            position_type: "text".to_string(),
            diff_refs,
            new_path: None,
            new_line: None,
            old_path: None,
            old_line: None,
        }
    }
}
