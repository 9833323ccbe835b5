//! GitLab merge requests manager.

use async_trait::async_trait;
use prlab_core::{
    Alignment, ApiRequest, AuthScheme, Cache, Comment, CommentRequest, CommentThread, Error,
    FileChange, FileDiff, FileRevision, FileStatus, PrFilter, ProviderClient, PullRequest,
    PullRequestsManager, Result, User,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::types::{
    CreateDiscussionRequest, CreateNoteRequest, DiscussionPosition, GitLabChanges,
    GitLabDiffRefs, GitLabDiscussion, GitLabMergeRequest, GitLabNote, GitLabUser, GitLabVersion,
};
use crate::DEFAULT_GITLAB_URL;

/// Oldest server version with keyset pagination headers.
pub const MINIMAL_VERSION: &str = "13.1";

/// Rejection of a diff position GitLab cannot turn into a line code.
const INVALID_LINE_CODE: &str = "must be a valid line code";

/// Body of the notes GitLab adds when a merge request is pushed to.
const COMPARE_VERSIONS_NOTE: &str = "[Compare with previous version]";

/// GitLab merge requests manager.
pub struct GitLabManager {
    client: ProviderClient,
    /// Merge request descriptions keyed by API URL
    merge_requests: Cache<String, GitLabMergeRequest>,
    /// Line alignments keyed by (merge request, file)
    alignments: Cache<(String, String), Alignment>,
    version_checked: OnceCell<bool>,
}

impl GitLabManager {
    /// Create a manager for gitlab.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_GITLAB_URL, token)
    }

    /// Create a manager with a custom API URL (self-hosted instance).
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: ProviderClient::new(base_url, token, AuthScheme::Bearer)
                .with_page_size("per_page", 100)
                .with_default_header("Accept", "application/json"),
            merge_requests: Cache::new(),
            alignments: Cache::new(),
            version_checked: OnceCell::new(),
        }
    }

    /// Whether the server is at least [`MINIMAL_VERSION`].
    ///
    /// Asked once per manager; an older or unreachable server only logs.
    pub async fn check_server_version(&self) -> bool {
        *self
            .version_checked
            .get_or_init(|| async move {
                match self.client.get_json::<GitLabVersion>("version").await {
                    Ok(version) if is_supported(&version.version) => {
                        debug!(version = %version.version, "GitLab server version");
                        true
                    }
                    Ok(version) => {
                        warn!(
                            version = %version.version,
                            minimal = MINIMAL_VERSION,
                            "GitLab server is older than the minimal supported version. Some features may not work."
                        );
                        false
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read GitLab server version");
                        false
                    }
                }
            })
            .await
    }

    /// Merge request description, from the cache when available.
    async fn merge_request(&self, pr_id: &str) -> Result<GitLabMergeRequest> {
        if let Some(merge_request) = self.merge_requests.get(&pr_id.to_string()).await {
            return Ok(merge_request);
        }

        let merge_request: GitLabMergeRequest = self.client.get_json(pr_id).await?;
        self.merge_requests
            .insert(pr_id.to_string(), merge_request.clone())
            .await;
        Ok(merge_request)
    }

    /// Raw content of `filename` at `sha`; empty if missing.
    async fn content(&self, project_id: u64, filename: &str, sha: &str) -> Result<String> {
        let request = ApiRequest::get(content_url(project_id, filename))
            .query("ref", sha)
            .raw();

        match self.client.call(request).await {
            Ok(payload) => Ok(payload.into_text()),
            Err(e) if e.is_status(404) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Base/head line alignment of a file, computed on first use.
    async fn alignment(&self, pr_id: &str, filename: &str) -> Result<Alignment> {
        let key = (pr_id.to_string(), filename.to_string());
        if let Some(alignment) = self.alignments.get(&key).await {
            return Ok(alignment);
        }

        let diff = self.get_file_diff(pr_id, filename).await?;
        let alignment = Alignment::compute(&diff.base.content, &diff.head.content);
        debug!(
            pr_id = pr_id,
            filename = filename,
            matches = alignment.matches().len(),
            "Computed line alignment"
        );
        self.alignments.insert(key, alignment.clone()).await;
        Ok(alignment)
    }

    /// Fill both coordinates of a rejected position from the line alignment.
    async fn complete_position(
        &self,
        pr_id: &str,
        filename: &str,
        position: &mut DiscussionPosition,
        line: Option<u32>,
        original_line: Option<u32>,
    ) -> Result<()> {
        let alignment = self.alignment(pr_id, filename).await?;
        let new_line = line.or_else(|| original_line.and_then(|l| alignment.base_to_head(l)));
        let old_line = original_line.or_else(|| line.and_then(|l| alignment.head_to_base(l)));

        if new_line.is_none() || old_line.is_none() {
            warn!(
                filename = filename,
                line = ?line,
                original_line = ?original_line,
                "Line is not shared by both versions of the file"
            );
        }

        position.new_line = Some(new_line);
        position.new_path = Some(Some(filename.to_string()));
        position.old_line = Some(old_line);
        position.old_path = Some(None);
        Ok(())
    }
}

// =============================================================================
// Mapping functions: GitLab types -> Unified types
// =============================================================================

/// Numeric components of a version string, suffixes ignored.
fn version_parts(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map_while(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect()
}

fn is_supported(version: &str) -> bool {
    version_parts(version) >= version_parts(MINIMAL_VERSION)
}

fn content_url(project_id: u64, filename: &str) -> String {
    format!(
        "projects/{}/repository/files/{}/raw",
        project_id,
        urlencoding::encode(filename)
    )
}

fn search_filter(request: ApiRequest, username: &str, filter: PrFilter) -> ApiRequest {
    match filter {
        PrFilter::Created => request.query("author_username", username),
        PrFilter::Assigned => request.query("scope", "assigned_to_me"),
    }
}

fn map_comment(note: &GitLabNote) -> Comment {
    Comment {
        id: note.id,
        text: note.body.clone(),
        updated_at: note.updated_at.clone(),
        user_name: note.author.username.clone(),
        user_picture: note.author.avatar_url.clone(),
        in_reply_to_id: None,
        in_reply_to: None,
    }
}

/// Turn a discussion into a thread of the requested scope.
///
/// Any note outside the scope excludes the whole discussion.
fn map_discussion(
    discussion: &GitLabDiscussion,
    filename: Option<&str>,
    pr_id: &str,
) -> Option<CommentThread> {
    if discussion.notes.is_empty() {
        return None;
    }

    let mut thread = CommentThread {
        id: discussion.id.clone(),
        comments: Vec::with_capacity(discussion.notes.len()),
        filename: filename.map(str::to_string),
        line: None,
        original_line: None,
        pull_request_id: pr_id.to_string(),
    };

    for note in &discussion.notes {
        match (filename, &note.position) {
            (None, _) if !note.is_diff_note() && !note.body.contains(COMPARE_VERSIONS_NOTE) => {}
            (Some(filename), Some(position)) if note.is_diff_note() => {
                let path = position.new_path.as_deref().or(position.old_path.as_deref());
                if path != Some(filename) {
                    return None;
                }
                thread.line = thread.line.or(position.new_line);
                thread.original_line = thread.original_line.or(position.old_line);
            }
            _ => return None,
        }
        thread.comments.push(map_comment(note));
    }

    Some(thread)
}

fn is_invalid_line_code(error: &Error) -> bool {
    error.is_status(400)
        && error
            .remote_message()
            .is_some_and(|message| message.contains(INVALID_LINE_CODE))
}

fn missing_field(pr_id: &str, field: &str) -> Error {
    Error::MalformedResponse {
        url: pr_id.to_string(),
        message: format!("Merge request has no {}", field),
    }
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl PullRequestsManager for GitLabManager {
    fn provider_name(&self) -> &'static str {
        "gitlab"
    }

    async fn get_current_user(&self) -> Result<User> {
        self.check_server_version().await;

        let gl_user: GitLabUser = self.client.get_json("user").await?;
        Ok(User {
            username: gl_user.username,
        })
    }

    async fn list_pull_requests(&self, username: &str, filter: PrFilter) -> Result<Vec<PullRequest>> {
        self.check_server_version().await;

        let request = ApiRequest::get("merge_requests").query("state", "opened");
        let gl_merge_requests: Vec<GitLabMergeRequest> = self
            .client
            .get_all(search_filter(request, username, filter))
            .await?;

        let base_url = self.client.base_url();
        let pulls = gl_merge_requests
            .into_iter()
            .map(|mr| PullRequest {
                id: format!(
                    "{}/projects/{}/merge_requests/{}",
                    base_url, mr.project_id, mr.iid
                ),
                title: mr.title,
                body: mr.description,
                internal_id: mr.id,
                link: mr.web_url,
            })
            .collect();

        self.merge_requests.clear().await;
        Ok(pulls)
    }

    async fn list_files(&self, pr_id: &str) -> Result<Vec<FileChange>> {
        let pages: Vec<GitLabChanges> = self
            .client
            .get_all(ApiRequest::get(format!("{}/changes", pr_id)))
            .await?;

        Ok(pages
            .into_iter()
            .flat_map(|page| page.changes)
            .map(|diff| FileChange {
                status: FileStatus::from_flags(diff.new_file, diff.renamed_file, diff.deleted_file),
                name: diff.new_path,
            })
            .collect())
    }

    async fn get_file_diff(&self, pr_id: &str, filename: &str) -> Result<FileDiff> {
        let merge_request = self.merge_request(pr_id).await?;

        self.alignments
            .remove(&(pr_id.to_string(), filename.to_string()))
            .await;

        let diff_refs = merge_request
            .diff_refs
            .ok_or_else(|| missing_field(pr_id, "diff refs"))?;

        let base_content = self
            .content(merge_request.target_project_id, filename, &diff_refs.base_sha)
            .await?;
        let head_content = self
            .content(merge_request.source_project_id, filename, &diff_refs.head_sha)
            .await?;

        Ok(FileDiff {
            base: FileRevision {
                label: merge_request.target_branch,
                sha: diff_refs.base_sha,
                content: base_content,
            },
            head: FileRevision {
                label: merge_request.source_branch,
                sha: diff_refs.head_sha,
                content: head_content,
            },
        })
    }

    async fn get_threads(&self, pr_id: &str, filename: Option<&str>) -> Result<Vec<CommentThread>> {
        let discussions: Vec<GitLabDiscussion> = self
            .client
            .get_all(ApiRequest::get(format!("{}/discussions", pr_id)))
            .await?;

        Ok(discussions
            .iter()
            .filter_map(|d| map_discussion(d, filename, pr_id))
            .collect())
    }

    async fn post_comment(&self, pr_id: &str, request: CommentRequest) -> Result<Comment> {
        let comment = match request {
            CommentRequest::Reply(reply) => {
                let url = format!("{}/discussions/{}/notes", pr_id, reply.in_reply_to);
                let body = CreateNoteRequest { body: reply.text };
                let note: GitLabNote = self.client.post_json(&url, &body).await?;
                return Ok(map_comment(&note));
            }
            CommentRequest::New(comment) => comment,
        };

        let merge_request = self.merge_request(pr_id).await?;
        let mut body = CreateDiscussionRequest {
            body: comment.text,
            position: None,
            commit_id: None,
        };

        match (&comment.filename, comment.line, comment.original_line) {
            (Some(filename), Some(line), _) => {
                let mut position = DiscussionPosition::text(diff_refs(&merge_request, pr_id)?);
                position.new_line = Some(Some(line));
                position.new_path = Some(Some(filename.clone()));
                body.position = Some(position);
            }
            (Some(filename), None, Some(original_line)) => {
                let mut position = DiscussionPosition::text(diff_refs(&merge_request, pr_id)?);
                position.old_line = Some(Some(original_line));
                position.old_path = Some(Some(filename.clone()));
                body.position = Some(position);
            }
            _ => {
                let sha = merge_request
                    .sha
                    .clone()
                    .ok_or_else(|| missing_field(pr_id, "sha"))?;
                body.commit_id = Some(sha);
            }
        }

        let url = format!("{}/discussions", pr_id);
        let discussion: GitLabDiscussion = match self.client.post_json(&url, &body).await {
            Ok(discussion) => discussion,
            Err(e) if is_invalid_line_code(&e) => {
                let (Some(filename), Some(position)) = (&comment.filename, body.position.as_mut())
                else {
                    return Err(e);
                };
                info!(
                    filename = filename.as_str(),
                    "Position rejected, retrying with both line coordinates"
                );
                self.complete_position(
                    pr_id,
                    filename,
                    position,
                    comment.line,
                    comment.original_line,
                )
                .await?;
                self.client.post_json(&url, &body).await?
            }
            Err(e) => return Err(e),
        };

        let note = discussion.notes.first().ok_or_else(|| Error::MalformedResponse {
            url,
            message: "Discussion has no note".to_string(),
        })?;

        let mut created = map_comment(note);
        created.in_reply_to = Some(discussion.id.clone());
        Ok(created)
    }
}

fn diff_refs(merge_request: &GitLabMergeRequest, pr_id: &str) -> Result<GitLabDiffRefs> {
    merge_request
        .diff_refs
        .clone()
        .ok_or_else(|| missing_field(pr_id, "diff refs"))
}
