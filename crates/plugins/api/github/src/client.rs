//! GitHub pull requests manager.

use async_trait::async_trait;
use prlab_core::{
    ApiRequest, AuthScheme, Cache, Comment, CommentRequest, CommentThread, Error, FileChange,
    FileDiff, FileRevision, FileStatus, PrFilter, ProviderClient, PullRequest,
    PullRequestsManager, Result, User,
};
use tracing::debug;

use crate::threads::rebuild_threads;
use crate::types::{
    CreateCommentRequest, CreateReviewCommentRequest, GitHubBranchRef, GitHubComment, GitHubFile,
    GitHubPullRequest, GitHubReviewComment, GitHubSearchPage, GitHubUser,
    ReplyReviewCommentRequest,
};
use crate::DEFAULT_GITHUB_URL;

/// JSON media type of the v3 API.
const MEDIA_TYPE_JSON: &str = "application/vnd.github.v3+json";

/// Raw file content media type.
const MEDIA_TYPE_RAW: &str = "application/vnd.github.v3.raw";

/// Repository listed by the anonymous manager.
#[derive(Debug, Clone)]
struct AnonymousRepo {
    owner: String,
    repo: String,
}

/// GitHub pull requests manager.
pub struct GitHubManager {
    client: ProviderClient,
    /// Pull request descriptions keyed by API URL
    pull_requests: Cache<String, GitHubPullRequest>,
    anonymous: Option<AnonymousRepo>,
}

impl GitHubManager {
    /// Create a manager for github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_GITHUB_URL, token)
    }

    /// Create a manager with a custom API URL (GitHub Enterprise).
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Self::build_client(base_url.into(), token.into(), AuthScheme::Token),
            pull_requests: Cache::new(),
            anonymous: None,
        }
    }

    /// Create a manager without credentials, listing the pull requests of
    /// `owner/repo`.
    pub fn anonymous(
        base_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: Self::build_client(base_url.into(), String::new(), AuthScheme::Anonymous),
            pull_requests: Cache::new(),
            anonymous: Some(AnonymousRepo {
                owner: owner.into(),
                repo: repo.into(),
            }),
        }
    }

    fn build_client(base_url: String, token: String, auth: AuthScheme) -> ProviderClient {
        ProviderClient::new(base_url, token, auth)
            .with_page_size("per_page", 100)
            .with_default_header("Accept", MEDIA_TYPE_JSON)
    }

    /// Pull request description, from the cache when available.
    async fn pull_request(&self, pr_id: &str) -> Result<GitHubPullRequest> {
        if let Some(pull_request) = self.pull_requests.get(&pr_id.to_string()).await {
            return Ok(pull_request);
        }

        let pull_request: GitHubPullRequest = self.client.get_json(pr_id).await?;
        self.pull_requests
            .insert(pr_id.to_string(), pull_request.clone())
            .await;
        Ok(pull_request)
    }

    /// Raw content of `filename` at the branch revision; empty if missing.
    async fn content(&self, branch: &GitHubBranchRef, filename: &str) -> Result<String> {
        let Some(repo) = &branch.repo else {
            debug!(label = branch.label, "Branch repository is gone, no content");
            return Ok(String::new());
        };

        let request = ApiRequest::get(contents_url(&repo.url, filename))
            .query("ref", &branch.sha)
            .header("Accept", MEDIA_TYPE_RAW)
            .raw();

        match self.client.call(request).await {
            Ok(payload) => Ok(payload.into_text()),
            Err(e) if e.is_status(404) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    async fn list_repository_pulls(&self, repo: &AnonymousRepo) -> Result<Vec<PullRequest>> {
        // Single page, the anonymous rate limit is too low to walk them all
        let url = format!(
            "repos/{}/{}/pulls?state=all&per_page=100",
            repo.owner, repo.repo
        );
        let gh_pulls: Vec<GitHubPullRequest> = self.client.get_json(&url).await?;

        let pulls = gh_pulls.iter().map(map_pull_request).collect();
        self.pull_requests
            .replace(gh_pulls.into_iter().map(|p| (p.url.clone(), p)))
            .await;
        Ok(pulls)
    }
}

// =============================================================================
// Mapping functions: GitHub types -> Unified types
// =============================================================================

/// Search qualifier selecting the user's pull requests.
fn search_query(username: &str, filter: PrFilter) -> String {
    let qualifier = match filter {
        PrFilter::Created => "author",
        PrFilter::Assigned => "assignee",
    };
    format!("state:open type:pr {}:{}", qualifier, username)
}

fn map_pull_request(gh_pull: &GitHubPullRequest) -> PullRequest {
    PullRequest {
        id: gh_pull.url.clone(),
        title: gh_pull.title.clone(),
        body: gh_pull.body.clone(),
        internal_id: gh_pull.id,
        link: gh_pull.html_url.clone(),
    }
}

fn map_file(gh_file: &GitHubFile) -> FileChange {
    let status = match gh_file.status.as_str() {
        "added" => FileStatus::Added,
        "removed" => FileStatus::Removed,
        "renamed" => FileStatus::Renamed,
        _ => FileStatus::Modified,
    };
    FileChange {
        name: gh_file.filename.clone(),
        status,
    }
}

fn map_comment(gh_comment: &GitHubComment) -> Comment {
    Comment {
        id: gh_comment.id,
        text: gh_comment.body.clone(),
        updated_at: gh_comment.updated_at.clone(),
        user_name: gh_comment
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_default(),
        user_picture: gh_comment.user.as_ref().and_then(|u| u.avatar_url.clone()),
        in_reply_to_id: gh_comment.in_reply_to_id,
        in_reply_to: None,
    }
}

/// Thread named after its last comment, anchored where its first one is.
fn map_thread(thread: &[GitHubReviewComment], filename: &str, pr_id: &str) -> Option<CommentThread> {
    let first = thread.first()?;
    let last = thread.last()?;
    Some(CommentThread {
        id: last.comment.id.to_string(),
        comments: thread.iter().map(|c| map_comment(&c.comment)).collect(),
        filename: Some(filename.to_string()),
        line: first.line,
        original_line: if first.line.is_none() {
            first.original_line
        } else {
            None
        },
        pull_request_id: pr_id.to_string(),
    })
}

/// Contents endpoint of a file, each path segment percent-encoded.
fn contents_url(repo_url: &str, filename: &str) -> String {
    let path: Vec<_> = filename
        .split('/')
        .map(urlencoding::encode)
        .collect();
    format!("{}/contents/{}", repo_url, path.join("/"))
}

/// Pull-request-level conversation lives on the issue side.
fn issue_url(pr_id: &str) -> String {
    match pr_id.rsplit_once("/pulls/") {
        Some((repo, number)) => format!("{}/issues/{}", repo, number),
        None => pr_id.to_string(),
    }
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl PullRequestsManager for GitHubManager {
    fn provider_name(&self) -> &'static str {
        if self.anonymous.is_some() {
            "github-anonymous"
        } else {
            "github"
        }
    }

    async fn get_current_user(&self) -> Result<User> {
        if self.anonymous.is_some() {
            return Ok(User {
                username: "anonymous".to_string(),
            });
        }

        let gh_user: GitHubUser = self.client.get_json("user").await?;
        Ok(User {
            username: gh_user.login,
        })
    }

    async fn list_pull_requests(&self, username: &str, filter: PrFilter) -> Result<Vec<PullRequest>> {
        if let Some(repo) = &self.anonymous {
            return self.list_repository_pulls(repo).await;
        }

        let request = ApiRequest::get("search/issues").query("q", search_query(username, filter));
        let pages: Vec<GitHubSearchPage> = self.client.get_all(request).await?;

        let pulls = pages
            .iter()
            .flat_map(|page| page.items.iter())
            .filter_map(|item| {
                item.pull_request.as_ref().map(|link| PullRequest {
                    id: link.url.clone(),
                    title: item.title.clone(),
                    body: item.body.clone(),
                    internal_id: item.id,
                    link: item.html_url.clone(),
                })
            })
            .collect();

        self.pull_requests.clear().await;
        Ok(pulls)
    }

    async fn list_files(&self, pr_id: &str) -> Result<Vec<FileChange>> {
        let gh_files: Vec<GitHubFile> = self
            .client
            .get_all(ApiRequest::get(format!("{}/files", pr_id)))
            .await?;
        Ok(gh_files.iter().map(map_file).collect())
    }

    async fn get_file_diff(&self, pr_id: &str, filename: &str) -> Result<FileDiff> {
        let pull_request = self.pull_request(pr_id).await?;

        let base_content = self.content(&pull_request.base, filename).await?;
        let head_content = self.content(&pull_request.head, filename).await?;

        Ok(FileDiff {
            base: FileRevision {
                label: pull_request.base.label,
                sha: pull_request.base.sha,
                content: base_content,
            },
            head: FileRevision {
                label: pull_request.head.label,
                sha: pull_request.head.sha,
                content: head_content,
            },
        })
    }

    async fn get_threads(&self, pr_id: &str, filename: Option<&str>) -> Result<Vec<CommentThread>> {
        let Some(filename) = filename else {
            let gh_comments: Vec<GitHubComment> = self
                .client
                .get_all(ApiRequest::get(format!("{}/comments", issue_url(pr_id))))
                .await?;
            return Ok(gh_comments
                .iter()
                .map(|c| CommentThread {
                    id: c.id.to_string(),
                    comments: vec![map_comment(c)],
                    filename: None,
                    line: None,
                    original_line: None,
                    pull_request_id: pr_id.to_string(),
                })
                .collect());
        };

        let gh_comments: Vec<GitHubReviewComment> = self
            .client
            .get_all(ApiRequest::get(format!("{}/comments", pr_id)))
            .await?;
        let file_comments: Vec<GitHubReviewComment> = gh_comments
            .into_iter()
            .filter(|c| c.path == filename)
            .collect();

        Ok(rebuild_threads(file_comments)
            .iter()
            .filter_map(|thread| map_thread(thread, filename, pr_id))
            .collect())
    }

    async fn post_comment(&self, pr_id: &str, request: CommentRequest) -> Result<Comment> {
        let Some(filename) = request.filename().map(str::to_string) else {
            // No reply concept at pull request level
            let url = format!("{}/comments", issue_url(pr_id));
            let body = CreateCommentRequest {
                body: request.text().to_string(),
            };
            let gh_comment: GitHubComment = self.client.post_json(&url, &body).await?;
            return Ok(map_comment(&gh_comment));
        };

        let url = format!("{}/comments", pr_id);
        let gh_comment: GitHubComment = match request {
            CommentRequest::Reply(reply) => {
                let in_reply_to = reply.in_reply_to.parse::<u64>().map_err(|_| {
                    Error::InvalidInput(format!("Invalid comment id: {}", reply.in_reply_to))
                })?;
                let body = ReplyReviewCommentRequest {
                    body: reply.text,
                    in_reply_to,
                };
                self.client.post_json(&url, &body).await?
            }
            CommentRequest::New(comment) => {
                let (line, side) = match (comment.line, comment.original_line) {
                    (Some(line), _) => (line, "RIGHT"),
                    (None, Some(original_line)) => (original_line, "LEFT"),
                    (None, None) => {
                        return Err(Error::InvalidInput(
                            "A file comment needs a line or an original line".to_string(),
                        ))
                    }
                };
                let pull_request = self.pull_request(pr_id).await?;
                let body = CreateReviewCommentRequest {
                    body: comment.text,
                    commit_id: pull_request.head.sha,
                    path: filename,
                    line,
                    side: side.to_string(),
                };
                self.client.post_json(&url, &body).await?
            }
        };

        Ok(map_comment(&gh_comment))
    }
}
