//! GitHub adapter
//!
//! Direct implementation of the `HosterClient` trait on top of octocrab's
//! raw routes. This client makes real API calls without any caching; wrap
//! it in `CachedHosterClient` for that.

use crate::cache_key::CredentialScope;
use crate::client::HosterClient;
use crate::hoster::Hoster;
use crate::types::{
    AccessLevel, Comment, Commit, CommitStatus, Issue, IssueState, MergeRequest,
    MergeRequestState, Organization, Repository, StatusState, User,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::form_urlencoded;
use std::collections::HashSet;
use std::sync::Arc;

const PER_PAGE: usize = 100;
const MAX_ITEMS: usize = 500;

/// GitHub API client using octocrab
#[derive(Debug, Clone)]
pub struct GitHubAdapter {
    octocrab: Arc<Octocrab>,
    scope: CredentialScope,
}

impl GitHubAdapter {
    /// Create an adapter on an existing octocrab instance
    ///
    /// `scope` must identify the credentials octocrab was built with.
    pub fn new(octocrab: Arc<Octocrab>, scope: CredentialScope) -> Self {
        Self { octocrab, scope }
    }

    /// Create an adapter authenticating with a personal access token
    pub fn with_token(token: &str) -> anyhow::Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .context("Failed to build Octocrab client")?;
        Ok(Self::new(
            Arc::new(octocrab),
            CredentialScope::from_token(token),
        ))
    }

    /// Get a reference to the underlying octocrab instance
    pub fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> anyhow::Result<T> {
        debug!("GET {}", route);
        let value = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .with_context(|| format!("GitHub request failed: GET {}", route))?;
        Ok(value)
    }

    /// Follow `page` parameters until a short page or `MAX_ITEMS`
    async fn get_paged<T: DeserializeOwned>(
        &self,
        route: &str,
        params: &[(&str, &str)],
    ) -> anyhow::Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string())
                .finish();
            let paged_route = format!("{}?{}", route, query);

            let batch: Vec<T> = self.get(&paged_route).await?;
            let last_page = batch.len() < PER_PAGE;
            items.extend(batch);

            if last_page || items.len() >= MAX_ITEMS {
                break;
            }
            page += 1;
        }

        items.truncate(MAX_ITEMS);
        Ok(items)
    }
}

#[async_trait]
impl HosterClient for GitHubAdapter {
    fn hoster(&self) -> Hoster {
        Hoster::GitHub
    }

    fn credential_scope(&self) -> CredentialScope {
        self.scope.clone()
    }

    async fn fetch_repository(&self, repo: &str) -> anyhow::Result<Repository> {
        let payload: GhRepository = self.get(&format!("/repos/{}", repo)).await?;
        Ok(payload.into())
    }

    async fn fetch_issue(&self, repo: &str, number: u64) -> anyhow::Result<Issue> {
        let payload: GhIssue = self
            .get(&format!("/repos/{}/issues/{}", repo, number))
            .await?;
        if payload.pull_request.is_some() {
            anyhow::bail!("#{} in {} is a pull request, not an issue", number, repo);
        }
        Ok(payload.into())
    }

    async fn fetch_issues(
        &self,
        repo: &str,
        state: Option<IssueState>,
    ) -> anyhow::Result<Vec<Issue>> {
        let state = state.map(|s| s.as_str()).unwrap_or("all");
        let payload: Vec<GhIssue> = self
            .get_paged(&format!("/repos/{}/issues", repo), &[("state", state)])
            .await?;

        let issues: Vec<Issue> = payload
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(Issue::from)
            .collect();
        debug!("Fetched {} issues for {}", issues.len(), repo);
        Ok(issues)
    }

    async fn fetch_merge_request(&self, repo: &str, number: u64) -> anyhow::Result<MergeRequest> {
        let payload: GhPullRequest = self
            .get(&format!("/repos/{}/pulls/{}", repo, number))
            .await?;
        Ok(payload.into())
    }

    async fn fetch_merge_requests(
        &self,
        repo: &str,
        state: Option<MergeRequestState>,
    ) -> anyhow::Result<Vec<MergeRequest>> {
        // GitHub only knows open/closed; merged is a closed PR with merged_at
        let api_state = match state {
            Some(MergeRequestState::Open) => "open",
            Some(MergeRequestState::Closed | MergeRequestState::Merged) => "closed",
            None => "all",
        };
        let payload: Vec<GhPullRequest> = self
            .get_paged(&format!("/repos/{}/pulls", repo), &[("state", api_state)])
            .await?;

        let mrs: Vec<MergeRequest> = payload
            .into_iter()
            .map(MergeRequest::from)
            .filter(|mr| state.map_or(true, |wanted| mr.state == wanted))
            .collect();
        debug!("Fetched {} merge requests for {}", mrs.len(), repo);
        Ok(mrs)
    }

    async fn fetch_comments(&self, repo: &str, number: u64) -> anyhow::Result<Vec<Comment>> {
        let payload: Vec<GhComment> = self
            .get_paged(&format!("/repos/{}/issues/{}/comments", repo, number), &[])
            .await?;
        Ok(payload.into_iter().map(Comment::from).collect())
    }

    async fn fetch_commit(&self, repo: &str, sha: &str) -> anyhow::Result<Commit> {
        let payload: GhCommit = self
            .get(&format!("/repos/{}/commits/{}", repo, sha))
            .await?;
        Ok(payload.into())
    }

    async fn fetch_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
    ) -> anyhow::Result<Vec<CommitStatus>> {
        let payload: Vec<GhStatus> = self
            .get_paged(&format!("/repos/{}/commits/{}/statuses", repo, sha), &[])
            .await?;
        Ok(latest_per_context(payload))
    }

    async fn fetch_user(&self, username: Option<&str>) -> anyhow::Result<User> {
        let route = match username {
            Some(name) => format!("/users/{}", name),
            None => "/user".to_string(),
        };
        let payload: GhUser = self.get(&route).await?;
        Ok(payload.into())
    }

    async fn fetch_organization(&self, name: &str) -> anyhow::Result<Organization> {
        let payload: GhOrganization = self.get(&format!("/orgs/{}", name)).await?;
        Ok(payload.into())
    }

    async fn create_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> anyhow::Result<Comment> {
        let route = format!("/repos/{}/issues/{}/comments", repo, number);
        debug!("POST {}", route);
        let payload: GhComment = self
            .octocrab
            .post(&route, Some(&serde_json::json!({ "body": body })))
            .await
            .with_context(|| format!("GitHub request failed: POST {}", route))?;
        Ok(payload.into())
    }
}

// === GitHub payloads ===

#[derive(Debug, Deserialize)]
struct GhUser {
    id: u64,
    login: String,
    html_url: Option<String>,
}

impl From<GhUser> for User {
    fn from(user: GhUser) -> Self {
        User {
            id: user.id,
            username: user.login,
            web_url: user.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhOrganization {
    id: u64,
    login: String,
    description: Option<String>,
    html_url: Option<String>,
}

impl From<GhOrganization> for Organization {
    fn from(org: GhOrganization) -> Self {
        Organization {
            id: org.id,
            name: org.login,
            description: org.description.filter(|d| !d.is_empty()),
            web_url: org.html_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GhPermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    pull: bool,
}

impl GhPermissions {
    fn access_level(&self) -> AccessLevel {
        if self.admin {
            AccessLevel::Admin
        } else if self.push {
            AccessLevel::CanWrite
        } else if self.pull {
            AccessLevel::CanView
        } else {
            AccessLevel::None
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhRepository {
    id: u64,
    full_name: String,
    description: Option<String>,
    default_branch: Option<String>,
    clone_url: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    permissions: Option<GhPermissions>,
}

impl From<GhRepository> for Repository {
    fn from(repo: GhRepository) -> Self {
        Repository {
            id: repo.id,
            full_name: repo.full_name,
            description: repo.description,
            default_branch: repo.default_branch,
            clone_url: repo.clone_url,
            web_url: repo.html_url,
            private: repo.private,
            fork: repo.fork,
            permission: repo.permissions.as_ref().map(GhPermissions::access_level),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    body: Option<String>,
    user: GhUser,
    #[serde(default)]
    assignees: Vec<GhUser>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: String,
    /// Present when the "issue" is really a pull request
    pull_request: Option<serde_json::Value>,
}

impl From<GhIssue> for Issue {
    fn from(issue: GhIssue) -> Self {
        Issue {
            number: issue.number,
            title: issue.title,
            description: issue.body,
            author: issue.user.into(),
            assignees: issue.assignees.into_iter().map(User::from).collect(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            state: convert_issue_state(&issue.state),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            web_url: issue.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhBranchRef {
    #[serde(rename = "ref")]
    ref_field: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhPullRequest {
    number: u64,
    title: String,
    body: Option<String>,
    user: GhUser,
    state: String,
    merged_at: Option<DateTime<Utc>>,
    base: GhBranchRef,
    head: GhBranchRef,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: String,
}

impl From<GhPullRequest> for MergeRequest {
    fn from(pr: GhPullRequest) -> Self {
        let state = if pr.merged_at.is_some() {
            MergeRequestState::Merged
        } else if convert_issue_state(&pr.state) == IssueState::Closed {
            MergeRequestState::Closed
        } else {
            MergeRequestState::Open
        };

        MergeRequest {
            number: pr.number,
            title: pr.title,
            description: pr.body,
            author: pr.user.into(),
            state,
            base_branch: pr.base.ref_field,
            head_branch: pr.head.ref_field,
            head_sha: pr.head.sha,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            web_url: pr.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhComment {
    id: u64,
    body: Option<String>,
    user: GhUser,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GhComment> for Comment {
    fn from(comment: GhComment) -> Self {
        Comment {
            id: comment.id,
            body: comment.body.unwrap_or_default(),
            author: comment.user.into(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhCommitAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhCommitDetail {
    message: String,
    author: Option<GhCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct GhParent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhCommit {
    sha: String,
    commit: GhCommitDetail,
    #[serde(default)]
    parents: Vec<GhParent>,
    html_url: Option<String>,
}

impl From<GhCommit> for Commit {
    fn from(commit: GhCommit) -> Self {
        Commit {
            sha: commit.sha,
            message: commit.commit.message,
            author_name: commit.commit.author.and_then(|a| a.name),
            parent_shas: commit.parents.into_iter().map(|p| p.sha).collect(),
            web_url: commit.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhStatus {
    context: Option<String>,
    state: String,
    description: Option<String>,
    target_url: Option<String>,
}

impl From<GhStatus> for CommitStatus {
    fn from(status: GhStatus) -> Self {
        CommitStatus {
            context: status.context.unwrap_or_else(|| "default".to_string()),
            state: convert_status_state(&status.state),
            description: status.description,
            target_url: status.target_url,
        }
    }
}

/// Convert issue/PR state string from GitHub API to our enum
fn convert_issue_state(state: &str) -> IssueState {
    match state.to_lowercase().as_str() {
        "closed" => IssueState::Closed,
        _ => IssueState::Open,
    }
}

/// Convert commit status state string from GitHub API to our enum
fn convert_status_state(state: &str) -> StatusState {
    match state.to_lowercase().as_str() {
        "success" => StatusState::Success,
        "failure" => StatusState::Failure,
        "error" => StatusState::Error,
        _ => StatusState::Pending,
    }
}

/// GitHub lists statuses newest first and keeps every update; keep the
/// newest one of each context.
fn latest_per_context(statuses: Vec<GhStatus>) -> Vec<CommitStatus> {
    let mut seen = HashSet::new();
    statuses
        .into_iter()
        .map(CommitStatus::from)
        .filter(|status| seen.insert(status.context.clone()))
        .collect()
}
