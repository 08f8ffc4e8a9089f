//! Hoster client trait and cache mode definitions
//!
//! This module defines the core `HosterClient` trait that all client
//! implementations must satisfy, as well as the `CacheMode` enum for
//! controlling caching behavior.

use crate::cache_key::CredentialScope;
use crate::hoster::Hoster;
use crate::types::{
    Comment, Commit, CommitStatus, Issue, IssueState, MergeRequest, MergeRequestState,
    Organization, Repository, User,
};
use async_trait::async_trait;
use hoster_config::CacheModeSetting;

/// Cache behavior mode for hoster clients
///
/// Controls how the client interacts with the cache layer.
/// This is set at client construction time, not per-request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// No caching - neither read nor write
    None,

    /// Write-only - skip cache reads, but write responses to cache
    /// Use for "force refresh" to get fresh data while populating cache
    WriteOnly,

    /// Read-only - read from cache, but don't update it
    /// Use for offline mode or when preserving cache state
    ReadOnly,

    /// Full caching - read from cache, write to cache
    #[default]
    ReadWrite,
}

impl CacheMode {
    /// Should we attempt to read from cache before making API call?
    pub fn should_read(&self) -> bool {
        matches!(self, CacheMode::ReadOnly | CacheMode::ReadWrite)
    }

    /// Should we write API responses to cache?
    pub fn should_write(&self) -> bool {
        matches!(self, CacheMode::WriteOnly | CacheMode::ReadWrite)
    }
}

impl From<CacheModeSetting> for CacheMode {
    fn from(setting: CacheModeSetting) -> Self {
        match setting {
            CacheModeSetting::None => CacheMode::None,
            CacheModeSetting::WriteOnly => CacheMode::WriteOnly,
            CacheModeSetting::ReadOnly => CacheMode::ReadOnly,
            CacheModeSetting::ReadWrite => CacheMode::ReadWrite,
        }
    }
}

/// Hoster API client trait
///
/// Defines the common interface over every supported hosting platform.
/// Implementations can be direct (hitting the API) or decorated with
/// caching.
///
/// Repositories are addressed by their full name (`owner/name`, where owner
/// may be a nested group on GitLab).
///
/// # Example
///
/// ```rust,ignore
/// use hoster_client::{HosterClient, Issue, IssueState};
///
/// async fn open_issues(client: &dyn HosterClient) -> anyhow::Result<Vec<Issue>> {
///     client.fetch_issues("gitmate/IGitt", Some(IssueState::Open)).await
/// }
/// ```
#[async_trait]
pub trait HosterClient: Send + Sync {
    /// Platform this client talks to
    fn hoster(&self) -> Hoster;

    /// Identity the client authenticates as, used to scope cache keys
    fn credential_scope(&self) -> CredentialScope;

    /// Fetch repository metadata
    async fn fetch_repository(&self, repo: &str) -> anyhow::Result<Repository>;

    /// Fetch a single issue by number
    async fn fetch_issue(&self, repo: &str, number: u64) -> anyhow::Result<Issue>;

    /// Fetch the issues of a repository
    ///
    /// `state` of `None` returns open and closed issues. Merge requests are
    /// never included even where the hoster mixes them into issue lists.
    async fn fetch_issues(
        &self,
        repo: &str,
        state: Option<IssueState>,
    ) -> anyhow::Result<Vec<Issue>>;

    /// Fetch a single merge request by number
    async fn fetch_merge_request(&self, repo: &str, number: u64) -> anyhow::Result<MergeRequest>;

    /// Fetch the merge requests of a repository, optionally filtered by state
    async fn fetch_merge_requests(
        &self,
        repo: &str,
        state: Option<MergeRequestState>,
    ) -> anyhow::Result<Vec<MergeRequest>>;

    /// Fetch the comments of an issue or merge request, oldest first
    async fn fetch_comments(&self, repo: &str, number: u64) -> anyhow::Result<Vec<Comment>>;

    /// Fetch a commit by SHA
    async fn fetch_commit(&self, repo: &str, sha: &str) -> anyhow::Result<Commit>;

    /// Fetch the statuses reported for a commit
    async fn fetch_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
    ) -> anyhow::Result<Vec<CommitStatus>>;

    /// Fetch a user, or the authenticated user when `username` is `None`
    async fn fetch_user(&self, username: Option<&str>) -> anyhow::Result<User>;

    /// Fetch an organization or group by name
    async fn fetch_organization(&self, name: &str) -> anyhow::Result<Organization>;

    // === Mutations ===

    /// Add a comment to an issue or merge request
    async fn create_comment(&self, repo: &str, number: u64, body: &str)
        -> anyhow::Result<Comment>;
}
