//! Cached hoster client (decorator pattern)
//!
//! Wraps any `HosterClient` implementation and routes its read calls through
//! a shared `ResponseCache`. The cache mode determines whether to read from
//! cache, write to cache, or both.

use crate::cache_key::{CredentialScope, RequestKey};
use crate::client::{CacheMode, HosterClient};
use crate::hoster::Hoster;
use crate::types::{
    Comment, Commit, CommitStatus, Issue, IssueState, MergeRequest, MergeRequestState,
    Organization, Repository, User,
};
use async_trait::async_trait;
use chrono::Utc;
use hoster_cache::{CacheItem, CacheItemPatch, ResponseCache};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Cached hoster client using the decorator pattern
///
/// Every read call computes a `RequestKey` and consults the cache before
/// delegating to the inner client. Mutations always go to the inner client.
///
/// # Cache Modes
///
/// - `CacheMode::None` - Pass through to inner client (no caching)
/// - `CacheMode::WriteOnly` - Skip cache reads, but write responses (force refresh)
/// - `CacheMode::ReadOnly` - Read from cache only, don't update cache
/// - `CacheMode::ReadWrite` - Full caching (default)
///
/// # Example
///
/// ```rust,ignore
/// use hoster_client::{CacheMode, CachedHosterClient, GitHubAdapter, ResponseCache};
/// use std::sync::Arc;
///
/// let inner = GitHubAdapter::with_token(&token)?;
/// let cache = Arc::new(ResponseCache::default());
///
/// let client = CachedHosterClient::new(inner, cache, CacheMode::ReadWrite);
/// ```
#[derive(Debug, Clone)]
pub struct CachedHosterClient<C: HosterClient + Clone> {
    inner: C,
    cache: Arc<ResponseCache>,
    mode: CacheMode,
}

impl<C: HosterClient + Clone> CachedHosterClient<C> {
    /// Create a new cached client
    ///
    /// # Arguments
    ///
    /// * `inner` - The inner client to delegate API calls to
    /// * `cache` - Shared cache instance
    /// * `mode` - Cache behavior mode
    pub fn new(inner: C, cache: Arc<ResponseCache>, mode: CacheMode) -> Self {
        Self { inner, cache, mode }
    }

    /// Get the current cache mode
    pub fn cache_mode(&self) -> CacheMode {
        self.mode
    }

    /// Create a new client with a different cache mode, sharing the cache
    pub fn with_mode(&self, mode: CacheMode) -> CachedHosterClient<C> {
        CachedHosterClient {
            inner: self.inner.clone(),
            cache: Arc::clone(&self.cache),
            mode,
        }
    }

    /// Get a reference to the inner client
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Get the shared cache
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    fn key(&self, path: String) -> RequestKey {
        RequestKey::get(self.inner.hoster(), self.inner.credential_scope(), path)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let item = CacheItem::new(serde_json::to_value(value)?);
        self.cache.set(key, &item).await?;
        Ok(())
    }

    /// Serve `key` from the cache or from `fetch`, according to the mode
    async fn cached<T, F, Fut>(&self, key: RequestKey, fetch: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let key = key.to_string();

        match (self.mode.should_read(), self.mode.should_write()) {
            (true, true) => {
                let mut fresh: Option<T> = None;
                let slot = &mut fresh;
                let fetch_ref = &fetch;
                let item = self
                    .cache
                    .fetch_or_compute(&key, move || async move {
                        let value = fetch_ref().await?;
                        let item = CacheItem::new(serde_json::to_value(&value)?);
                        *slot = Some(value);
                        Ok::<_, anyhow::Error>(item)
                    })
                    .await?;

                if let Some(value) = fresh {
                    return Ok(value);
                }
                if let Some(value) = decode(&key, item) {
                    return Ok(value);
                }
                let value = fetch().await?;
                self.store(&key, &value).await?;
                Ok(value)
            }
            (true, false) => {
                if let Some(item) = self.cache.get(&key).await? {
                    if let Some(value) = decode(&key, item) {
                        return Ok(value);
                    }
                }
                fetch().await
            }
            (false, true) => {
                let value = fetch().await?;
                self.store(&key, &value).await?;
                Ok(value)
            }
            (false, false) => fetch().await,
        }
    }

    async fn refresh_comments(&self, key: &str, repo: &str, number: u64) -> anyhow::Result<()> {
        let comments = self.inner.fetch_comments(repo, number).await?;
        debug!(
            "Refreshed {} cached comments for {}#{}",
            comments.len(),
            repo,
            number
        );
        self.store(key, &comments).await
    }
}

/// Payload of a cached item, unless it is stale or of the wrong shape
fn decode<T: DeserializeOwned>(key: &str, item: CacheItem) -> Option<T> {
    if item.from_webhook {
        debug!("Cache entry {} changed upstream, refetching", key);
        return None;
    }
    match serde_json::from_value(item.data) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Cache parse error for {}: {}", key, e);
            None
        }
    }
}

fn repo_path(repo: &str, rest: &str) -> String {
    format!("/repos/{}{}", repo, rest)
}

#[async_trait]
impl<C: HosterClient + Clone> HosterClient for CachedHosterClient<C> {
    fn hoster(&self) -> Hoster {
        self.inner.hoster()
    }

    fn credential_scope(&self) -> CredentialScope {
        self.inner.credential_scope()
    }

    async fn fetch_repository(&self, repo: &str) -> anyhow::Result<Repository> {
        let key = self.key(repo_path(repo, ""));
        self.cached(key, || self.inner.fetch_repository(repo)).await
    }

    async fn fetch_issue(&self, repo: &str, number: u64) -> anyhow::Result<Issue> {
        let key = self.key(repo_path(repo, &format!("/issues/{}", number)));
        self.cached(key, || self.inner.fetch_issue(repo, number))
            .await
    }

    async fn fetch_issues(
        &self,
        repo: &str,
        state: Option<IssueState>,
    ) -> anyhow::Result<Vec<Issue>> {
        let key = self
            .key(repo_path(repo, "/issues"))
            .param("state", state.map(|s| s.as_str()).unwrap_or("all"));
        let issues: Vec<Issue> = self
            .cached(key, || self.inner.fetch_issues(repo, state))
            .await?;
        debug!("{} issues for {}", issues.len(), repo);
        Ok(issues)
    }

    async fn fetch_merge_request(&self, repo: &str, number: u64) -> anyhow::Result<MergeRequest> {
        let key = self.key(repo_path(repo, &format!("/merge_requests/{}", number)));
        self.cached(key, || self.inner.fetch_merge_request(repo, number))
            .await
    }

    async fn fetch_merge_requests(
        &self,
        repo: &str,
        state: Option<MergeRequestState>,
    ) -> anyhow::Result<Vec<MergeRequest>> {
        let key = self
            .key(repo_path(repo, "/merge_requests"))
            .param("state", state.map(|s| s.as_str()).unwrap_or("all"));
        self.cached(key, || self.inner.fetch_merge_requests(repo, state))
            .await
    }

    async fn fetch_comments(&self, repo: &str, number: u64) -> anyhow::Result<Vec<Comment>> {
        let key = self.key(comments_path(repo, number));
        self.cached(key, || self.inner.fetch_comments(repo, number))
            .await
    }

    async fn fetch_commit(&self, repo: &str, sha: &str) -> anyhow::Result<Commit> {
        let key = self.key(repo_path(repo, &format!("/commits/{}", sha)));
        self.cached(key, || self.inner.fetch_commit(repo, sha)).await
    }

    async fn fetch_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
    ) -> anyhow::Result<Vec<CommitStatus>> {
        let key = self.key(repo_path(repo, &format!("/commits/{}/statuses", sha)));
        self.cached(key, || self.inner.fetch_commit_statuses(repo, sha))
            .await
    }

    async fn fetch_user(&self, username: Option<&str>) -> anyhow::Result<User> {
        let path = match username {
            Some(name) => format!("/users/{}", name),
            None => "/user".to_string(),
        };
        self.cached(self.key(path), || self.inner.fetch_user(username))
            .await
    }

    async fn fetch_organization(&self, name: &str) -> anyhow::Result<Organization> {
        let key = self.key(format!("/orgs/{}", name));
        self.cached(key, || self.inner.fetch_organization(name))
            .await
    }

    // === Mutations (no caching) ===

    async fn create_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> anyhow::Result<Comment> {
        let comment = self.inner.create_comment(repo, number, body).await?;

        // The comment is posted; from here on failures only concern the cache
        if self.mode.should_write() {
            let key = self.key(comments_path(repo, number)).to_string();
            if let Err(e) = self.refresh_comments(&key, repo, number).await {
                warn!(
                    "Failed to refresh cached comments for {}#{}: {}",
                    repo, number, e
                );
                let stale = CacheItemPatch::webhook_received(Utc::now());
                if let Err(e) = self.cache.update(&key, stale).await {
                    warn!("Failed to mark cached comments stale for {}: {}", key, e);
                }
            }
        }

        Ok(comment)
    }
}

fn comments_path(repo: &str, number: u64) -> String {
    repo_path(repo, &format!("/issues/{}/comments", number))
}
