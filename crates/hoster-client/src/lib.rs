//! Git hosting API client with response caching
//!
//! This crate provides a common object model over GitHub, GitLab and
//! Bitbucket, a trait-based client and a caching decorator that routes reads
//! through a pluggable [`ResponseCache`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              HosterClient trait                  │
//! │  - fetch_repository() / fetch_issues()           │
//! │  - fetch_merge_requests() / fetch_comments()     │
//! │  - create_comment()                              │
//! └─────────────────────────────────────────────────┘
//!                        │
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//! ┌─────────────────┐         ┌─────────────────────┐
//! │ GitHubAdapter   │         │ CachedHosterClient  │
//! │ (direct API)    │◄────────│ (decorator)         │
//! └─────────────────┘         └─────────────────────┘
//!                                        │
//!                                        ▼
//!                              ┌───────────────────┐
//!                              │   ResponseCache   │
//!                              └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use hoster_client::{CacheMode, CachedHosterClient, GitHubAdapter, HosterClient, IssueState};
//! use hoster_client::ResponseCache;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = Arc::new(ResponseCache::default());
//! let client = CachedHosterClient::new(
//!     GitHubAdapter::with_token("token")?,
//!     Arc::clone(&cache),
//!     CacheMode::ReadWrite,
//! );
//!
//! // Second call is served from the cache
//! let issues = client.fetch_issues("gitmate/IGitt", Some(IssueState::Open)).await?;
//! let again = client.fetch_issues("gitmate/IGitt", Some(IssueState::Open)).await?;
//! assert_eq!(issues, again);
//! # Ok(())
//! # }
//! ```

pub mod cache_key;
pub mod cached_client;
pub mod client;
pub mod client_manager;
pub mod error;
pub mod github;
pub mod hoster;
pub mod types;

pub use cache_key::{CredentialScope, RequestKey};
pub use cached_client::CachedHosterClient;
pub use client::{CacheMode, HosterClient};
pub use client_manager::{build_cache, ClientManager, TokenResolver};
pub use error::HosterError;
pub use github::GitHubAdapter;
pub use hoster::{Hoster, RepositoryUrl};
pub use types::{
    combined_status, AccessLevel, Comment, Commit, CommitStatus, Issue, IssueState, MergeRequest,
    MergeRequestState, Organization, Repository, StatusState, User,
};

// Re-export cache types for convenience
pub use hoster_cache::{CacheBackend, CacheError, CacheItem, CacheStats, ResponseCache};

// Re-export octocrab so consumers don't need to depend on it directly
pub use octocrab;
