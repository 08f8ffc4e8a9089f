//! Common object model
//!
//! These types are what every hoster adapter maps its payloads onto. They
//! carry no hoster-specific fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account on a hoster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Hoster-wide numeric id
    pub id: u64,

    /// Login name
    pub username: String,

    /// Profile URL
    pub web_url: Option<String>,
}

/// An organization (GitHub) or group (GitLab)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,

    /// Path-like name, e.g. `gitmate` or `gitmate/open-source`
    pub name: String,

    pub description: Option<String>,

    pub web_url: Option<String>,
}

/// Permission a user holds on a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    None,
    Guest,
    CanView,
    CanWrite,
    Admin,
    Owner,
}

/// A repository on a hoster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,

    /// Full name, e.g. `gitmate/open-source/IGitt`
    pub full_name: String,

    pub description: Option<String>,

    pub default_branch: Option<String>,

    /// HTTPS clone URL
    pub clone_url: Option<String>,

    pub web_url: Option<String>,

    pub private: bool,

    /// Whether this repository is a fork of another one
    pub fork: bool,

    /// What the authenticated user may do, when the hoster reports it
    pub permission: Option<AccessLevel>,
}

impl Repository {
    /// The topmost namespace, e.g. `gitmate` for `gitmate/open-source/IGitt`
    pub fn top_level_org(&self) -> &str {
        self.full_name
            .split_once('/')
            .map(|(org, _)| org)
            .unwrap_or(&self.full_name)
    }
}

/// State of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

/// An issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,

    pub title: String,

    /// Issue body, if any
    pub description: Option<String>,

    pub author: User,

    pub assignees: Vec<User>,

    /// Label captions
    pub labels: Vec<String>,

    pub state: IssueState,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub web_url: String,
}

/// State of a merge request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestState {
    Open,
    Closed,
    Merged,
}

impl MergeRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeRequestState::Open => "open",
            MergeRequestState::Closed => "closed",
            MergeRequestState::Merged => "merged",
        }
    }
}

/// A merge request (GitLab) or pull request (GitHub, Bitbucket)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub number: u64,

    pub title: String,

    pub description: Option<String>,

    pub author: User,

    pub state: MergeRequestState,

    /// Branch the changes go into (e.g., "main")
    pub base_branch: String,

    /// Branch the changes come from
    pub head_branch: String,

    /// HEAD commit SHA
    pub head_sha: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub web_url: String,
}

/// A comment on an issue or merge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,

    pub body: String,

    pub author: User,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,

    pub message: String,

    /// Name recorded in the commit, not necessarily a hoster account
    pub author_name: Option<String>,

    pub parent_shas: Vec<String>,

    pub web_url: Option<String>,
}

impl Commit {
    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// State of a single commit status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    #[default]
    Pending,
    Success,
    Failure,
    Error,
}

/// A status reported for a commit by some CI context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Name of the reporting context (e.g., "ci/build")
    pub context: String,

    pub state: StatusState,

    pub description: Option<String>,

    /// Link to the details of the run
    pub target_url: Option<String>,
}

/// Combine several statuses into one: any error or failure wins, then
/// pending, and success only when everything succeeded.
pub fn combined_status(statuses: &[CommitStatus]) -> StatusState {
    if statuses
        .iter()
        .any(|s| matches!(s.state, StatusState::Failure | StatusState::Error))
    {
        StatusState::Failure
    } else if statuses.is_empty() || statuses.iter().any(|s| s.state == StatusState::Pending) {
        StatusState::Pending
    } else {
        StatusState::Success
    }
}
