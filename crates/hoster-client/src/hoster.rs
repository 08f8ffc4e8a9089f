//! Hosters and repository URLs
//!
//! Turns the URLs people paste (HTTPS, SSH, scp-like) into the hoster, the
//! namespace and the repository name.

use crate::error::HosterError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A git hosting platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hoster {
    GitHub,
    GitLab,
    Bitbucket,
}

impl Hoster {
    /// Identify the hoster serving `host`
    pub fn from_host(host: &str) -> Option<Self> {
        match host.to_ascii_lowercase().as_str() {
            "github.com" | "www.github.com" => Some(Hoster::GitHub),
            "gitlab.com" | "www.gitlab.com" => Some(Hoster::GitLab),
            "bitbucket.org" | "www.bitbucket.org" => Some(Hoster::Bitbucket),
            _ => None,
        }
    }

    /// Short lowercase name used in cache keys and env vars
    pub fn as_str(&self) -> &'static str {
        match self {
            Hoster::GitHub => "github",
            Hoster::GitLab => "gitlab",
            Hoster::Bitbucket => "bitbucket",
        }
    }

    /// Public host of the hoster
    pub fn default_host(&self) -> &'static str {
        match self {
            Hoster::GitHub => "github.com",
            Hoster::GitLab => "gitlab.com",
            Hoster::Bitbucket => "bitbucket.org",
        }
    }
}

impl fmt::Display for Hoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hoster::GitHub => "GitHub",
            Hoster::GitLab => "GitLab",
            Hoster::Bitbucket => "Bitbucket",
        };
        f.write_str(name)
    }
}

/// A parsed repository URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryUrl {
    pub hoster: Hoster,

    /// Host as written in the URL, lowercased
    pub host: String,

    /// User, organization or (possibly nested) group
    pub owner: String,

    /// Repository name without `.git`
    pub name: String,
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?|ssh|git)://(?:[^@/]+@)?(?P<host>[^/:]+)(?::\d+)?/(?P<path>.+)$")
            .expect("repository URL regex is valid")
    })
}

fn scp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@/]+@(?P<host>[^:/]+):(?P<path>.+)$").expect("scp URL regex is valid")
    })
}

impl RepositoryUrl {
    /// Parse a repository URL
    ///
    /// Accepted forms:
    /// - `https://github.com/owner/name` (optionally with `.git` or a trailing slash)
    /// - `git@github.com:owner/name.git`
    /// - `ssh://git@gitlab.com/group/subgroup/name.git`
    pub fn parse(url: &str) -> Result<Self, HosterError> {
        let url = url.trim();
        let captures = url_regex()
            .captures(url)
            .or_else(|| scp_regex().captures(url))
            .ok_or_else(|| HosterError::InvalidUrl(url.to_string()))?;

        let host = captures["host"].to_ascii_lowercase();
        let path = captures["path"].trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let (owner, name) = path
            .rsplit_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| HosterError::InvalidUrl(url.to_string()))?;

        let hoster =
            Hoster::from_host(&host).ok_or_else(|| HosterError::UnsupportedHost(host.clone()))?;

        Ok(Self {
            hoster,
            host,
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::str::FromStr for RepositoryUrl {
    type Err = HosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
