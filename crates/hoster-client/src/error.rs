//! Client error types

use crate::hoster::Hoster;
use thiserror::Error;

/// Errors raised while resolving repositories and building clients
#[derive(Debug, Error)]
pub enum HosterError {
    /// The string is not a repository URL we understand.
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    /// The URL points to a host that is not a known hoster.
    #[error("Unsupported host '{0}'. Only github.com, gitlab.com and bitbucket.org are known")]
    UnsupportedHost(String),

    /// The hoster is recognised but has no API adapter.
    #[error("{0} is recognised but not supported by this client")]
    Unsupported(Hoster),

    /// No credentials were found for the hoster.
    #[error("No token found for host '{host}'. Set {env_key}")]
    MissingToken { host: String, env_key: String },
}
