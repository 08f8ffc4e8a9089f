//! Cache keys for API requests
//!
//! The response cache matches keys exactly, so everything that can change a
//! response has to end up in the key: hoster, credential scope, method, path
//! and query parameters. Parameters are sorted, so the order they were added
//! in does not matter, and form-encoded, so a value cannot pose as a second
//! parameter.

use crate::hoster::Hoster;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use url::form_urlencoded::byte_serialize;

/// Identity part of a cache key
///
/// Responses can differ per principal (private repositories, permissions),
/// so requests made with different tokens never share entries. The token
/// itself never appears in a key, only a fingerprint of it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialScope(String);

impl CredentialScope {
    /// Scope for unauthenticated requests
    pub fn anonymous() -> Self {
        Self("anonymous".to_string())
    }

    /// Scope derived from an access token
    pub fn from_token(token: &str) -> Self {
        let digest = format!("{:x}", Sha256::digest(token.as_bytes()));
        Self(digest[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CredentialScope").field(&self.0).finish()
    }
}

/// Key of one logical API request
///
/// Rendered as `{hoster}:{scope}:{METHOD} {path}?{k=v&...}`.
///
/// # Example
///
/// ```rust
/// use hoster_client::{CredentialScope, Hoster, RequestKey};
///
/// let key = RequestKey::get(Hoster::GitHub, CredentialScope::anonymous(), "/repos/a/b/issues")
///     .param("state", "open")
///     .param("labels", "bug");
/// assert_eq!(
///     key.to_string(),
///     "github:anonymous:GET /repos/a/b/issues?labels=bug&state=open"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    hoster: Hoster,
    scope: CredentialScope,
    method: &'static str,
    path: String,
    params: BTreeMap<String, String>,
}

impl RequestKey {
    pub fn new(
        hoster: Hoster,
        scope: CredentialScope,
        method: &'static str,
        path: impl Into<String>,
    ) -> Self {
        Self {
            hoster,
            scope,
            method,
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Key for a GET request
    pub fn get(hoster: Hoster, scope: CredentialScope, path: impl Into<String>) -> Self {
        Self::new(hoster, scope, "GET", path)
    }

    /// Add a query parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter if `value` is set
    pub fn opt_param(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hoster(&self) -> Hoster {
        self.hoster
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} {}",
            self.hoster.as_str(),
            self.scope.as_str(),
            self.method,
            self.path
        )?;

        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, encode(name), encode(value))?;
        }
        Ok(())
    }
}

fn encode(raw: &str) -> String {
    byte_serialize(raw.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(Hoster::GitHub, CredentialScope::anonymous(), path)
    }

    #[test]
    fn test_param_order_does_not_matter() {
        let a = key("/repos/a/b/pulls").param("state", "open").param("page", "2");
        let b = key("/repos/a/b/pulls").param("page", "2").param("state", "open");
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), "github:anonymous:GET /repos/a/b/pulls?page=2&state=open");
    }

    #[test]
    fn test_different_requests_differ() {
        let open = key("/repos/a/b/issues").param("state", "open");
        let closed = key("/repos/a/b/issues").param("state", "closed");
        let other_repo = key("/repos/a/c/issues").param("state", "open");
        let gitlab = RequestKey::get(
            Hoster::GitLab,
            CredentialScope::anonymous(),
            "/repos/a/b/issues",
        )
        .param("state", "open");

        let rendered = [
            open.to_string(),
            closed.to_string(),
            other_repo.to_string(),
            gitlab.to_string(),
        ];
        for (i, a) in rendered.iter().enumerate() {
            for b in rendered.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_credentials_separate_keys() {
        let alice = RequestKey::get(
            Hoster::GitHub,
            CredentialScope::from_token("alice-token"),
            "/user",
        );
        let bob = RequestKey::get(
            Hoster::GitHub,
            CredentialScope::from_token("bob-token"),
            "/user",
        );
        let alice_again = RequestKey::get(
            Hoster::GitHub,
            CredentialScope::from_token("alice-token"),
            "/user",
        );

        assert_ne!(alice.to_string(), bob.to_string());
        assert_eq!(alice.to_string(), alice_again.to_string());
        assert!(!alice.to_string().contains("alice-token"));
    }

    #[test]
    fn test_opt_param() {
        let with = key("/x").opt_param("state", Some("open"));
        let without = key("/x").opt_param("state", None::<&str>);
        assert_eq!(with.to_string(), "github:anonymous:GET /x?state=open");
        assert_eq!(without.to_string(), "github:anonymous:GET /x");
    }

    #[test]
    fn test_params_are_escaped() {
        let smuggled = key("/repos/a/b/issues").param("labels", "bug&state=open");
        let separate = key("/repos/a/b/issues")
            .param("labels", "bug")
            .param("state", "open");
        assert_ne!(smuggled.to_string(), separate.to_string());
        assert_eq!(
            smuggled.to_string(),
            "github:anonymous:GET /repos/a/b/issues?labels=bug%26state%3Dopen"
        );
    }
}
