//! Repository-to-client factory
//!
//! Resolves repository URLs to the hoster serving them and hands out cached
//! API clients. Clients are lazily initialized and kept per host, all sharing
//! one response cache.

use crate::cache_key::CredentialScope;
use crate::error::HosterError;
use crate::hoster::{Hoster, RepositoryUrl};
use crate::{CacheMode, CachedHosterClient, GitHubAdapter};
use anyhow::{Context, Result};
use hoster_cache::{FileBackend, ResponseCache};
use hoster_config::{api_cache_path, AppConfig, BackendKind, CacheSettings};
use log::{debug, info};
use octocrab::Octocrab;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves access tokens for hosters
///
/// Tries, in order:
/// 1. Tokens registered with [`TokenResolver::with_token`]
/// 2. Host-specific env var (e.g. `GITHUB_TOKEN_GITHUB_COM`)
/// 3. Generic env var of the hoster (`GITHUB_TOKEN`/`GH_TOKEN`,
///    `GITLAB_TOKEN`, `BITBUCKET_TOKEN`)
#[derive(Debug, Clone)]
pub struct TokenResolver {
    tokens: HashMap<String, String>,
    use_env: bool,
}

impl Default for TokenResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenResolver {
    /// Create a resolver that reads the environment
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            use_env: true,
        }
    }

    /// Create a resolver that only knows explicitly registered tokens
    pub fn without_env() -> Self {
        Self {
            tokens: HashMap::new(),
            use_env: false,
        }
    }

    /// Register a token for `host`
    pub fn with_token(mut self, host: &str, token: impl Into<String>) -> Self {
        self.tokens.insert(host.to_ascii_lowercase(), token.into());
        self
    }

    /// Name of the host-specific env var, e.g. `GITLAB_TOKEN_GITLAB_COM`
    pub fn env_key(hoster: Hoster, host: &str) -> String {
        format!(
            "{}_TOKEN_{}",
            hoster.as_str().to_uppercase(),
            host.replace(['.', '-'], "_").to_uppercase()
        )
    }

    fn generic_env_keys(hoster: Hoster) -> &'static [&'static str] {
        match hoster {
            Hoster::GitHub => &["GITHUB_TOKEN", "GH_TOKEN"],
            Hoster::GitLab => &["GITLAB_TOKEN"],
            Hoster::Bitbucket => &["BITBUCKET_TOKEN"],
        }
    }

    /// Get a token for `host`
    pub fn resolve(&self, hoster: Hoster, host: &str) -> Result<String, HosterError> {
        let host = host.to_ascii_lowercase();
        if let Some(token) = self.tokens.get(&host) {
            debug!("Using registered token for host {}", host);
            return Ok(token.clone());
        }

        let env_key = Self::env_key(hoster, &host);
        if self.use_env {
            if let Ok(token) = std::env::var(&env_key) {
                debug!("Using token from env var {} for host {}", env_key, host);
                return Ok(token);
            }

            // Generic variables only apply to the public instance
            if host == hoster.default_host() {
                for key in Self::generic_env_keys(hoster) {
                    if let Ok(token) = std::env::var(key) {
                        debug!("Using token from {} for host {}", key, host);
                        return Ok(token);
                    }
                }
            }
        }

        Err(HosterError::MissingToken { host, env_key })
    }
}

/// Build the response cache described by `settings`
pub fn build_cache(settings: &CacheSettings) -> Result<ResponseCache> {
    let ttl = settings.ttl();
    let cache = match settings.backend {
        BackendKind::Memory => ResponseCache::with_size_limit(settings.size_limit, ttl),
        BackendKind::File => {
            let path = match &settings.file {
                Some(path) => path.clone(),
                None => api_cache_path()?,
            };
            let backend = FileBackend::open(&path)
                .with_context(|| format!("Failed to open cache file {}", path.display()))?
                .with_size_limit(settings.size_limit);
            ResponseCache::with_backend(Arc::new(backend), ttl)
        }
    };
    Ok(cache)
}

/// Hands out cached clients for repository URLs
///
/// # Example
///
/// ```rust,ignore
/// use hoster_client::{ClientManager, HosterClient};
///
/// let mut manager = ClientManager::from_config(&hoster_config::AppConfig::load())?;
/// let (repo, client) = manager.repository("https://github.com/gitmate/IGitt")?;
/// let issues = client.fetch_issues(&repo.full_name(), None).await?;
/// ```
pub struct ClientManager {
    /// Cached clients per host
    clients: HashMap<String, CachedHosterClient<GitHubAdapter>>,
    /// Shared response cache
    cache: Arc<ResponseCache>,
    tokens: TokenResolver,
    /// Cache mode for new clients
    cache_mode: CacheMode,
}

impl ClientManager {
    /// Create a new client manager on the given cache
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self::with_cache_mode(cache, CacheMode::ReadWrite)
    }

    /// Create a new client manager with a specific cache mode
    pub fn with_cache_mode(cache: Arc<ResponseCache>, cache_mode: CacheMode) -> Self {
        Self {
            clients: HashMap::new(),
            cache,
            tokens: TokenResolver::new(),
            cache_mode,
        }
    }

    /// Create a client manager from the loaded configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let cache = build_cache(&config.cache)?;
        info!(
            "Response cache ready ({:?} backend, mode {:?})",
            config.cache.backend, config.cache.mode
        );
        Ok(Self::with_cache_mode(
            Arc::new(cache),
            config.cache.mode.into(),
        ))
    }

    /// Replace the token resolver
    pub fn with_tokens(mut self, tokens: TokenResolver) -> Self {
        self.tokens = tokens;
        self
    }

    /// The shared response cache
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Check if a client exists for the given host (without creating one)
    pub fn has_client(&self, host: &str) -> bool {
        self.clients.contains_key(&host.to_ascii_lowercase())
    }

    /// Remove the client for `host`, e.g. to pick up a new token
    pub fn remove_client(&mut self, host: &str) {
        self.clients.remove(&host.to_ascii_lowercase());
    }

    /// Resolve `url` and return the repository with a client for its host
    ///
    /// The returned client is a cheap clone that can be moved into tasks.
    pub fn repository(
        &mut self,
        url: &str,
    ) -> Result<(RepositoryUrl, CachedHosterClient<GitHubAdapter>)> {
        let repo = RepositoryUrl::parse(url)?;
        let client = self.client_for(&repo)?;
        Ok((repo, client))
    }

    fn client_for(&mut self, repo: &RepositoryUrl) -> Result<CachedHosterClient<GitHubAdapter>> {
        if repo.hoster != Hoster::GitHub {
            return Err(HosterError::Unsupported(repo.hoster).into());
        }

        if let Some(client) = self.clients.get(&repo.host) {
            return Ok(client.clone());
        }

        let client = self.create_client(repo.hoster, &repo.host)?;
        self.clients.insert(repo.host.clone(), client.clone());
        Ok(client)
    }

    fn create_client(&self, hoster: Hoster, host: &str) -> Result<CachedHosterClient<GitHubAdapter>> {
        info!("Creating {} client for host: {}", hoster, host);

        let token = self.tokens.resolve(hoster, host)?;
        let octocrab = Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .context("Failed to build Octocrab client")?;
        let adapter = GitHubAdapter::new(Arc::new(octocrab), CredentialScope::from_token(&token));

        Ok(CachedHosterClient::new(
            adapter,
            Arc::clone(&self.cache),
            self.cache_mode,
        ))
    }
}
