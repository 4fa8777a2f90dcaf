//! Access token lifecycle with single-flight refresh and masking
//!
//! The platform hands out short-lived access tokens in exchange for the
//! application identity and secret. `CredentialManager` caches one token,
//! refreshes it only when absent or expired, and never lets two callers
//! fetch at the same time.

use crate::core::config::PublisherConfig;
use crate::core::error::PublishError;
use crate::core::model::AccessToken;
use crate::core::traits::PlatformApi;
use regex::Regex;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Diagnostics snapshot of the cached token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Masked token value
    pub masked: String,
    /// Time left before the token is considered expired
    pub remaining: Duration,
}

/// Owner of the cached platform access token
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use wechat_draft_publisher::core::PublisherConfig;
/// use wechat_draft_publisher::platform::WeChatApi;
/// use wechat_draft_publisher::security::CredentialManager;
///
/// # async fn run() -> Result<(), wechat_draft_publisher::core::PublishError> {
/// let config = PublisherConfig::new("wx1234567890abcdef", "app-secret");
/// let api = Arc::new(WeChatApi::new(&config)?);
/// let credentials = CredentialManager::from_config(api, &config);
///
/// let token = credentials.get_token().await?;
/// println!("token expires at {:?}", token.expires_at());
/// # Ok(())
/// # }
/// ```
pub struct CredentialManager {
    api: Arc<dyn PlatformApi>,
    app_id: String,
    app_secret: SecretString,
    expiry_margin: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl CredentialManager {
    /// Creates a manager with an empty cache
    pub fn new(
        api: Arc<dyn PlatformApi>,
        app_id: impl Into<String>,
        app_secret: SecretString,
        expiry_margin: Duration,
    ) -> Self {
        Self {
            api,
            app_id: app_id.into(),
            app_secret,
            expiry_margin,
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(api: Arc<dyn PlatformApi>, config: &PublisherConfig) -> Self {
        Self::new(
            api,
            config.app_id.clone(),
            config.app_secret.clone(),
            config.token_expiry_margin,
        )
    }

    /// Returns a valid access token, fetching one if none is cached
    ///
    /// The cache lock is held across the fetch, so concurrent callers that
    /// find the cache empty wait for the one in-flight fetch and reuse it.
    pub async fn get_token(&self) -> Result<AccessToken, PublishError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                debug!("Reusing cached access token {}", mask_token(token.value()));
                return Ok(token.clone());
            }
            debug!("Cached access token expired");
        }

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Fetches a new token regardless of the cached one
    pub async fn force_refresh(&self) -> Result<AccessToken, PublishError> {
        let mut cached = self.cached.lock().await;
        *cached = None;

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still `stale`
    ///
    /// A token already replaced by another caller is left alone.
    pub async fn invalidate(&self, stale: &AccessToken) {
        let mut cached = self.cached.lock().await;

        if cached.as_ref().is_some_and(|token| token.same_value(stale)) {
            info!("Invalidating rejected access token {}", mask_token(stale.value()));
            *cached = None;
        }
    }

    /// Masked value and remaining lifetime of the cached token
    pub async fn token_info(&self) -> Option<TokenInfo> {
        let cached = self.cached.lock().await;

        cached.as_ref().filter(|t| t.is_valid()).map(|token| TokenInfo {
            masked: mask_token(token.value()),
            remaining: token.expires_at().saturating_duration_since(Instant::now()),
        })
    }

    async fn fetch(&self) -> Result<AccessToken, PublishError> {
        debug!(app_id = %self.app_id, "Requesting access token");

        let grant = self
            .api
            .fetch_token(&self.app_id, &self.app_secret)
            .await
            .map_err(|e| {
                let (code, message) = e.into_parts();
                PublishError::Auth { code, message }
            })?;

        if grant.access_token.is_empty() {
            return Err(PublishError::Auth {
                code: None,
                message: "platform returned an empty access token".to_string(),
            });
        }

        let lifetime = self.effective_lifetime(Duration::from_secs(grant.expires_in));
        info!(
            expires_in = grant.expires_in,
            "Fetched access token {}",
            mask_token(&grant.access_token)
        );

        Ok(AccessToken::new(grant.access_token, Instant::now() + lifetime))
    }

    /// Platform lifetime minus the safety margin, or half the lifetime when
    /// the margin would consume all of it
    fn effective_lifetime(&self, ttl: Duration) -> Duration {
        if ttl > self.expiry_margin {
            ttl - self.expiry_margin
        } else {
            ttl / 2
        }
    }
}

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use wechat_draft_publisher::security::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Replaces every occurrence of `secret` in `text` with its masked form
///
/// Request URLs carry the token and secret as query parameters, so transport
/// error messages pass through here before they are logged or returned.
pub fn mask_secret_in(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }

    match Regex::new(&regex::escape(secret)) {
        Ok(regex) => regex
            .replace_all(text, mask_token(secret).as_str())
            .to_string(),
        Err(_) => text.replace(secret, &mask_token(secret)),
    }
}
