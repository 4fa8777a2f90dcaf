//! Retry logic for authenticated platform calls
//!
//! A call is repeated only when the platform rejects the access token that
//! was sent. The stale token is invalidated, a fresh one is fetched and the
//! call runs once more. Transport failures are never retried here, so a draft
//! submission that timed out is not resubmitted.

use crate::core::error::{ApiError, PublishError};
use crate::security::CredentialManager;
use std::future::Future;
use tracing::warn;

/// Options for retry behavior
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// Retry manager for calls that carry an access token
///
/// # Examples
///
/// ```no_run
/// use wechat_draft_publisher::core::{PublishError, RetryManager, RetryOptions};
/// use wechat_draft_publisher::security::CredentialManager;
///
/// # async fn run(credentials: &CredentialManager) -> Result<(), PublishError> {
/// let manager = RetryManager::new(RetryOptions::default());
///
/// let draft_id = manager
///     .run_authenticated(
///         credentials,
///         |token| async move { Ok(format!("draft-for-{}", token.len())) },
///         |e| PublishError::DraftRejected { code: -1, message: e.to_string() },
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    options: RetryOptions,
}

impl RetryManager {
    /// Create a new RetryManager with the given options
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Execute `operation` with a valid access token
    ///
    /// Token acquisition failures are returned as-is. Operation failures are
    /// converted with `map_err` once no further attempt is allowed.
    pub async fn run_authenticated<F, Fut, T, M>(
        &self,
        credentials: &CredentialManager,
        mut operation: F,
        map_err: M,
    ) -> Result<T, PublishError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        M: Fn(ApiError) -> PublishError,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let token = credentials.get_token().await?;

            match operation(token.value().to_owned()).await {
                Ok(result) => return Ok(result),
                Err(error) if error.is_token_rejected() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        error = %error,
                        "Access token rejected, refreshing and retrying"
                    );
                    credentials.invalidate(&token).await;
                    attempt += 1;
                }
                Err(error) => return Err(map_err(error)),
            }
        }
    }
}
