//! Error handling for draft publishing
//!
//! This module provides the pipeline's error taxonomy with recovery guidance
//! using the thiserror crate for ergonomic error handling.

use thiserror::Error;

/// Platform error codes that mean the access token itself was rejected
const TOKEN_REJECTED_CODES: &[i64] = &[40001, 40014, 42001];

/// Main error type for publishing operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    // Credential exchange
    #[error("[auth] access token request failed{}: {message}", code_suffix(.code))]
    Auth { code: Option<i64>, message: String },

    // Image hosting
    #[error("[upload] failed to upload image {path}: {message}")]
    AssetUpload { path: String, message: String },

    // Draft submission
    #[error("[draft] platform rejected the draft (code {code}): {message}")]
    DraftRejected { code: i64, message: String },

    // Configuration
    #[error("[config] {0}")]
    Config(String),

    // Working files
    #[error("[io] {path}: {message}")]
    Io { path: String, message: String },
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" (code {})", c)).unwrap_or_default()
}

impl PublishError {
    /// Get the pipeline stage this error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::AssetUpload { .. } => "upload",
            Self::DraftRejected { .. } => "draft",
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
        }
    }

    /// Get the remote platform code, if the platform produced one
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Auth { code, .. } => *code,
            Self::DraftRejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if retrying the whole publish later could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            // Bad identity or secret will not fix itself
            Self::Auth {
                code: Some(40001 | 40013 | 40125),
                ..
            } => false,
            Self::DraftRejected { code, .. } => matches!(*code, -1 | 45009 | 40001 | 42001),
            _ => true,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self.remote_code() {
            Some(40164) => {
                return vec![
                    "Log in to https://mp.weixin.qq.com",
                    "Open Settings & Development > Basic Configuration > IP whitelist",
                    "Add this machine's public IP address to the whitelist",
                ];
            }
            Some(40001 | 40013 | 40125) => {
                return vec![
                    "Check the configured appId and appSecret",
                    "The appId starts with 'wx' and is 18 characters long",
                ];
            }
            Some(45009) => {
                return vec![
                    "The daily API quota is exhausted, try again tomorrow",
                    "Request a higher quota on the platform console",
                ];
            }
            _ => {}
        }

        match self {
            Self::Auth { .. } => vec![
                "Check network connectivity to the platform",
                "Verify the appId/appSecret pair",
            ],
            Self::AssetUpload { .. } => vec![
                "Check that the image file exists and is not empty",
                "Check that the image path is relative to the article directory",
            ],
            Self::DraftRejected { .. } => vec![
                "Read the platform error message above",
                "Check the draft in the platform console before resubmitting",
            ],
            Self::Config(_) => vec![
                "Set WECHAT_APP_ID and WECHAT_APP_SECRET",
                "Or provide appId/appSecret in the config file",
            ],
            Self::Io { .. } => vec!["Check the file path and permissions"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "AUTH_FAILED",
            Self::AssetUpload { .. } => "ASSET_UPLOAD_FAILED",
            Self::DraftRejected { .. } => "DRAFT_REJECTED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io { .. } => "IO_ERROR",
        }
    }
}

/// Low-level failure returned by a [`crate::core::PlatformApi`] call
///
/// Components translate it into the matching [`PublishError`] variant for the
/// stage they run in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("platform error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("network error: {message}")]
    Transport { message: String },

    #[error("unexpected response: {message}")]
    InvalidResponse { message: String },
}

impl ApiError {
    /// Whether the platform rejected the access token that was sent
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, Self::Remote { code, .. } if TOKEN_REJECTED_CODES.contains(code))
    }

    /// Split into `(code, message)` for error variants that carry both
    pub fn into_parts(self) -> (Option<i64>, String) {
        match self {
            Self::Remote { code, message } => (Some(code), message),
            Self::Transport { message } => (None, format!("network error: {}", message)),
            Self::InvalidResponse { message } => {
                (None, format!("unexpected response: {}", message))
            }
        }
    }
}

/// Describe a known platform error code
pub fn describe_remote_code(code: i64) -> Option<&'static str> {
    let description = match code {
        -1 => "platform busy, retry later",
        40001 => "appSecret is wrong or does not belong to this appId",
        40002 => "grant_type must be client_credential",
        40013 => "invalid appId",
        40125 => "invalid appSecret",
        40164 => "caller IP address is not in the whitelist",
        41001 => "access_token parameter missing",
        42001 => "access_token expired",
        45009 => "daily API call limit reached",
        47003 => "invalid argument, check required fields",
        48001 => "API not authorized for this account type",
        50005 => "user does not follow the account",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_with_code() {
        let error = PublishError::Auth {
            code: Some(40125),
            message: "invalid appsecret".to_string(),
        };

        assert_eq!(error.stage(), "auth");
        assert_eq!(error.code(), "AUTH_FAILED");
        assert_eq!(error.remote_code(), Some(40125));
        assert!(!error.is_recoverable());
        let display = error.to_string();
        assert!(display.contains("(code 40125)"));
        assert!(display.contains("invalid appsecret"));
    }

    #[test]
    fn test_auth_error_without_code() {
        let error = PublishError::Auth {
            code: None,
            message: "connection refused".to_string(),
        };

        assert!(error.is_recoverable());
        assert_eq!(
            error.to_string(),
            "[auth] access token request failed: connection refused"
        );
    }

    #[test]
    fn test_asset_upload_error_names_path() {
        let error = PublishError::AssetUpload {
            path: "images/chart.png".to_string(),
            message: "file is empty".to_string(),
        };

        assert_eq!(error.code(), "ASSET_UPLOAD_FAILED");
        assert!(error.to_string().contains("images/chart.png"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_draft_rejected_keeps_message_verbatim() {
        let error = PublishError::DraftRejected {
            code: 45009,
            message: "reach max api daily quota limit rid: 6621".to_string(),
        };

        assert!(error
            .to_string()
            .contains("reach max api daily quota limit rid: 6621"));
        assert!(error.is_recoverable());
        assert!(error
            .suggested_actions()
            .iter()
            .any(|a| a.contains("quota")));
    }

    #[test]
    fn test_ip_whitelist_suggestions() {
        let error = PublishError::Auth {
            code: Some(40164),
            message: "invalid ip".to_string(),
        };

        let actions = error.suggested_actions();
        assert_eq!(actions.len(), 3);
        assert!(actions.iter().any(|a| a.contains("whitelist")));
    }

    #[test]
    fn test_config_error_is_not_recoverable() {
        let error = PublishError::Config("appId is required".to_string());

        assert!(!error.is_recoverable());
        assert_eq!(error.code(), "CONFIG_ERROR");
        assert!(!error.suggested_actions().is_empty());
    }

    #[test]
    fn test_token_rejected_codes() {
        for code in [40001, 40014, 42001] {
            let error = ApiError::Remote {
                code,
                message: "token".to_string(),
            };
            assert!(error.is_token_rejected(), "expected {} to be a token rejection", code);
        }

        let other = ApiError::Remote {
            code: 45009,
            message: "quota".to_string(),
        };
        assert!(!other.is_token_rejected());
        assert!(!ApiError::Transport {
            message: "timeout".to_string()
        }
        .is_token_rejected());
    }

    #[test]
    fn test_api_error_into_parts() {
        let (code, message) = ApiError::Remote {
            code: 47003,
            message: "argument invalid!".to_string(),
        }
        .into_parts();
        assert_eq!(code, Some(47003));
        assert_eq!(message, "argument invalid!");

        let (code, message) = ApiError::Transport {
            message: "connection reset".to_string(),
        }
        .into_parts();
        assert_eq!(code, None);
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_describe_remote_code() {
        assert_eq!(describe_remote_code(42001), Some("access_token expired"));
        assert!(describe_remote_code(40164).unwrap().contains("whitelist"));
        assert_eq!(describe_remote_code(12345), None);
    }
}
