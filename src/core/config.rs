//! Configuration structures and types for the draft publisher
//!
//! `PublisherConfig` is what the pipeline consumes. `ConfigFile` mirrors the
//! on-disk YAML layout and is resolved into a `PublisherConfig` by
//! [`crate::core::ConfigLoader`].

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default API root
pub const DEFAULT_API_BASE_URL: &str = "https://api.weixin.qq.com/cgi-bin";

/// Default cover asset shipped next to the publisher
pub const DEFAULT_COVER_PATH: &str = "assets/default_cover.png";

/// Image CDN hosts whose URLs are already platform-hosted
pub const DEFAULT_PLATFORM_HOSTS: &[&str] = &["mmbiz.qpic.cn", "mmbiz.qlogo.cn", "mmecoa.qpic.cn"];

/// Resolved publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Application identity (required)
    pub app_id: String,

    /// Application secret (required)
    pub app_secret: SecretString,

    /// Author used when an article carries none
    pub default_author: Option<String>,

    /// API root, without trailing slash
    pub api_base_url: String,

    /// Cover used when an article has neither an explicit cover nor images
    pub default_cover_path: PathBuf,

    /// Hosts treated as platform-hosted
    pub platform_hosts: Vec<String>,

    /// Upper bound of concurrent image uploads
    pub max_concurrent_uploads: usize,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Subtracted from the token lifetime reported by the platform
    pub token_expiry_margin: Duration,

    /// Draft display options
    pub draft: DraftOptions,
}

impl PublisherConfig {
    /// Create a configuration with defaults for everything but the credentials
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        let app_secret: String = app_secret.into();
        Self {
            app_id: app_id.into(),
            app_secret: SecretString::new(app_secret.into()),
            default_author: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_cover_path: PathBuf::from(DEFAULT_COVER_PATH),
            platform_hosts: DEFAULT_PLATFORM_HOSTS.iter().map(|h| h.to_string()).collect(),
            max_concurrent_uploads: 3,
            request_timeout: Duration::from_secs(30),
            token_expiry_margin: Duration::from_secs(300),
            draft: DraftOptions::default(),
        }
    }

    pub fn with_default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = Some(author.into());
        self
    }

    pub fn with_default_cover(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_cover_path = path.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max.max(1);
        self
    }

    pub fn with_token_expiry_margin(mut self, margin: Duration) -> Self {
        self.token_expiry_margin = margin;
        self
    }
}

/// Draft display options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftOptions {
    /// Show the cover image at the top of the article
    pub show_cover_pic: bool,

    /// Open comments on the article
    pub open_comment: bool,

    /// Restrict comments to followers
    pub fans_only_comment: bool,

    /// "Read original" link
    pub content_source_url: Option<String>,
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self {
            show_cover_pic: true,
            open_comment: false,
            fans_only_comment: false,
            content_source_url: None,
        }
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    /// Application identity
    #[serde(skip_serializing_if = "Option::is_none", rename = "appId")]
    pub app_id: Option<String>,

    /// Application secret (environment variable expansion supported)
    #[serde(skip_serializing_if = "Option::is_none", rename = "appSecret")]
    pub app_secret: Option<String>,

    /// Default author name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "apiBaseUrl")]
    pub api_base_url: Option<String>,

    /// Default cover path, relative to the config file
    #[serde(skip_serializing_if = "Option::is_none", rename = "defaultCover")]
    pub default_cover: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "platformHosts")]
    pub platform_hosts: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "maxConcurrentUploads")]
    pub max_concurrent_uploads: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "requestTimeoutSecs")]
    pub request_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "tokenExpiryMarginSecs")]
    pub token_expiry_margin_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftOptionsFile>,
}

/// Draft options as written in the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftOptionsFile {
    #[serde(skip_serializing_if = "Option::is_none", rename = "showCoverPic")]
    pub show_cover_pic: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "openComment")]
    pub open_comment: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "fansOnlyComment")]
    pub fans_only_comment: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "contentSourceUrl")]
    pub content_source_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = PublisherConfig::new("wx1234567890abcdef", "secret");
        assert_eq!(config.app_id, "wx1234567890abcdef");
        assert_eq!(config.app_secret.expose_secret(), "secret");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.max_concurrent_uploads, 3);
        assert_eq!(config.token_expiry_margin, Duration::from_secs(300));
        assert!(config.draft.show_cover_pic);
        assert!(config.platform_hosts.contains(&"mmbiz.qpic.cn".to_string()));
    }

    #[test]
    fn test_builder_normalizes_values() {
        let config = PublisherConfig::new("wx", "s")
            .with_api_base_url("http://localhost:8080/cgi-bin/")
            .with_max_concurrent_uploads(0);

        assert_eq!(config.api_base_url, "http://localhost:8080/cgi-bin");
        assert_eq!(config.max_concurrent_uploads, 1);
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = PublisherConfig::new("wx", "very-secret-value");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret-value"));
    }

    #[test]
    fn test_deserialize_minimal_file() {
        let yaml = r#"
appId: wx1234567890abcdef
appSecret: "${WECHAT_APP_SECRET}"
draft:
  openComment: true
"#;
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.app_id.as_deref(), Some("wx1234567890abcdef"));
        assert_eq!(file.app_secret.as_deref(), Some("${WECHAT_APP_SECRET}"));
        assert_eq!(file.draft.unwrap().open_comment, Some(true));
        assert!(file.author.is_none());
    }

    #[test]
    fn test_serialize_file_uses_camel_case() {
        let file = ConfigFile {
            app_id: Some("wx".to_string()),
            max_concurrent_uploads: Some(5),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&file).unwrap();
        assert!(yaml.contains("appId: wx"));
        assert!(yaml.contains("maxConcurrentUploads: 5"));
        assert!(!yaml.contains("appSecret"));
    }
}
