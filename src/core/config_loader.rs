//! Configuration file loader for the draft publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use crate::security::credential_validator::CredentialValidator;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file name looked up in the project directory
pub const CONFIG_FILENAME: &str = ".wechat-publisher.yaml";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_REGEX: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Environment variables that override file values
const ENV_APP_ID: &str = "WECHAT_APP_ID";
const ENV_APP_SECRET: &str = "WECHAT_APP_SECRET";
const ENV_AUTHOR: &str = "WECHAT_AUTHOR";
const ENV_DEFAULT_COVER: &str = "WECHAT_DEFAULT_COVER";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Directory searched for `.wechat-publisher.yaml` (optional file)
    pub project_path: Option<PathBuf>,

    /// Explicit config file (must exist)
    pub config_file: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options reading the process environment
    pub fn from_process_env() -> Self {
        Self {
            env: env::vars().collect(),
            ..Default::default()
        }
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "draft.contentSourceUrl")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. Environment variables
    /// 2. Explicit config file
    /// 3. Project config (./.wechat-publisher.yaml)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublisherConfig, PublishError> {
        let mut configs: Vec<ConfigFile> = Vec::new();
        let mut base_dir: Option<PathBuf> = None;

        // 3. Project config
        if let Some(project_path) = &options.project_path {
            let path = project_path.join(CONFIG_FILENAME);
            if let Some(config) = Self::load_config_file(&path).await? {
                configs.push(config);
                base_dir = Some(project_path.clone());
            }
        }

        // 2. Explicit config file
        if let Some(path) = &options.config_file {
            let config = Self::load_config_file(path).await?.ok_or_else(|| {
                PublishError::Config(format!("Config file not found: {}", path.display()))
            })?;
            configs.push(config);
            base_dir = path.parent().map(Path::to_path_buf);
        }

        // 1. Environment variables (highest priority)
        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        let merged = Self::merge_configs(configs);
        let expanded = Self::expand_env_vars(merged, &options.env);

        let result = Self::validate(&expanded);
        for warning in &result.warnings {
            warn!(field = %warning.field, "{}", warning.message);
        }
        if !result.valid {
            return Err(PublishError::Config(Self::format_validation_result(
                &result,
            )));
        }

        Self::resolve(expanded, base_dir.as_deref())
    }

    /// Load configuration from YAML file
    async fn load_config_file(file_path: &Path) -> Result<Option<ConfigFile>, PublishError> {
        // Check if file exists
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PublishError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: ConfigFile = serde_yaml::from_str(&content).map_err(|e| {
            PublishError::Config(format!("Failed to parse YAML config: {}", e))
        })?;

        debug!(path = %file_path.display(), "Loaded config file");
        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<ConfigFile> {
        let mut config = ConfigFile::default();
        let mut has_changes = false;

        let mut take = |name: &str| {
            let value = env.get(name).filter(|v| !v.trim().is_empty()).cloned();
            has_changes |= value.is_some();
            value
        };

        config.app_id = take(ENV_APP_ID);
        config.app_secret = take(ENV_APP_SECRET);
        config.author = take(ENV_AUTHOR);
        config.default_cover = take(ENV_DEFAULT_COVER);

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<ConfigFile>) -> ConfigFile {
        let mut result = ConfigFile::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut ConfigFile, source: ConfigFile) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(
                    if source.$field.is_some() {
                        target.$field = source.$field;
                    }
                )*
            };
        }

        overlay!(
            app_id,
            app_secret,
            author,
            api_base_url,
            default_cover,
            platform_hosts,
            max_concurrent_uploads,
            request_timeout_secs,
            token_expiry_margin_secs
        );

        // Draft options merge field by field
        if let Some(source_draft) = source.draft {
            let target_draft = target.draft.get_or_insert_with(DraftOptionsFile::default);

            if source_draft.show_cover_pic.is_some() {
                target_draft.show_cover_pic = source_draft.show_cover_pic;
            }
            if source_draft.open_comment.is_some() {
                target_draft.open_comment = source_draft.open_comment;
            }
            if source_draft.fans_only_comment.is_some() {
                target_draft.fans_only_comment = source_draft.fans_only_comment;
            }
            if source_draft.content_source_url.is_some() {
                target_draft.content_source_url = source_draft.content_source_url;
            }
        }
    }

    /// Expand environment variables in string-valued settings
    fn expand_env_vars(mut config: ConfigFile, env: &HashMap<String, String>) -> ConfigFile {
        let expand = |value: &mut Option<String>| {
            if let Some(v) = value {
                *v = Self::expand_string(v, env);
            }
        };

        expand(&mut config.app_id);
        expand(&mut config.app_secret);
        expand(&mut config.author);
        expand(&mut config.api_base_url);
        expand(&mut config.default_cover);

        if let Some(draft) = &mut config.draft {
            expand(&mut draft.content_source_url);
        }

        config
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place so validation can report them.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match env.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!("Environment variable {} not found", var_name);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &ConfigFile) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Credentials (required)
        Self::validate_credentials(config, &mut errors, &mut warnings);

        // 2. Endpoint
        if let Some(api_base_url) = &config.api_base_url {
            match url::Url::parse(api_base_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => errors.push(ConfigValidationError {
                    field: "apiBaseUrl".to_string(),
                    message: format!("Not an http(s) URL: {}", api_base_url),
                }),
            }
        }

        // 3. Limits
        Self::validate_limits(config, &mut errors, &mut warnings);

        // 4. Author length (platform limit is 20 bytes)
        if let Some(author) = &config.author
            && author.len() > 20
        {
            warnings.push(ConfigValidationWarning {
                field: "author".to_string(),
                message: format!("Author is {} bytes and will be truncated", author.len()),
                suggestion: Some("Keep the author within 20 bytes".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Validate appId and appSecret
    fn validate_credentials(
        config: &ConfigFile,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let validator = CredentialValidator::new();

        let fields = [
            ("appId", config.app_id.as_deref(), ENV_APP_ID),
            ("appSecret", config.app_secret.as_deref(), ENV_APP_SECRET),
        ];

        for (field, value, env_name) in fields {
            let Some(value) = value else {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("{} is required (or set {})", field, env_name),
                });
                continue;
            };

            let check = if field == "appId" {
                validator.validate_app_id(value)
            } else {
                validator.validate_app_secret(value)
            };

            if !check.is_likely_real {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: check.reason,
                });
            } else if let Some(warning) = check.warning {
                warnings.push(ConfigValidationWarning {
                    field: field.to_string(),
                    message: warning,
                    suggestion: Some(format!("Double-check {} in the platform console", field)),
                });
            }
        }
    }

    /// Validate numeric limits
    fn validate_limits(
        config: &ConfigFile,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if config.max_concurrent_uploads == Some(0) {
            errors.push(ConfigValidationError {
                field: "maxConcurrentUploads".to_string(),
                message: "maxConcurrentUploads must be at least 1".to_string(),
            });
        }

        if config.request_timeout_secs == Some(0) {
            errors.push(ConfigValidationError {
                field: "requestTimeoutSecs".to_string(),
                message: "requestTimeoutSecs must be at least 1".to_string(),
            });
        }

        if let Some(margin) = config.token_expiry_margin_secs
            && margin >= 7200
        {
            warnings.push(ConfigValidationWarning {
                field: "tokenExpiryMarginSecs".to_string(),
                message: format!("Margin of {}s exceeds the usual 7200s token lifetime", margin),
                suggestion: Some("The default margin is 300 seconds".to_string()),
            });
        }

        if let Some(hosts) = &config.platform_hosts {
            for (i, host) in hosts.iter().enumerate() {
                if host.trim().is_empty() || host.contains('/') {
                    errors.push(ConfigValidationError {
                        field: format!("platformHosts[{}]", i),
                        message: format!("Not a bare host name: {:?}", host),
                    });
                }
            }
        }
    }

    /// Turn a validated file into the runtime configuration
    fn resolve(file: ConfigFile, base_dir: Option<&Path>) -> Result<PublisherConfig, PublishError> {
        let app_id = file
            .app_id
            .ok_or_else(|| PublishError::Config("appId is required".to_string()))?;
        let app_secret = file
            .app_secret
            .ok_or_else(|| PublishError::Config("appSecret is required".to_string()))?;

        let mut config = PublisherConfig::new(app_id, String::new());
        config.app_secret = SecretString::new(app_secret.into());
        config.default_author = file.author;

        if let Some(url) = file.api_base_url {
            config = config.with_api_base_url(url);
        }
        if let Some(cover) = file.default_cover {
            let cover = PathBuf::from(cover);
            config.default_cover_path = match base_dir {
                Some(dir) if cover.is_relative() => dir.join(cover),
                _ => cover,
            };
        }
        if let Some(hosts) = file.platform_hosts {
            config.platform_hosts = hosts.into_iter().map(|h| h.trim().to_lowercase()).collect();
        }
        if let Some(max) = file.max_concurrent_uploads {
            config = config.with_max_concurrent_uploads(max);
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.token_expiry_margin_secs {
            config.token_expiry_margin = Duration::from_secs(secs);
        }
        if let Some(draft) = file.draft {
            let defaults = DraftOptions::default();
            config.draft = DraftOptions {
                show_cover_pic: draft.show_cover_pic.unwrap_or(defaults.show_cover_pic),
                open_comment: draft.open_comment.unwrap_or(defaults.open_comment),
                fans_only_comment: draft.fans_only_comment.unwrap_or(defaults.fans_only_comment),
                content_source_url: draft.content_source_url,
            };
        }

        Ok(config)
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("Configuration validation succeeded".to_string());
        } else {
            lines.push("Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_env_config() {
        let env = env_of(&[
            ("WECHAT_APP_ID", "wx1234567890abcdef"),
            ("WECHAT_AUTHOR", "Editor"),
            ("UNRELATED", "x"),
        ]);

        let config = ConfigLoader::load_env_config(&env).unwrap();

        assert_eq!(config.app_id.as_deref(), Some("wx1234567890abcdef"));
        assert_eq!(config.author.as_deref(), Some("Editor"));
        assert!(config.app_secret.is_none());

        assert!(ConfigLoader::load_env_config(&env_of(&[("WECHAT_APP_ID", "  ")])).is_none());
    }

    #[test]
    fn test_expand_string() {
        let env = env_of(&[("WECHAT_SECRET_PROD", "s3cr3t")]);

        let result = ConfigLoader::expand_string("${WECHAT_SECRET_PROD}", &env);
        assert_eq!(result, "s3cr3t");

        let result = ConfigLoader::expand_string("${WECHAT_SECRET_PROD}-${MISSING_VAR}", &env);
        assert_eq!(result, "s3cr3t-${MISSING_VAR}");
    }

    #[test]
    fn test_merge_configs() {
        let file = ConfigFile {
            app_id: Some("wx-from-file".to_string()),
            author: Some("File Author".to_string()),
            draft: Some(DraftOptionsFile {
                open_comment: Some(true),
                show_cover_pic: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let env = ConfigFile {
            app_id: Some("wx-from-env".to_string()),
            draft: Some(DraftOptionsFile {
                show_cover_pic: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = ConfigLoader::merge_configs(vec![file, env]);

        assert_eq!(merged.app_id.as_deref(), Some("wx-from-env"));
        assert_eq!(merged.author.as_deref(), Some("File Author"));
        let draft = merged.draft.unwrap();
        assert_eq!(draft.open_comment, Some(true));
        assert_eq!(draft.show_cover_pic, Some(true));
    }

    #[test]
    fn test_validate_requires_credentials() {
        let result = ConfigLoader::validate(&ConfigFile::default());

        assert!(!result.valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["appId", "appSecret"]);
    }

    #[test]
    fn test_validate_rejects_placeholders_and_unresolved_vars() {
        let config = ConfigFile {
            app_id: Some("your_app_id".to_string()),
            app_secret: Some("${WECHAT_APP_SECRET}".to_string()),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_validate_limits() {
        let config = ConfigFile {
            app_id: Some("wx1234567890abcdef".to_string()),
            app_secret: Some(SECRET.to_string()),
            api_base_url: Some("ftp://example".to_string()),
            max_concurrent_uploads: Some(0),
            token_expiry_margin_secs: Some(9000),
            platform_hosts: Some(vec!["https://mmbiz.qpic.cn/".to_string()]),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"apiBaseUrl"));
        assert!(fields.contains(&"maxConcurrentUploads"));
        assert!(fields.contains(&"platformHosts[0]"));
        assert_eq!(result.warnings[0].field, "tokenExpiryMarginSecs");
    }

    #[test]
    fn test_unusual_app_id_is_warning() {
        let config = ConfigFile {
            app_id: Some("gh_1234567890".to_string()),
            app_secret: Some(SECRET.to_string()),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "appId");
    }

    #[tokio::test]
    async fn test_load_file_with_env_priority() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"
appId: wx1234567890abcdef
appSecret: "${PROD_WECHAT_SECRET}"
author: File Author
defaultCover: assets/cover.png
maxConcurrentUploads: 5
draft:
  openComment: true
  contentSourceUrl: https://example.org/post
"#,
        )
        .unwrap();

        let options = ConfigLoadOptions {
            project_path: Some(dir.path().to_path_buf()),
            config_file: None,
            env: env_of(&[("PROD_WECHAT_SECRET", SECRET), ("WECHAT_AUTHOR", "Env Author")]),
        };

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(config.app_id, "wx1234567890abcdef");
        assert_eq!(config.app_secret.expose_secret(), SECRET);
        assert_eq!(config.default_author.as_deref(), Some("Env Author"));
        assert_eq!(config.default_cover_path, dir.path().join("assets/cover.png"));
        assert_eq!(config.max_concurrent_uploads, 5);
        assert!(config.draft.open_comment);
        assert!(config.draft.show_cover_pic);
        assert_eq!(
            config.draft.content_source_url.as_deref(),
            Some("https://example.org/post")
        );
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[tokio::test]
    async fn test_load_from_env_only() {
        let options = ConfigLoadOptions {
            env: env_of(&[
                ("WECHAT_APP_ID", "wx1234567890abcdef"),
                ("WECHAT_APP_SECRET", SECRET),
            ]),
            ..Default::default()
        };

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(config.app_id, "wx1234567890abcdef");
        assert_eq!(config.default_cover_path, PathBuf::from(DEFAULT_COVER_PATH));
        assert_eq!(config.token_expiry_margin, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail() {
        let error = ConfigLoader::load(ConfigLoadOptions::default())
            .await
            .unwrap_err();

        assert_eq!(error.code(), "CONFIG_ERROR");
        assert!(error.to_string().contains("appId"));
    }

    #[tokio::test]
    async fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let options = ConfigLoadOptions::default().with_config_file(dir.path().join("nope.yaml"));

        let error = ConfigLoader::load(options).await.unwrap_err();
        assert!(error.to_string().contains("Config file not found"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "appId: [unterminated").unwrap();

        let error = ConfigLoader::load(ConfigLoadOptions::default().with_config_file(&path))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("Failed to parse YAML config"));
    }

    #[test]
    fn test_format_validation_result() {
        let result = ConfigValidationResult {
            valid: false,
            errors: vec![ConfigValidationError {
                field: "appSecret".to_string(),
                message: "appSecret is required".to_string(),
            }],
            warnings: vec![ConfigValidationWarning {
                field: "appId".to_string(),
                message: "unusual appId".to_string(),
                suggestion: Some("check it".to_string()),
            }],
        };

        let formatted = ConfigLoader::format_validation_result(&result);

        assert!(formatted.contains("Configuration has errors"));
        assert!(formatted.contains("[appSecret]"));
        assert!(formatted.contains("Warnings:"));
        assert!(formatted.contains("Suggestion: check it"));
    }
}
