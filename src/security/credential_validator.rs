//! Credential Validator - Rejects placeholder credentials before any request is made
//!
//! This module checks the configured application identity and secret for:
//! - Empty values and unresolved `${VAR}` references
//! - Common test/dummy patterns copied from sample configs
//! - Unusual shapes that are probably typos (reported as warnings)
//!
//! # Example
//!
//! ```
//! use wechat_draft_publisher::security::credential_validator::CredentialValidator;
//!
//! let validator = CredentialValidator::new();
//!
//! let result = validator.validate_app_id("wx1234567890abcdef");
//! assert!(result.is_likely_real);
//! assert!(result.warning.is_none());
//!
//! let result = validator.validate_app_secret("your_app_secret");
//! assert!(!result.is_likely_real);
//! ```

use std::collections::HashMap;

/// Result of credential validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Whether the credential can be sent to the platform
    pub is_likely_real: bool,
    /// Reason for the decision
    pub reason: String,
    /// Non-fatal observation about the value
    pub warning: Option<String>,
    /// Entropy score (bits per character)
    pub entropy: f64,
}

impl ValidationResult {
    fn rejected(reason: impl Into<String>, entropy: f64) -> Self {
        Self {
            is_likely_real: false,
            reason: reason.into(),
            warning: None,
            entropy,
        }
    }
}

/// Validator for the platform application credentials
pub struct CredentialValidator {
    /// Known placeholder patterns
    placeholder_patterns: Vec<&'static str>,
}

impl Default for CredentialValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialValidator {
    /// Create a new credential validator
    pub fn new() -> Self {
        Self {
            placeholder_patterns: vec![
                "your_",
                "your-",
                "example",
                "placeholder",
                "changeme",
                "dummy",
                "xxx",
                "<app",
            ],
        }
    }

    /// Validate an application id
    ///
    /// Application ids look like `wx` followed by 16 alphanumeric characters;
    /// any other shape is accepted with a warning.
    pub fn validate_app_id(&self, app_id: &str) -> ValidationResult {
        let entropy = self.calculate_entropy(app_id);

        if let Some(reason) = self.basic_rejection("appId", app_id) {
            return ValidationResult::rejected(reason, entropy);
        }

        let well_formed = app_id.len() == 18
            && app_id.starts_with("wx")
            && app_id[2..].chars().all(|c| c.is_ascii_alphanumeric());

        ValidationResult {
            is_likely_real: true,
            reason: "appId present".to_string(),
            warning: (!well_formed).then(|| {
                format!(
                    "appId '{}' does not look like 'wx' followed by 16 characters",
                    app_id
                )
            }),
            entropy,
        }
    }

    /// Validate an application secret
    pub fn validate_app_secret(&self, secret: &str) -> ValidationResult {
        let entropy = self.calculate_entropy(secret);

        if let Some(reason) = self.basic_rejection("appSecret", secret) {
            return ValidationResult::rejected(reason, entropy);
        }

        // Real secrets are 32 hex characters, close to 4 bits/char
        let warning = if entropy < 2.5 {
            Some(format!(
                "appSecret has low entropy ({:.2} bits/char), it may be a dummy value",
                entropy
            ))
        } else if secret.len() != 32 {
            Some(format!(
                "appSecret is {} characters long, expected 32",
                secret.len()
            ))
        } else {
            None
        };

        ValidationResult {
            is_likely_real: true,
            reason: format!("High entropy ({:.2} bits/char)", entropy),
            warning,
            entropy,
        }
    }

    fn basic_rejection(&self, field: &str, value: &str) -> Option<String> {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Some(format!("{} is empty", field));
        }
        if trimmed.contains("${") {
            return Some(format!(
                "{} references an environment variable that is not set: {}",
                field, trimmed
            ));
        }
        if self.is_placeholder(trimmed) {
            return Some(format!("{} looks like a placeholder: {}", field, trimmed));
        }

        None
    }

    /// Calculate Shannon entropy of a string (bits per character)
    ///
    /// # Examples
    ///
    /// ```
    /// use wechat_draft_publisher::security::credential_validator::CredentialValidator;
    ///
    /// let validator = CredentialValidator::new();
    ///
    /// // Low entropy (repetitive)
    /// let entropy = validator.calculate_entropy("aaaaaaaaaa");
    /// assert!(entropy < 1.0);
    ///
    /// // High entropy (random)
    /// let entropy = validator.calculate_entropy("a1B2c3D4e5F6g7H8i9");
    /// assert!(entropy > 3.0);
    /// ```
    pub fn calculate_entropy(&self, text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }

        // Count character frequencies
        let mut frequencies = HashMap::new();
        let mut len = 0usize;
        for c in text.chars() {
            *frequencies.entry(c).or_insert(0usize) += 1;
            len += 1;
        }

        let len = len as f64;
        let mut entropy = 0.0;

        for count in frequencies.values() {
            let probability = *count as f64 / len;
            entropy -= probability * probability.log2();
        }

        entropy
    }

    /// Check if a value matches common placeholder patterns
    pub fn is_placeholder(&self, value: &str) -> bool {
        let value_lower = value.to_lowercase();

        if self
            .placeholder_patterns
            .iter()
            .any(|pattern| value_lower.contains(pattern))
        {
            return true;
        }

        // Check for all-same-character patterns
        let mut chars = value.chars();
        if let Some(first_char) = chars.next()
            && value.chars().count() > 3
            && chars.all(|c| c == first_char)
        {
            return true;
        }

        false
    }
}
