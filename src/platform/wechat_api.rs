//! HTTP implementation of [`PlatformApi`] for the WeChat official account API

use crate::core::config::PublisherConfig;
use crate::core::error::{ApiError, PublishError};
use crate::core::traits::{
    AccessGrant, DraftArticle, DraftCreated, DraftRequest, PlatformApi, UploadedMedia,
};
use crate::security::mask_secret_in;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Client for the token, material and draft endpoints
#[derive(Debug, Clone)]
pub struct WeChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl WeChatApi {
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PublishError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_body(response: reqwest::Response, secrets: &[&str]) -> Result<String, ApiError> {
        response
            .text()
            .await
            .map_err(|e| transport_error(e, secrets))
    }
}

#[async_trait]
impl PlatformApi for WeChatApi {
    async fn fetch_token(
        &self,
        app_id: &str,
        app_secret: &SecretString,
    ) -> Result<AccessGrant, ApiError> {
        let secret = app_secret.expose_secret();
        debug!(app_id = %app_id, "Requesting access token");

        let response = self
            .client
            .get(self.endpoint("token"))
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", app_id),
                ("secret", secret),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, &[secret]))?;

        let body = Self::read_body(response, &[secret]).await?;
        parse_response(&body)
    }

    async fn upload_media(
        &self,
        access_token: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedMedia, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(image_mime_type(file_name))
            .map_err(|e| ApiError::InvalidResponse {
                message: e.to_string(),
            })?;
        let form = Form::new().part("media", part);

        let response = self
            .client
            .post(self.endpoint("material/add_material"))
            .query(&[("access_token", access_token), ("type", "image")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(e, &[access_token]))?;

        let body = Self::read_body(response, &[access_token]).await?;
        parse_response(&body)
    }

    async fn create_draft(
        &self,
        access_token: &str,
        article: &DraftArticle,
    ) -> Result<String, ApiError> {
        let request = DraftRequest {
            articles: [article],
        };

        let response = self
            .client
            .post(self.endpoint("draft/add"))
            .query(&[("access_token", access_token)])
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, &[access_token]))?;

        let body = Self::read_body(response, &[access_token]).await?;
        let created: DraftCreated = parse_response(&body)?;
        Ok(created.media_id)
    }

    async fn fetch_external(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(e, &[]))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Transport {
                message: format!("{} returned HTTP {}", url, status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(e, &[]))?;
        Ok(bytes.to_vec())
    }
}

/// Network failure with the request URL and any secret removed
fn transport_error(error: reqwest::Error, secrets: &[&str]) -> ApiError {
    let mut message = error.without_url().to_string();
    for secret in secrets {
        message = mask_secret_in(&message, secret);
    }
    ApiError::Transport { message }
}

/// Decode a platform response body
///
/// A non-zero `errcode` becomes [`ApiError::Remote`] carrying the platform's
/// code and message untouched.
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse {
            message: format!("response is not JSON: {}", e),
        })?;

    if let Some(code) = value.get("errcode").and_then(|c| c.as_i64())
        && code != 0
    {
        let message = value
            .get("errmsg")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(ApiError::Remote { code, message });
    }

    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
        message: e.to_string(),
    })
}

fn image_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response() {
        let grant: AccessGrant =
            parse_response(r#"{"access_token":"ACCESS_TOKEN","expires_in":7200}"#).unwrap();
        assert_eq!(grant.access_token, "ACCESS_TOKEN");
        assert_eq!(grant.expires_in, 7200);
    }

    #[test]
    fn test_parse_error_response() {
        let result: Result<AccessGrant, _> =
            parse_response(r#"{"errcode":40164,"errmsg":"invalid ip 1.2.3.4, not in whitelist"}"#);
        assert_eq!(
            result.unwrap_err(),
            ApiError::Remote {
                code: 40164,
                message: "invalid ip 1.2.3.4, not in whitelist".to_string(),
            }
        );
    }

    #[test]
    fn test_zero_errcode_is_success() {
        let created: DraftCreated =
            parse_response(r#"{"errcode":0,"errmsg":"ok","media_id":"DRAFT_ID"}"#).unwrap();
        assert_eq!(created.media_id, "DRAFT_ID");
    }

    #[test]
    fn test_upload_response() {
        let media: UploadedMedia = parse_response(
            r#"{"media_id":"MEDIA","url":"http://mmbiz.qpic.cn/mmbiz_png/x/0?wx_fmt=png"}"#,
        )
        .unwrap();
        assert_eq!(media.media_id, "MEDIA");
        assert!(media.url.starts_with("http://mmbiz.qpic.cn"));
    }

    #[test]
    fn test_invalid_responses() {
        let not_json: Result<AccessGrant, _> = parse_response("<html>502</html>");
        assert!(matches!(not_json, Err(ApiError::InvalidResponse { .. })));

        let missing_field: Result<DraftCreated, _> = parse_response(r#"{"errcode":0}"#);
        assert!(matches!(missing_field, Err(ApiError::InvalidResponse { .. })));

        let unknown_message: Result<AccessGrant, _> = parse_response(r#"{"errcode":-1}"#);
        assert_eq!(
            unknown_message.unwrap_err(),
            ApiError::Remote {
                code: -1,
                message: "unknown error".to_string(),
            }
        );
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type("a.PNG"), "image/png");
        assert_eq!(image_mime_type("b.gif"), "image/gif");
        assert_eq!(image_mime_type("c.jpg"), "image/jpeg");
        assert_eq!(image_mime_type("noext"), "image/jpeg");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = PublisherConfig::new("wx1234567890abcdef", "secret")
            .with_api_base_url("http://localhost:8080/cgi-bin/");
        let api = WeChatApi::new(&config).unwrap();
        assert_eq!(api.endpoint("draft/add"), "http://localhost:8080/cgi-bin/draft/add");
    }
}
