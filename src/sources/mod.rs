//! Document sources and shared HTTP utilities for the upstream document store.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::warn;

use crate::error::PipelineError;
pub use crate::utils::serde::StringOrVec;

pub mod firestore;
pub mod google_auth;

const ERROR_BODY_MAX_BYTES: usize = 2048;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

static HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();

/// One upstream document before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: HashMap<String, StringOrVec>,
    /// Soft-delete marker; deleted documents never become records.
    pub deleted: bool,
}

impl RawDocument {
    pub fn field(&self, name: &str) -> Option<&StringOrVec> {
        self.fields.get(name)
    }
}

/// A read-only store that can list its whole document collection.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short label used in logs and health output.
    fn name(&self) -> &str;

    /// Every document in the collection, soft-deleted ones included.
    async fn list_documents(&self) -> Result<Vec<RawDocument>, PipelineError>;

    /// Cheap reachability check.
    async fn probe(&self) -> Result<(), PipelineError> {
        self.list_documents().await.map(|_| ())
    }
}

/// Returns a shared HTTP client with retry middleware.
///
/// - Retry: 3 attempts with exponential backoff for transient errors
/// - No response cache: every refresh must observe the live collection
pub(crate) fn shared_client() -> Result<ClientWithMiddleware, PipelineError> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let base_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("pipeline-search/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(PipelineError::HttpClientInit)?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    let client = ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

    match HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HTTP_CLIENT.get().cloned().ok_or_else(|| PipelineError::Api {
            api: "http-client".into(),
            message: "Shared HTTP client initialization race".into(),
        }),
    }
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) fn ensure_json_content_type(
    api: &str,
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), PipelineError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let raw = match content_type.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            warn!(
                source = api,
                "Response content-type header was not valid UTF-8; attempting JSON parse"
            );
            return Ok(());
        }
    };
    if raw.is_empty() {
        return Ok(());
    }

    let media_type = raw
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_html = matches!(media_type.as_str(), "text/html" | "application/xhtml+xml");
    if is_html {
        return Err(PipelineError::Api {
            api: api.to_string(),
            message: format!(
                "Unexpected HTML response (content-type: {raw}): {}",
                body_excerpt(body)
            ),
        });
    }

    let is_json = media_type == "application/json"
        || media_type == "text/json"
        || media_type.ends_with("+json");
    if !is_json {
        warn!(
            source = api,
            content_type = raw,
            "Unexpected non-JSON content type; attempting JSON parse for compatibility"
        );
    }

    Ok(())
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, PipelineError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(PipelineError::Api {
                api: api.to_string(),
                message: format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_json_content_type_rejects_html() {
        let err = ensure_json_content_type(
            "firestore",
            Some(&HeaderValue::from_static("text/html; charset=utf-8")),
            b"<html><body>upstream error</body></html>",
        )
        .expect_err("html should be rejected");
        let msg = err.to_string();
        assert!(msg.contains("firestore"));
        assert!(msg.contains("HTML"));
    }

    #[test]
    fn ensure_json_content_type_accepts_json() {
        let ok = ensure_json_content_type(
            "firestore",
            Some(&HeaderValue::from_static("application/json; charset=utf-8")),
            b"{\"documents\":[]}",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn ensure_json_content_type_allows_non_json_compat_mode() {
        let ok = ensure_json_content_type(
            "firestore",
            Some(&HeaderValue::from_static("text/plain")),
            b"{}",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn body_excerpt_flattens_and_truncates() {
        assert_eq!(body_excerpt(b"  line one\nline two\t "), "line one line two");

        let long = "é".repeat(ERROR_BODY_MAX_BYTES);
        let excerpt = body_excerpt(long.as_bytes());
        assert!(excerpt.ends_with(" …"));
        assert!(excerpt.len() <= ERROR_BODY_MAX_BYTES + " …".len());
    }

    #[test]
    fn raw_document_field_lookup() {
        let mut doc = RawDocument {
            id: "abc".into(),
            ..RawDocument::default()
        };
        doc.fields
            .insert("title".into(), StringOrVec::Single("Hello".into()));
        assert_eq!(doc.field("title").and_then(StringOrVec::first), Some("Hello"));
        assert!(doc.field("missing").is_none());
    }
}
