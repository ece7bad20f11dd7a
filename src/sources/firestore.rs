//! Firestore REST client: lists a collection and decodes typed values into raw documents.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::FirestoreConfig;
use crate::error::PipelineError;
use crate::sources::google_auth::GoogleTokenProvider;
use crate::sources::{DocumentSource, RawDocument, StringOrVec};

pub const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
pub const FIRESTORE_BASE_ENV: &str = "PIPELINE_SEARCH_FIRESTORE_BASE";

const FIRESTORE_API: &str = "firestore";
const PAGE_SIZE: usize = 300;
const DELETE_FLAG_FIELD: &str = "delete_flag";
const PROGRESS_EVERY: usize = 100;

enum Credentials {
    Bearer(String),
    ServiceAccount(GoogleTokenProvider),
    ApiKey(String),
    Anonymous,
}

pub struct FirestoreClient {
    client: ClientWithMiddleware,
    base: String,
    project_id: Option<String>,
    database: String,
    collection: String,
    credentials: Credentials,
}

impl FirestoreClient {
    pub fn new(config: &FirestoreConfig) -> Result<Self, PipelineError> {
        let client = crate::sources::shared_client()?;
        let credentials = if let Some(token) = config.access_token.clone() {
            Credentials::Bearer(token)
        } else if let Some(account) = config.service_account.clone() {
            Credentials::ServiceAccount(GoogleTokenProvider::new(client.clone(), account))
        } else if let Some(key) = config.api_key.clone() {
            Credentials::ApiKey(key)
        } else {
            Credentials::Anonymous
        };

        Ok(Self {
            client,
            base: config.base.clone(),
            project_id: config.project_id.clone(),
            database: config.database.clone(),
            collection: config.collection.clone(),
            credentials,
        })
    }

    fn collection_url(&self) -> Result<String, PipelineError> {
        let Some(project) = self.project_id.as_deref() else {
            return Err(PipelineError::SourceUnavailable {
                source_name: FIRESTORE_API.to_string(),
                reason: "FIREBASE_PROJECT_ID is not set.".to_string(),
            });
        };
        Ok(format!(
            "{}/projects/{project}/databases/{}/documents/{}",
            self.base.trim_end_matches('/'),
            self.database,
            self.collection.trim_matches('/')
        ))
    }

    async fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder, PipelineError> {
        Ok(match &self.credentials {
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::ServiceAccount(provider) => req.bearer_auth(provider.access_token().await?),
            Credentials::ApiKey(key) => req.query(&[("key", key.as_str())]),
            Credentials::Anonymous => req,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, PipelineError> {
        let resp = req.send().await?;
        let status = resp.status();
        let content_type = resp.headers().get(CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, FIRESTORE_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(PipelineError::Api {
                api: FIRESTORE_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        crate::sources::ensure_json_content_type(FIRESTORE_API, content_type.as_ref(), &bytes)?;
        serde_json::from_slice(&bytes).map_err(|source| PipelineError::ApiJson {
            api: FIRESTORE_API.to_string(),
            source,
        })
    }

    async fn fetch_page(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, PipelineError> {
        let url = self.collection_url()?;
        let page_size = page_size.to_string();
        let mut req = self
            .client
            .get(&url)
            .query(&[("pageSize", page_size.as_str())]);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        let req = self.authorize(req).await?;
        self.get_json(req).await
    }
}

#[async_trait]
impl DocumentSource for FirestoreClient {
    fn name(&self) -> &str {
        FIRESTORE_API
    }

    async fn list_documents(&self) -> Result<Vec<RawDocument>, PipelineError> {
        let mut out = Vec::new();
        let mut seen = 0usize;
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(PAGE_SIZE, page_token.as_deref()).await?;
            for doc in page.documents {
                seen += 1;
                if seen % PROGRESS_EVERY == 0 {
                    debug!(count = seen, "Processing Firestore documents");
                }
                match doc.into_raw() {
                    Some(raw) => out.push(raw),
                    None => warn!(source = FIRESTORE_API, "Skipping document without an id"),
                }
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(
            count = out.len(),
            collection = %self.collection,
            "Listed Firestore collection"
        );
        Ok(out)
    }

    async fn probe(&self) -> Result<(), PipelineError> {
        self.fetch_page(1, None).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FirestoreValue>,
}

impl FirestoreDocument {
    /// Last segment of `projects/{p}/databases/{d}/documents/{collection}/{id}`.
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn into_raw(self) -> Option<RawDocument> {
        let id = self.id().to_string();
        if id.is_empty() {
            return None;
        }
        let deleted = self
            .fields
            .get(DELETE_FLAG_FIELD)
            .is_some_and(FirestoreValue::is_truthy);
        let fields = self
            .fields
            .into_iter()
            .filter_map(|(name, value)| {
                let value = value.into_field();
                (value != StringOrVec::None).then_some((name, value))
            })
            .collect();

        Some(RawDocument {
            id,
            fields,
            deleted,
        })
    }
}

/// Typed Firestore value. Kinds with no string form (maps, bytes, geo points, null,
/// booleans) are left undecoded and read as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreValue {
    string_value: Option<String>,
    integer_value: Option<String>,
    double_value: Option<serde_json::Value>,
    boolean_value: Option<bool>,
    timestamp_value: Option<String>,
    reference_value: Option<String>,
    array_value: Option<FirestoreArray>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FirestoreArray {
    #[serde(default)]
    values: Vec<FirestoreValue>,
}

/// Numeric zero is falsy upstream and reads as `""`.
fn non_zero(text: &str, is_zero: bool) -> String {
    if is_zero {
        String::new()
    } else {
        text.to_string()
    }
}

impl FirestoreValue {
    fn scalar(&self) -> Option<String> {
        if let Some(v) = self.string_value.as_ref() {
            return Some(v.clone());
        }
        if let Some(v) = self.timestamp_value.as_ref() {
            return Some(v.clone());
        }
        if let Some(v) = self.reference_value.as_ref() {
            return Some(v.clone());
        }
        if let Some(v) = self.integer_value.as_ref() {
            return Some(non_zero(v, v.trim().parse::<i64>().ok() == Some(0)));
        }
        match self.double_value.as_ref()? {
            serde_json::Value::Number(n) => {
                Some(non_zero(&n.to_string(), n.as_f64() == Some(0.0)))
            }
            serde_json::Value::String(s) => {
                Some(non_zero(s, s.trim().parse::<f64>().ok() == Some(0.0)))
            }
            _ => None,
        }
    }

    fn into_field(self) -> StringOrVec {
        if let Some(array) = self.array_value {
            return StringOrVec::Multiple(
                array
                    .values
                    .iter()
                    .map(|v| v.scalar().unwrap_or_default())
                    .collect(),
            );
        }
        self.scalar().map(StringOrVec::Single).unwrap_or_default()
    }

    fn is_truthy(&self) -> bool {
        if let Some(v) = self.boolean_value {
            return v;
        }
        if let Some(v) = self.integer_value.as_deref() {
            return v.trim().parse::<i64>().map(|n| n != 0).unwrap_or(true);
        }
        if let Some(serde_json::Value::Number(n)) = self.double_value.as_ref() {
            return n.as_f64().is_some_and(|f| f != 0.0);
        }
        if let Some(array) = self.array_value.as_ref() {
            return !array.values.is_empty();
        }
        self.scalar().is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLLECTION_PATH: &str = "/projects/demo/databases/(default)/documents/medical_data";

    fn config(base: String) -> FirestoreConfig {
        FirestoreConfig {
            base,
            project_id: Some("demo".into()),
            ..FirestoreConfig::default()
        }
    }

    fn value(json: serde_json::Value) -> FirestoreValue {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn decodes_scalar_and_array_values() {
        assert_eq!(
            value(serde_json::json!({"stringValue": "Acme"})).into_field(),
            StringOrVec::Single("Acme".into())
        );
        assert_eq!(
            value(serde_json::json!({"integerValue": "42"})).into_field(),
            StringOrVec::Single("42".into())
        );
        assert_eq!(
            value(serde_json::json!({"timestampValue": "2024-01-02T00:00:00Z"})).into_field(),
            StringOrVec::Single("2024-01-02T00:00:00Z".into())
        );
        assert_eq!(
            value(serde_json::json!({"arrayValue": {"values": [
                {"stringValue": "Acme"},
                {"mapValue": {"fields": {}}},
                {"stringValue": "Acme Sub"}
            ]}}))
            .into_field(),
            StringOrVec::Multiple(vec!["Acme".into(), String::new(), "Acme Sub".into()])
        );
        assert_eq!(
            value(serde_json::json!({"arrayValue": {}})).into_field(),
            StringOrVec::Multiple(Vec::new())
        );
    }

    #[test]
    fn numeric_zero_reads_as_empty() {
        assert_eq!(
            value(serde_json::json!({"integerValue": "0"})).into_field(),
            StringOrVec::Single(String::new())
        );
        assert_eq!(
            value(serde_json::json!({"doubleValue": 0.0})).into_field(),
            StringOrVec::Single(String::new())
        );
        assert_eq!(
            value(serde_json::json!({"doubleValue": 2.5})).into_field(),
            StringOrVec::Single("2.5".into())
        );
        assert_eq!(
            value(serde_json::json!({"arrayValue": {"values": [{"integerValue": "0"}]}}))
                .into_field(),
            StringOrVec::Multiple(vec![String::new()])
        );
    }

    #[test]
    fn non_string_kinds_read_as_absent() {
        assert_eq!(
            value(serde_json::json!({"nullValue": null})).into_field(),
            StringOrVec::None
        );
        assert_eq!(
            value(serde_json::json!({"mapValue": {"fields": {"a": {"stringValue": "b"}}}}))
                .into_field(),
            StringOrVec::None
        );
        assert_eq!(
            value(serde_json::json!({"booleanValue": true})).into_field(),
            StringOrVec::None
        );
    }

    #[test]
    fn delete_flag_truthiness() {
        assert!(value(serde_json::json!({"booleanValue": true})).is_truthy());
        assert!(!value(serde_json::json!({"booleanValue": false})).is_truthy());
        assert!(value(serde_json::json!({"integerValue": "1"})).is_truthy());
        assert!(!value(serde_json::json!({"integerValue": "0"})).is_truthy());
        assert!(value(serde_json::json!({"stringValue": "yes"})).is_truthy());
        assert!(!value(serde_json::json!({"stringValue": ""})).is_truthy());
        assert!(!value(serde_json::json!({"nullValue": null})).is_truthy());
        assert!(!value(serde_json::json!({"arrayValue": {}})).is_truthy());
    }

    #[test]
    fn document_id_is_last_path_segment() {
        let doc: FirestoreDocument = serde_json::from_value(serde_json::json!({
            "name": "projects/demo/databases/(default)/documents/medical_data/abc123",
            "fields": {
                "title": {"stringValue": "Approval"},
                "delete_flag": {"booleanValue": true},
                "extra": {"nullValue": null}
            }
        }))
        .unwrap();

        let raw = doc.into_raw().unwrap();
        assert_eq!(raw.id, "abc123");
        assert!(raw.deleted);
        assert_eq!(raw.field("title").and_then(StringOrVec::first), Some("Approval"));
        assert!(raw.field("extra").is_none());
    }

    #[tokio::test]
    async fn list_documents_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [{
                    "name": "projects/demo/databases/(default)/documents/medical_data/b",
                    "fields": {"title": {"stringValue": "second"}}
                }]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("pageSize", "300"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [{
                    "name": "projects/demo/databases/(default)/documents/medical_data/a",
                    "fields": {"companies": {"arrayValue": {"values": [{"stringValue": "Acme"}]}}}
                }],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FirestoreClient::new(&config(server.uri())).unwrap();
        let docs = client.list_documents().await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            docs[0].field("companies"),
            Some(&StringOrVec::Multiple(vec!["Acme".into()]))
        );
    }

    #[tokio::test]
    async fn empty_collection_has_no_documents_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = FirestoreClient::new(&config(server.uri())).unwrap();
        assert!(client.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn static_token_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(header("authorization", "Bearer static-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = FirestoreClient::new(&FirestoreConfig {
            access_token: Some("static-token".into()),
            api_key: Some("ignored".into()),
            ..config(server.uri())
        })
        .unwrap();
        client.list_documents().await.unwrap();
    }

    #[tokio::test]
    async fn api_key_is_sent_as_query_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("key", "browser-key"))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = FirestoreClient::new(&FirestoreConfig {
            api_key: Some("browser-key".into()),
            ..config(server.uri())
        })
        .unwrap();
        client.probe().await.unwrap();
    }

    #[tokio::test]
    async fn http_error_is_reported_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let client = FirestoreClient::new(&config(server.uri())).unwrap();
        let err = client.list_documents().await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("firestore"));
        assert!(msg.contains("403"));
        assert!(msg.contains("PERMISSION_DENIED"));
    }

    #[tokio::test]
    async fn html_response_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>login</html>", "text/html"),
            )
            .mount(&server)
            .await;

        let client = FirestoreClient::new(&config(server.uri())).unwrap();
        let err = client.list_documents().await.unwrap_err();
        assert!(err.to_string().contains("HTML"));
    }

    #[tokio::test]
    async fn missing_project_is_source_unavailable() {
        let client = FirestoreClient::new(&FirestoreConfig {
            project_id: None,
            ..config("http://127.0.0.1:9".into())
        })
        .unwrap();
        let err = client.list_documents().await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }
}
