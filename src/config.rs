//! Process configuration read from the environment (and `.env`, when present).

use std::path::PathBuf;

use crate::error::PipelineError;
use crate::sources::firestore::{FIRESTORE_BASE, FIRESTORE_BASE_ENV};
use crate::sources::google_auth::{DEFAULT_TOKEN_URI, ServiceAccount};
use crate::store::FetchFailurePolicy;

pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_COLLECTION: &str = "medical_data";
pub const DEFAULT_FRONTEND_DIR: &str = "frontend/build";
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3001",
    "http://127.0.0.1:3001",
    "http://localhost:3003",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub firestore: FirestoreConfig,
    pub cors_origins: Vec<String>,
    pub frontend_dir: PathBuf,
    pub on_fetch_failure: FetchFailurePolicy,
}

#[derive(Clone)]
pub struct FirestoreConfig {
    pub base: String,
    pub project_id: Option<String>,
    pub database: String,
    pub collection: String,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
    pub service_account: Option<ServiceAccount>,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base: FIRESTORE_BASE.to_string(),
            project_id: None,
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            access_token: None,
            api_key: None,
            service_account: None,
        }
    }
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("base", &self.base)
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("service_account", &self.service_account)
            .finish()
    }
}

impl Config {
    /// Loads `.env` (if any) and reads configuration from the process environment.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let service_account = match (get("FIREBASE_EMAIL"), get("FIREBASE_PRIVATE_KEY")) {
            (Some(client_email), Some(private_key)) => Some(ServiceAccount {
                client_email,
                private_key: private_key.replace("\\n", "\n"),
                token_uri: get("FIREBASE_TOKEN_URI")
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(PipelineError::InvalidArgument(
                    "FIREBASE_EMAIL and FIREBASE_PRIVATE_KEY must be set together".into(),
                ));
            }
        };

        let firestore = FirestoreConfig {
            base: get(FIRESTORE_BASE_ENV).unwrap_or_else(|| FIRESTORE_BASE.to_string()),
            project_id: get("FIREBASE_PROJECT_ID").or_else(|| get("FIRESTORE_PROJECT_ID")),
            database: get("FIRESTORE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            collection: get("FIRESTORE_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            access_token: get("FIRESTORE_ACCESS_TOKEN"),
            api_key: get("FIRESTORE_API_KEY"),
            service_account,
        };

        let cors_origins = match get("PIPELINE_SEARCH_CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let on_fetch_failure = match get("PIPELINE_SEARCH_ON_FETCH_FAILURE") {
            Some(raw) => raw.parse()?,
            None => FetchFailurePolicy::default(),
        };

        Ok(Self {
            firestore,
            cors_origins,
            frontend_dir: get("PIPELINE_SEARCH_FRONTEND_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FRONTEND_DIR)),
            on_fetch_failure,
        })
    }
}
