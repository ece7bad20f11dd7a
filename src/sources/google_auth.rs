//! Google service-account access tokens via the OAuth 2.0 JWT-bearer grant.

use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::PipelineError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const TOKEN_API: &str = "google-oauth";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
// Tokens closer than this to expiry are exchanged again.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub(crate) struct GoogleTokenProvider {
    client: ClientWithMiddleware,
    account: ServiceAccount,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleTokenProvider {
    pub(crate) fn new(client: ClientWithMiddleware, account: ServiceAccount) -> Self {
        Self {
            client,
            account,
            cached: Mutex::new(None),
        }
    }

    /// Returns a cached access token, exchanging a fresh assertion when it is near expiry.
    pub(crate) async fn access_token(&self) -> Result<String, PipelineError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + EXPIRY_MARGIN
        {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn signed_assertion(&self) -> Result<String, PipelineError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())
            .map_err(|e| PipelineError::Auth(format!("invalid service account private key: {e}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| PipelineError::Auth(format!("failed to sign token assertion: {e}")))
    }

    async fn exchange(&self) -> Result<CachedToken, PipelineError> {
        let assertion = self.signed_assertion()?;
        debug!(
            client_email = %self.account.client_email,
            "Exchanging service account assertion for an access token"
        );

        let resp = self
            .client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, TOKEN_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(PipelineError::Auth(format!(
                "token endpoint returned HTTP {status}: {excerpt}"
            )));
        }

        let token: TokenResponse =
            serde_json::from_slice(&bytes).map_err(|source| PipelineError::ApiJson {
                api: TOKEN_API.to_string(),
                source,
            })?;
        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
