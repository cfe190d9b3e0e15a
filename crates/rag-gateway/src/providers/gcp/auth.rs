//! GCP authentication
//!
//! Handles OAuth2 token generation for Vertex AI, either from a service
//! account key (JWT bearer grant) or from the metadata server when running
//! on Cloud Run / GCE.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

enum TokenSource {
    ServiceAccount(PathBuf),
    MetadataServer,
}

/// GCP authentication manager
pub struct GcpAuth {
    source: TokenSource,
    /// Project ID
    project_id: String,
    http: reqwest::Client,
    /// Cached access token
    token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl GcpAuth {
    /// Create from service account JSON key file
    pub fn from_service_account(key_path: impl AsRef<Path>, project_id: String) -> Result<Self> {
        let key_path = key_path.as_ref().to_path_buf();
        if !key_path.exists() {
            return Err(Error::Config(format!(
                "Service account key not found: {}",
                key_path.display()
            )));
        }

        Ok(Self::with_source(TokenSource::ServiceAccount(key_path), project_id))
    }

    /// Use the instance metadata server (Cloud Run, GCE, GKE)
    pub fn from_metadata_server(project_id: String) -> Self {
        Self::with_source(TokenSource::MetadataServer, project_id)
    }

    /// Service account key when one is configured, metadata server otherwise
    pub fn from_config(key_path: Option<&Path>, project_id: String) -> Result<Self> {
        match key_path {
            Some(path) => Self::from_service_account(path, project_id),
            None => Ok(Self::from_metadata_server(project_id)),
        }
    }

    fn with_source(source: TokenSource, project_id: String) -> Self {
        Self {
            source,
            project_id,
            http: reqwest::Client::new(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get project ID
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Service account key in use, `None` for the metadata server
    pub fn key_path(&self) -> Option<&Path> {
        match &self.source {
            TokenSource::ServiceAccount(path) => Some(path),
            TokenSource::MetadataServer => None,
        }
    }

    /// Get a valid access token (refreshing if needed)
    pub async fn get_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(ref cached) = *token {
                if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut token = self.token.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(ref cached) = *token {
            if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = match &self.source {
            TokenSource::ServiceAccount(path) => self.service_account_token(path).await?,
            TokenSource::MetadataServer => self.metadata_token().await?,
        };
        tracing::debug!("Refreshed GCP access token (expires in {}s)", fresh.expires_in);

        *token = Some(CachedToken {
            access_token: fresh.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });

        Ok(fresh.access_token)
    }

    /// Fetch a token from the metadata server
    async fn metadata_token(&self) -> Result<TokenResponse> {
        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Auth(format!("Metadata server request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "Metadata server token request failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Failed to parse metadata token: {}", e)))
    }

    /// Exchange a signed JWT for an access token
    async fn service_account_token(&self, key_path: &Path) -> Result<TokenResponse> {
        let key_content = tokio::fs::read_to_string(key_path).await.map_err(|e| {
            Error::Config(format!(
                "Failed to read service account key {}: {}",
                key_path.display(),
                e
            ))
        })?;

        #[derive(serde::Deserialize)]
        struct ServiceAccountKey {
            client_email: String,
            private_key: String,
            token_uri: String,
        }

        let key: ServiceAccountKey = serde_json::from_str(&key_content).map_err(|e| {
            Error::Config(format!("Invalid service account key format: {}", e))
        })?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| Error::Auth(format!("System clock before epoch: {}", e)))?
            .as_secs() as i64;

        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": CLOUD_PLATFORM_SCOPE,
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let jwt = sign_jwt(&claims, &key.private_key)?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Failed to parse token response: {}", e)))
    }
}

/// Sign `claims` as an RS256 JWT with a PKCS#8 PEM key
fn sign_jwt(claims: &serde_json::Value, private_key_pem: &str) -> Result<String> {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = b64.encode(r#"{"alg":"RS256","typ":"JWT"}"#.as_bytes());
    let payload = b64.encode(claims.to_string().as_bytes());
    let signing_input = format!("{}.{}", header, payload);

    let private_key = private_key_pem.replace("\\n", "\n");
    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(
        pem::parse(&private_key)
            .map_err(|e| Error::Auth(format!("Failed to parse private key PEM: {}", e)))?
            .contents(),
    )
    .map_err(|e| Error::Auth(format!("Failed to parse private key: {:?}", e)))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| Error::Auth(format!("Failed to sign JWT: {:?}", e)))?;

    Ok(format!("{}.{}", signing_input, b64.encode(&signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_file_is_config_error() {
        let result = GcpAuth::from_service_account("/nonexistent/key.json", "p".to_string());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_config_without_key_uses_metadata_server() {
        let auth = GcpAuth::from_config(None, "demo-project".to_string()).unwrap();
        assert_eq!(auth.project_id(), "demo-project");
        assert!(matches!(auth.source, TokenSource::MetadataServer));
        assert!(auth.key_path().is_none());
    }

    #[test]
    fn test_sign_jwt_rejects_garbage_key() {
        let claims = serde_json::json!({"iss": "someone"});
        assert!(matches!(
            sign_jwt(&claims, "not a pem"),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_token_response_default_expiry() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 3600);
    }
}
