//! Obtains bearer tokens for the resource management API, either as a
//! service principal or as the managed identity of the functions
//! host, whichever the environment configures.

use crate::conf::CredentialSettings;
use crate::error::SubmissionError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Scope requested in the client credentials flow.
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Resource requested from the managed identity endpoint.
const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// API version of the managed identity endpoint.
const IDENTITY_API_VERSION: &str = "2019-08-01";

/// Tokens are refreshed this many seconds before they expire.
const EXPIRY_MARGIN: i64 = 300;

/// The credential selected from the environment.
#[derive(Clone, PartialEq)]
pub enum Credential {
    ClientSecret {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    ManagedIdentity {
        endpoint: String,
        header: String,
        client_id: Option<String>,
    },
    Unavailable,
}

impl Credential {
    /// Pick a credential: a complete service principal wins over a
    /// managed identity endpoint.
    pub fn from_settings(settings: CredentialSettings) -> Self {
        match settings {
            CredentialSettings {
                azure_tenant_id: Some(tenant_id),
                azure_client_id: Some(client_id),
                azure_client_secret: Some(client_secret),
                azure_authority_host,
                ..
            } => Credential::ClientSecret {
                authority_host: azure_authority_host,
                tenant_id,
                client_id,
                client_secret,
            },
            CredentialSettings {
                identity_endpoint: Some(endpoint),
                identity_header: Some(header),
                azure_client_id,
                ..
            } => Credential::ManagedIdentity {
                endpoint,
                header,
                client_id: azure_client_id,
            },
            _ => Credential::Unavailable,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Credential::ClientSecret { .. } => "client secret",
            Credential::ManagedIdentity { .. } => "managed identity",
            Credential::Unavailable => "none",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    expires_on: Option<Value>,
}

/// Either a number or a string holding one.
fn seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl TokenResponse {
    fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(at) = self
            .expires_on
            .as_ref()
            .and_then(seconds)
            .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
        {
            return at;
        }
        now + Duration::seconds(self.expires_in.as_ref().and_then(seconds).unwrap_or(0))
    }
}

struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

/// Hands out management API tokens, reusing a token until it is
/// about to expire.
pub struct TokenProvider {
    http: reqwest::Client,
    credential: Credential,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, credential: Credential) -> Self {
        TokenProvider {
            http,
            credential,
            cached: Mutex::new(None),
        }
    }

    /// Get a bearer token, fetching a new one when none is cached or
    /// the cached one expires soon.
    pub async fn token(&self) -> Result<String, SubmissionError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(EXPIRY_MARGIN) > now {
                return Ok(token.secret.clone());
            }
        }
        let response = self.fetch().await?;
        let token = AccessToken {
            expires_at: response.expires_at(now),
            secret: response.access_token,
        };
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }

    #[instrument(skip(self), fields(credential = self.credential.kind()))]
    async fn fetch(&self) -> Result<TokenResponse, SubmissionError> {
        let request = match &self.credential {
            Credential::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            } => self
                .http
                .post(format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority_host.trim_end_matches('/'),
                    tenant_id
                ))
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", MANAGEMENT_SCOPE),
                ]),
            Credential::ManagedIdentity {
                endpoint,
                header,
                client_id,
            } => {
                let mut query = vec![
                    ("resource", MANAGEMENT_RESOURCE),
                    ("api-version", IDENTITY_API_VERSION),
                ];
                if let Some(client_id) = client_id {
                    query.push(("client_id", client_id.as_str()));
                }
                self.http
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header)
            }
            Credential::Unavailable => {
                return Err(SubmissionError::Credential(String::from(
                    "no credential configured; set AZURE_TENANT_ID, AZURE_CLIENT_ID \
                     and AZURE_CLIENT_SECRET, or run with a managed identity",
                )))
            }
        };
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Credential(format!(
                "token endpoint answered {}: {}",
                status, body
            )));
        }
        debug!("Obtained management API token");
        response
            .json()
            .await
            .map_err(|e| SubmissionError::Credential(format!("malformed token response: {}", e)))
    }
}
