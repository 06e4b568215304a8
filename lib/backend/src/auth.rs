//! Credentials attached to every backend request.
//!
//! Supported sources, in order of precedence:
//! - `auth.credentials_file`: a `service_account` key (signed JWT grant), an
//!   `authorized_user` document (OAuth2 refresh-token grant) or a file
//!   holding a bare bearer token
//! - `GOOGLE_APPLICATION_CREDENTIALS`, same formats, when only scopes are set
//! - the GCE metadata server, when only scopes are set
//!
//! Access tokens are cached until shortly before they expire.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use querybridge_config::AuthConfig;

use crate::error::{BackendError, Result};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for service account assertions; Google caps it at 1h.
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);

/// Tokens are refreshed this long before the expiry the issuer reported.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub(crate) enum Credentials {
    Anonymous,
    Static(String),
    OAuth(TokenSource),
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

impl Credentials {
    pub(crate) fn from_config(auth: &AuthConfig, http: reqwest::Client) -> Result<Self> {
        if auth.is_anonymous() {
            return Ok(Credentials::Anonymous);
        }

        let file = auth.credentials_file.clone().or_else(|| {
            std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS")
                .filter(|p| !p.is_empty())
                .map(Into::into)
        });

        match file {
            Some(path) => Self::from_file(&path, &auth.scopes, http),
            None => {
                info!("... using metadata server credentials");
                Ok(Credentials::OAuth(TokenSource::new(
                    http,
                    Grant::MetadataServer {
                        host: std::env::var("GCE_METADATA_HOST")
                            .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string()),
                        scopes: auth.scopes.clone(),
                    },
                )))
            }
        }
    }

    fn from_file(path: &Path, scopes: &[String], http: reqwest::Client) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BackendError::Transport(format!(
                "error reading credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        info!("... using credentials from {}", path.display());
        Self::parse(&contents, scopes, http)
    }

    fn parse(contents: &str, scopes: &[String], http: reqwest::Client) -> Result<Self> {
        let file: CredentialsFile = match serde_json::from_str(contents) {
            Ok(file) => file,
            Err(_) => {
                let token = contents.trim();
                if token.is_empty() || token.starts_with('{') {
                    return Err(BackendError::Transport(
                        "credentials file is neither a credentials document nor a token".into(),
                    ));
                }
                return Ok(Credentials::Static(token.to_string()));
            }
        };

        let kind = file.kind.as_str();
        let field = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| BackendError::Transport(format!("{} credentials lack {}", kind, name)))
        };

        match kind {
            "authorized_user" => {
                Ok(Credentials::OAuth(TokenSource::new(
                    http,
                    Grant::RefreshToken {
                        token_uri: file
                            .token_uri
                            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
                        client_id: field(file.client_id, "client_id")?,
                        client_secret: field(file.client_secret, "client_secret")?,
                        refresh_token: field(file.refresh_token, "refresh_token")?,
                        scopes: scopes.to_vec(),
                    },
                )))
            }
            "service_account" => {
                let private_key = field(file.private_key, "private_key")?;
                let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
                    BackendError::Transport(format!("invalid service account private_key: {}", e))
                })?;
                Ok(Credentials::OAuth(TokenSource::new(
                    http,
                    Grant::ServiceAccount {
                        token_uri: file
                            .token_uri
                            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
                        client_email: field(file.client_email, "client_email")?,
                        key,
                        key_id: file.private_key_id,
                        scopes: scopes.to_vec(),
                    },
                )))
            }
            other => Err(BackendError::Transport(format!(
                "unsupported credentials type {:?}",
                other
            ))),
        }
    }

    pub(crate) async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        match self {
            Credentials::Anonymous => Ok(request),
            Credentials::Static(token) => Ok(request.bearer_auth(token)),
            Credentials::OAuth(source) => Ok(request.bearer_auth(source.token().await?)),
        }
    }
}

enum Grant {
    RefreshToken {
        token_uri: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
        scopes: Vec<String>,
    },
    ServiceAccount {
        token_uri: String,
        client_email: String,
        key: EncodingKey,
        key_id: Option<String>,
        scopes: Vec<String>,
    },
    MetadataServer {
        host: String,
        scopes: Vec<String>,
    },
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

struct Token {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Fetches and caches OAuth2 access tokens. Concurrent refreshes are
/// harmless; the last one stored wins.
pub(crate) struct TokenSource {
    http: reqwest::Client,
    grant: Grant,
    cached: ArcSwapOption<Token>,
}

impl TokenSource {
    fn new(http: reqwest::Client, grant: Grant) -> Self {
        Self {
            http,
            grant,
            cached: ArcSwapOption::empty(),
        }
    }

    pub(crate) async fn token(&self) -> Result<String> {
        let fresh = self
            .cached
            .load_full()
            .filter(|token| token.expires_at > Instant::now() + EXPIRY_MARGIN);
        if let Some(token) = fresh {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        self.cached.store(Some(Arc::new(token)));
        Ok(value)
    }

    async fn fetch(&self) -> Result<Token> {
        let request = match &self.grant {
            Grant::RefreshToken {
                token_uri,
                client_id,
                client_secret,
                refresh_token,
                scopes,
            } => {
                let mut form = vec![
                    ("grant_type", "refresh_token".to_string()),
                    ("client_id", client_id.clone()),
                    ("client_secret", client_secret.clone()),
                    ("refresh_token", refresh_token.clone()),
                ];
                if !scopes.is_empty() {
                    form.push(("scope", scopes.join(" ")));
                }
                self.http.post(token_uri).form(&form)
            }
            Grant::ServiceAccount {
                token_uri,
                client_email,
                key,
                key_id,
                scopes,
            } => {
                let assertion = assertion(token_uri, client_email, key, key_id.as_deref(), scopes)?;
                self.http.post(token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
            }
            Grant::MetadataServer { host, scopes } => {
                let url = format!(
                    "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
                    host
                );
                self.http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .query(&[("scopes", scopes.join(","))])
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Auth(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Auth(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Auth(format!(
                "token endpoint returned {}: {}",
                status,
                String::from_utf8_lossy(&body).trim()
            )));
        }

        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(|e| BackendError::Auth(e.to_string()))?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!("fetched access token valid for {:?}", lifetime);

        Ok(Token {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

/// RS256-signed JWT exchanged for an access token at `token_uri`.
fn assertion(
    token_uri: &str,
    client_email: &str,
    key: &EncodingKey,
    key_id: Option<&str>,
    scopes: &[String],
) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BackendError::Auth(e.to_string()))?
        .as_secs();
    let claims = Claims {
        iss: client_email,
        scope: scopes.join(" "),
        aud: token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME.as_secs(),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key_id.map(str::to_string);
    jsonwebtoken::encode(&header, &claims, key)
        .map_err(|e| BackendError::Auth(format!("error signing service account assertion: {}", e)))
}
