//! OAuth2 for installed applications.
//!
//! Reads the client secrets downloaded from the Google Cloud console, keeps
//! the user's token in a small JSON cache file, refreshes it when it expires
//! and falls back to the loopback consent flow when there is nothing usable.
//! Uses raw HTTP requests against the token endpoint.

use crate::config::settings::AuthSettings;
use crate::utils::error::{CleanerError, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use url::Url;

pub const CONTACTS_SCOPE: &str = "https://www.googleapis.com/auth/contacts";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

const SETUP_INSTRUCTIONS: &str = "\
📋 To set up Google Cloud credentials:
1. Go to https://console.cloud.google.com/
2. Create a new project or select existing
3. Enable the People API:
   - Go to APIs & Services → Enable APIs
   - Search for 'People API'
   - Click Enable
4. Create OAuth 2.0 credentials:
   - Go to APIs & Services → Credentials
   - Click '+ CREATE CREDENTIALS' → OAuth client ID
   - Application type: Desktop app
5. Download the credentials JSON file and pass it with --credentials";

pub fn setup_instructions() -> &'static str {
    SETUP_INSTRUCTIONS
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

/// OAuth client registration as found in the console's credentials JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ClientSecrets {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CleanerError::MissingCredentialsError {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)?;
        file.installed.or(file.web).ok_or_else(|| {
            CleanerError::config("credentials file has neither an \"installed\" nor a \"web\" client")
        })
    }
}

/// Cached user token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - ChronoDuration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Returns `None` when the file is missing or unreadable as a token.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!("Saved token to {}", path.display());
        Ok(())
    }

    fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        previous_refresh: Option<String>,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: response
                .expires_in
                .map(|secs| now + ChronoDuration::seconds(secs)),
            token_type: response.token_type.unwrap_or_else(default_token_type),
            scope: response.scope,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Shows the consent URL to the user.
pub type UrlPresenter = Box<dyn Fn(&str) + Send + Sync>;

fn terminal_presenter(open_browser: bool) -> UrlPresenter {
    Box::new(move |url: &str| {
        println!("\n🔐 Google authorization required");
        println!("Open this URL in a browser and grant access to your contacts:\n");
        println!("  {}\n", url);

        if open_browser && open::that(url).is_err() {
            tracing::warn!("Could not launch a browser, open the URL manually");
        }
    })
}

/// Produces an access token for the People API, persisting it between runs.
pub struct Authenticator {
    secrets: ClientSecrets,
    token_path: PathBuf,
    http_client: Client,
    present_url: UrlPresenter,
    consent_timeout: Duration,
}

impl Authenticator {
    pub fn new<P: Into<PathBuf>>(secrets: ClientSecrets, token_path: P, auth: &AuthSettings) -> Self {
        Self {
            secrets,
            token_path: token_path.into(),
            http_client: Client::new(),
            present_url: terminal_presenter(auth.open_browser),
            consent_timeout: auth.consent_timeout(),
        }
    }

    /// Replaces the terminal prompt that shows the consent URL.
    pub fn with_url_presenter<F>(mut self, present: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.present_url = Box::new(present);
        self
    }

    /// Cached token if still valid, otherwise refreshed, otherwise obtained
    /// through user consent. New tokens are written back to the cache.
    pub async fn access_token(&self) -> Result<String> {
        let cached = StoredToken::load(&self.token_path)?;

        if let Some(token) = &cached {
            if token.is_valid() {
                tracing::debug!("Using cached token from {}", self.token_path.display());
                return Ok(token.access_token.clone());
            }
        }

        let refreshed = match cached.and_then(|t| t.refresh_token) {
            Some(refresh_token) => {
                tracing::info!("🔄 Refreshing expired token");
                match self.refresh(&refresh_token).await {
                    Ok(token) => Some(token),
                    Err(CleanerError::AuthError { message }) => {
                        tracing::warn!("Token refresh rejected ({}), asking for consent again", message);
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };

        let token = match refreshed {
            Some(token) => token,
            None => self.run_consent_flow().await?,
        };

        token.save(&self.token_path)?;
        Ok(token.access_token)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let form = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.token_request(&form).await?;
        Ok(StoredToken::from_response(
            response,
            Utc::now(),
            Some(refresh_token.to_string()),
        ))
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<StoredToken> {
        let form = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self.token_request(&form).await?;
        Ok(StoredToken::from_response(response, Utc::now(), None))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http_client
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<TokenErrorBody>(&body) {
            Ok(error) => Err(CleanerError::auth(match error.error_description {
                Some(description) => format!("{}: {}", error.error, description),
                None => error.error,
            })),
            Err(_) => Err(CleanerError::ApiStatusError {
                status: status.as_u16(),
                message: body,
            }),
        }
    }

    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", CONTACTS_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| CleanerError::config(format!("invalid auth_uri in credentials: {}", e)))?;

        Ok(url.to_string())
    }

    async fn run_consent_flow(&self) -> Result<StoredToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = new_state();
        let url = self.authorization_url(&redirect_uri, &state)?;

        (self.present_url)(&url);

        tracing::info!(
            "⏳ Waiting up to {:?} for the authorization redirect on {}",
            self.consent_timeout,
            redirect_uri
        );

        let code = tokio::time::timeout(self.consent_timeout, wait_for_redirect(listener, state))
            .await
            .map_err(|_| CleanerError::auth("timed out waiting for the authorization redirect"))??;

        let token = self.exchange_code(&code, &redirect_uri).await?;
        println!("✅ Successfully authenticated with Google");
        Ok(token)
    }
}

/// Random value echoed back by the consent redirect.
fn new_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ─── Redirect receiver ───

struct RedirectState {
    expected_state: String,
    tx: mpsc::Sender<Result<String>>,
}

/// Serves the loopback redirect until one request settles the consent,
/// then shuts the server down. Dropping the returned future stops it too.
async fn wait_for_redirect(listener: TcpListener, expected_state: String) -> Result<String> {
    let (tx, mut rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let state = Arc::new(RedirectState { expected_state, tx });
    let router = Router::new()
        .route("/", get(handle_redirect))
        .with_state(state);

    tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::warn!("Redirect listener failed: {}", e);
        }
    });

    let outcome = rx
        .recv()
        .await
        .unwrap_or_else(|| Err(CleanerError::auth("redirect listener stopped before consent")));
    let _ = shutdown_tx.send(());
    outcome
}

async fn handle_redirect(
    State(state): State<Arc<RedirectState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    match check_redirect(&params, &state.expected_state) {
        Ok(None) => (StatusCode::BAD_REQUEST, "Waiting for the authorization redirect."),
        Ok(Some(code)) => {
            let _ = state.tx.send(Ok(code)).await;
            (StatusCode::OK, "Authorization complete. You can close this window.")
        }
        Err(e) => {
            tracing::warn!("Rejected authorization redirect: {}", e);
            let _ = state.tx.send(Err(e)).await;
            (StatusCode::BAD_REQUEST, "Authorization failed. Return to the terminal.")
        }
    }
}

/// Extracts the authorization code from the redirect's query parameters.
/// Requests carrying none of `code`, `state` or `error` are not a consent
/// answer and yield `Ok(None)`.
pub fn check_redirect(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Result<Option<String>> {
    if !["code", "state", "error"].iter().any(|k| params.contains_key(*k)) {
        return Ok(None);
    }

    if let Some(error) = params.get("error") {
        return Err(CleanerError::auth(format!("consent was not granted: {}", error)));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(CleanerError::auth("state mismatch in authorization redirect"));
    }

    params
        .get("code")
        .cloned()
        .map(Some)
        .ok_or_else(|| CleanerError::auth("redirect carried no authorization code"))
}
