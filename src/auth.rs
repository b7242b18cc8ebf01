//! OAuth2 authorization and Gmail API hub construction

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use yup_oauth2::authorized_user::AuthorizedUserSecret;
use yup_oauth2::storage::{TokenInfo, TokenStorage};

use crate::credentials::{self, Credentials};
use crate::error::{GmailError, Result};

pub const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const GMAIL_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const GMAIL_COMPOSE: &str = "https://www.googleapis.com/auth/gmail.compose";
pub const GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";
pub const GMAIL_INSERT: &str = "https://www.googleapis.com/auth/gmail.insert";

/// Scopes requested by the consent flow
pub const REQUIRED_SCOPES: &[&str] = &[
    GMAIL_READONLY,
    GMAIL_MODIFY,
    GMAIL_COMPOSE,
    GMAIL_SEND,
    GMAIL_INSERT,
];

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Authenticator produced by either the saved-credentials or the consent path
pub type MailAuthenticator = yup_oauth2::authenticator::Authenticator<HttpsConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Where the active credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Token file reused, no network call made
    Saved,
    /// Interactive consent flow completed in this process
    Consent,
}

pub struct Authorization {
    pub authenticator: MailAuthenticator,
    pub source: CredentialSource,
}

/// Token storage that keeps the consent flow's token in memory so the
/// refresh token can be written to the token file afterwards
#[derive(Clone, Default)]
pub struct CapturedToken {
    token: Arc<Mutex<Option<TokenInfo>>>,
}

impl CapturedToken {
    pub fn refresh_token(&self) -> Option<String> {
        self.token
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(|token| token.refresh_token.clone()))
    }
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("token storage lock poisoned"))?;
        *slot = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.token.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Convert the token file record into the secret yup-oauth2 expects
///
/// Both share the `{type, client_id, client_secret, refresh_token}` layout.
pub fn authorized_user_secret(credentials: &Credentials) -> Result<AuthorizedUserSecret> {
    Ok(serde_json::from_value(serde_json::to_value(credentials)?)?)
}

/// Obtain an authenticator, reusing the token file when possible
///
/// Without usable saved credentials this runs the installed-app consent
/// flow (browser redirect) and persists the resulting refresh token.
pub async fn authorize(credentials_path: &Path, token_path: &Path) -> Result<Authorization> {
    if let Some(saved) = credentials::load_saved(token_path).await {
        info!("Found existing credentials in {:?}", token_path);
        let authenticator =
            yup_oauth2::AuthorizedUserAuthenticator::builder(authorized_user_secret(&saved)?)
                .build()
                .await
                .map_err(|e| {
                    GmailError::AuthError(format!("Failed to build authenticator: {}", e))
                })?;
        return Ok(Authorization {
            authenticator,
            source: CredentialSource::Saved,
        });
    }

    warn!("Missing credentials, starting consent flow");
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| GmailError::ConfigError(format!("Failed to read credentials: {}", e)))?;

    let captured = CapturedToken::default();
    let authenticator = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .with_storage(Box::new(captured.clone()))
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Runs the consent flow now instead of on the first API call
    authenticator
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    match captured.refresh_token() {
        Some(refresh_token) => {
            credentials::persist(&refresh_token, credentials_path, token_path).await?;
        }
        None => warn!("Consent flow returned no refresh token; credentials not saved"),
    }

    Ok(Authorization {
        authenticator,
        source: CredentialSource::Consent,
    })
}

/// Build the Gmail API hub on top of an authenticator
pub fn build_hub(authenticator: MailAuthenticator) -> Result<GmailHub> {
    // HTTP/1 works better with google-gmail1 than the HTTP/2 default
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| GmailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, authenticator))
}
