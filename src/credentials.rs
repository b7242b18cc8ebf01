//! Local token file and application-credentials file

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{GmailError, Result};

/// Type tag written to the token file
pub const AUTHORIZED_USER: &str = "authorized_user";

/// Saved user credentials, the token file schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Application credentials as downloaded from Google Cloud Console
#[derive(Debug, Deserialize)]
struct ApplicationCredentials {
    installed: Option<ClientKey>,
    web: Option<ClientKey>,
}

#[derive(Debug, Deserialize)]
struct ClientKey {
    client_id: String,
    client_secret: String,
}

/// Read the token file
///
/// A missing or unparsable file is reported as `None`, never as an error.
pub async fn load_saved(token_path: &Path) -> Option<Credentials> {
    let content = match tokio::fs::read_to_string(token_path).await {
        Ok(content) => content,
        Err(e) => {
            debug!("No saved credentials at {:?}: {}", token_path, e);
            return None;
        }
    };

    match serde_json::from_str::<Credentials>(&content) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            debug!("Ignoring unreadable token file {:?}: {}", token_path, e);
            None
        }
    }
}

/// Merge a fresh refresh token with the application client id/secret and
/// write the normalized record to the token file
pub async fn persist(
    refresh_token: &str,
    credentials_path: &Path,
    token_path: &Path,
) -> Result<Credentials> {
    let content = tokio::fs::read_to_string(credentials_path)
        .await
        .map_err(|e| {
            GmailError::ConfigError(format!(
                "Failed to read application credentials {:?}: {}",
                credentials_path, e
            ))
        })?;
    let keys: ApplicationCredentials = serde_json::from_str(&content)?;
    let key = keys.installed.or(keys.web).ok_or_else(|| {
        GmailError::ConfigError(format!(
            "{:?} has neither an \"installed\" nor a \"web\" section",
            credentials_path
        ))
    })?;

    let credentials = Credentials {
        kind: AUTHORIZED_USER.to_string(),
        client_id: key.client_id,
        client_secret: key.client_secret,
        refresh_token: refresh_token.to_string(),
    };

    if let Some(parent) = token_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(token_path, serde_json::to_string(&credentials)?).await?;
    secure_token_file(token_path).await?;

    info!("Saved credentials to {:?}", token_path);
    Ok(credentials)
}

/// Restrict the token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    // ACLs are left to the profile directory defaults
    Ok(())
}
