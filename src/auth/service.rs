//! Calls against the authentication host: authenticate, validate, refresh

use super::certificate::CertificateSigner;
use super::credential::Credential;
use super::method::AuthMethod;
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, Transport};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::sync::Arc;

/// Message the validate endpoint returns for a good token
const TOKEN_VALIDATED: &str = "Token validated";

/// Prefix shared by every rejected-login status (`FAILURE_BAD_CREDENTIAL`, ...)
const FAILURE_PREFIX: &str = "FAILURE";

/// Client for the `/token/*` endpoints
#[derive(Clone)]
pub struct AuthService {
    transport: Arc<dyn Transport>,
    auth_url: String,
}

impl AuthService {
    /// Create a client for the given authentication host
    pub fn new(transport: Arc<dyn Transport>, auth_url: impl Into<String>) -> Self {
        Self {
            transport,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/token/{}", self.auth_url, name)
    }

    /// Authenticate and verify the issued token
    ///
    /// Key material is loaded before anything is sent, so an encrypted key
    /// without a password never reaches the network.
    pub async fn authenticate(&self, method: &AuthMethod) -> Result<Credential> {
        let url = self.endpoint("authenticate");

        let request = match method {
            AuthMethod::Basic { username, password } => {
                tracing::info!("authenticating via basic");
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                HttpRequest::post(&url).header("Authorization", format!("Basic {encoded}"))
            }
            AuthMethod::Certificate {
                certificate,
                private_key,
                password,
            } => {
                let signer = CertificateSigner::load(certificate, private_key, password.as_deref())?;
                tracing::info!("authenticating via certificate");
                HttpRequest::post(&url)
                    .header("Authorization", signer.authorization())
                    .json(&signer.signed_body())?
            }
        };

        let response = self.transport.send(request).await?;
        let body: Value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);

        let status = match body.get("status") {
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(Error::AuthenticationFailed(format!(
                    "unexpected status: {other}"
                )));
            }
            None => {
                tracing::error!(http_status = response.status, "authentication response has no status");
                return Err(Error::AuthenticationFailed(
                    "response does not appear well formed".to_string(),
                ));
            }
        };

        if status.starts_with(FAILURE_PREFIX) {
            let message = body
                .get("statusMessage")
                .and_then(Value::as_str)
                .unwrap_or(status);
            tracing::error!(status, message, "authentication rejected");
            return Err(Error::AuthenticationFailed(format!("error logging in: {message}")));
        }

        let credential = Credential::from_token_info(&body, &url)?;
        self.validate(&credential).await?;

        tracing::info!(expiry = %credential.expiry(), "authenticated");
        Ok(credential)
    }

    /// Check that the service accepts a token
    pub async fn validate(&self, credential: &Credential) -> Result<()> {
        let url = self.endpoint("validate");
        tracing::debug!("verifying auth token");

        let response = self
            .transport
            .send(HttpRequest::get(&url).header("Authorization", credential.token()))
            .await?;
        let body: Value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);

        match body.get("statusMessage").and_then(Value::as_str) {
            Some(TOKEN_VALIDATED) => Ok(()),
            Some(other) => Err(Error::AuthenticationFailed(format!(
                "token validation failed: {other}"
            ))),
            None => Err(Error::AuthenticationFailed(
                "unable to find authentication status".to_string(),
            )),
        }
    }

    /// Exchange a live token for a new one
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let url = self.endpoint("refresh");
        let response = self
            .transport
            .send(HttpRequest::post(&url).header("Authorization", credential.token()))
            .await?;

        if !response.is_success() {
            return Err(Error::Http {
                url,
                status: response.status,
            });
        }

        let body = response.json(&url)?;
        Credential::from_token_info(&body, &url).map_err(|_| {
            Error::AuthenticationFailed("refresh response missing token or expiry".to_string())
        })
    }
}
