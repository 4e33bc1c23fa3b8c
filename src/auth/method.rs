//! Authentication methods and their parameter validation

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// How to obtain a credential
#[derive(Clone)]
pub enum AuthMethod {
    /// Username/password sent as HTTP Basic
    Basic {
        /// Account identity (usually an email address)
        username: String,
        /// Account password
        password: String,
    },
    /// CA-issued certificate plus RSA private key
    Certificate {
        /// Certificate in PEM or DER form
        certificate: Vec<u8>,
        /// Private key in PEM or DER form
        private_key: Vec<u8>,
        /// Password for an encrypted private key
        password: Option<String>,
    },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthMethod::Certificate { password, .. } => f
                .debug_struct("Certificate")
                .field("certificate", &"<bytes>")
                .field("private_key", &"<redacted>")
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

impl AuthMethod {
    /// Method name as used in [`AuthMethod::from_params`]
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Basic { .. } => "basic",
            AuthMethod::Certificate { .. } => "certificate",
        }
    }

    /// Build a method from a name and a string parameter map
    ///
    /// - `basic` requires `username` and `password`
    /// - `certificate` requires `certificate` and `private_key` (PEM text) and
    ///   accepts an optional `private_key_password`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAuthParameters`] listing every missing key, or
    /// [`Error::Config`] for an unknown method name.
    pub fn from_params(method: &str, params: &HashMap<String, String>) -> Result<Self> {
        let required: &[&str] = match method {
            "basic" => &["username", "password"],
            "certificate" => &["certificate", "private_key"],
            other => {
                return Err(Error::config(
                    format!("unsupported authentication method '{other}'"),
                    "method",
                ));
            }
        };

        let missing: Vec<String> = required
            .iter()
            .filter(|key| params.get(**key).is_none_or(|v| v.is_empty()))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidAuthParameters {
                method: method.to_string(),
                missing,
            });
        }

        // Presence was checked above
        let get = |key: &str| params.get(key).cloned().unwrap_or_default();

        Ok(match method {
            "basic" => AuthMethod::Basic {
                username: get("username"),
                password: get("password"),
            },
            _ => AuthMethod::Certificate {
                certificate: get("certificate").into_bytes(),
                private_key: get("private_key").into_bytes(),
                password: params.get("private_key_password").cloned(),
            },
        })
    }

    /// Read certificate and key files from disk
    pub async fn certificate_from_files(
        certificate: impl AsRef<Path>,
        private_key: impl AsRef<Path>,
        password: Option<String>,
    ) -> Result<Self> {
        let certificate = tokio::fs::read(certificate.as_ref()).await?;
        let private_key = tokio::fs::read(private_key.as_ref()).await?;
        Ok(AuthMethod::Certificate {
            certificate,
            private_key,
            password,
        })
    }
}
