//! Credential acquisition, verification and background refresh
//!
//! [`AuthorizationManager::acquire`] authenticates with either basic or
//! certificate credentials, validates the issued token, and starts exactly one
//! refresh task for the resulting [`CredentialHandle`].

mod certificate;
mod credential;
mod manager;
mod method;
mod service;

pub use certificate::{CertificateSigner, NONCE_LEN};
pub use credential::{Credential, CredentialHandle, TOKEN_SCHEME};
pub use manager::AuthorizationManager;
pub use method::AuthMethod;
pub use service::AuthService;
