//! Certificate authentication material
//!
//! Loads an RSA private key (PEM or DER; PKCS#8, encrypted PKCS#8 or PKCS#1)
//! and a public certificate (PEM or DER), and produces the `CACertificate`
//! header plus a signed-nonce request body for `/token/authenticate`.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use regex::bytes::Regex;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::Sha512;
use std::sync::LazyLock;

/// Length of the random nonce signed for each authentication request
pub const NONCE_LEN: usize = 150;

/// Without the pattern no input is recognised as PEM, so PEM material is
/// rejected as an invalid key rather than misread.
static PEM_BEGIN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*-----BEGIN ([A-Z0-9 ]+)-----")
        .map_err(|e| tracing::error!(error = %e, "invalid PEM header pattern"))
        .ok()
});

/// Encoding of a key or certificate blob
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    /// PEM, with the label found in the BEGIN line
    Pem,
    /// Raw DER
    Der,
}

fn pem_label(data: &[u8]) -> Option<String> {
    let re = PEM_BEGIN.as_ref()?;
    let captures = re.captures(data)?;
    let label = captures.get(1)?;
    Some(String::from_utf8_lossy(label.as_bytes()).into_owned())
}

/// DER SEQUENCE with a two-byte length, which covers any RSA key of practical size
fn detect_key_encoding(data: &[u8]) -> Option<Encoding> {
    if pem_label(data).is_some() {
        Some(Encoding::Pem)
    } else if data.starts_with(&[0x30, 0x82]) {
        Some(Encoding::Der)
    } else {
        None
    }
}

fn detect_certificate_encoding(data: &[u8]) -> Option<Encoding> {
    if pem_label(data).is_some() {
        Some(Encoding::Pem)
    } else if data.starts_with(&[0x30, 0x82]) || data.starts_with(&[0x30, 0x84]) {
        Some(Encoding::Der)
    } else {
        None
    }
}

/// Whether the key is password protected
fn is_encrypted(data: &[u8], encoding: Encoding) -> bool {
    match encoding {
        Encoding::Pem => {
            let legacy = String::from_utf8_lossy(data).contains("Proc-Type: 4,ENCRYPTED");
            legacy || pem_label(data).is_some_and(|l| l == "ENCRYPTED PRIVATE KEY")
        }
        Encoding::Der => pkcs8::EncryptedPrivateKeyInfo::try_from(data).is_ok(),
    }
}

fn invalid_key(e: impl std::fmt::Display) -> Error {
    Error::InvalidKey(format!("unable to load private key: {e}"))
}

fn load_private_key(data: &[u8], password: Option<&str>) -> Result<RsaPrivateKey> {
    let encoding = detect_key_encoding(data).ok_or_else(|| {
        Error::InvalidKey("unable to determine the format of the private key".to_string())
    })?;

    let password = password.filter(|p| !p.is_empty());

    if is_encrypted(data, encoding) {
        let password = password.ok_or(Error::EncryptedKeyWithoutPassword)?;
        return match encoding {
            Encoding::Pem => {
                let pem = std::str::from_utf8(data).map_err(invalid_key)?;
                RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password).map_err(invalid_key)
            }
            Encoding::Der => {
                RsaPrivateKey::from_pkcs8_encrypted_der(data, password).map_err(invalid_key)
            }
        };
    }

    match encoding {
        Encoding::Pem => {
            let pem = std::str::from_utf8(data).map_err(invalid_key)?;
            match pem_label(data).as_deref() {
                Some("RSA PRIVATE KEY") => {
                    RsaPrivateKey::from_pkcs1_pem(pem).map_err(invalid_key)
                }
                _ => RsaPrivateKey::from_pkcs8_pem(pem).map_err(invalid_key),
            }
        }
        Encoding::Der => RsaPrivateKey::from_pkcs8_der(data)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(data))
            .map_err(invalid_key),
    }
}

/// Wrap a DER certificate in PEM armour
fn der_to_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    // base64 output is ASCII, so byte chunks are valid UTF-8
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Loaded certificate and signing key
pub struct CertificateSigner {
    authorization: String,
    signing_key: SigningKey<Sha512>,
}

impl std::fmt::Debug for CertificateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateSigner")
            .field("authorization", &"CACertificate <redacted>")
            .finish_non_exhaustive()
    }
}

impl CertificateSigner {
    /// Load the certificate and private key
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidKey`] when either blob has no recognisable encoding or
    ///   the key cannot be decoded
    /// - [`Error::EncryptedKeyWithoutPassword`] when the key is encrypted and no
    ///   (or an empty) password is given
    pub fn load(certificate: &[u8], private_key: &[u8], password: Option<&str>) -> Result<Self> {
        let cert_encoding = detect_certificate_encoding(certificate).ok_or_else(|| {
            Error::InvalidKey("unable to determine the format of the certificate".to_string())
        })?;

        let key = load_private_key(private_key, password)?;

        let pem = match cert_encoding {
            Encoding::Pem => String::from_utf8_lossy(certificate).into_owned(),
            Encoding::Der => {
                tracing::debug!("converting DER certificate to PEM");
                der_to_pem(certificate)
            }
        };

        Ok(Self {
            authorization: format!("CACertificate {}", STANDARD.encode(pem.as_bytes())),
            signing_key: SigningKey::<Sha512>::new(key),
        })
    }

    /// Value for the `Authorization` header of the authenticate call
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// Request body with a fresh random nonce and its signature
    pub fn signed_body(&self) -> serde_json::Value {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.sign_nonce(&nonce)
    }

    fn sign_nonce(&self, nonce: &[u8]) -> serde_json::Value {
        let signature = self.signing_key.sign(nonce);
        serde_json::json!({
            "encodedData": STANDARD.encode(nonce),
            "encodedSignedData": STANDARD.encode(signature.to_vec()),
        })
    }
}
