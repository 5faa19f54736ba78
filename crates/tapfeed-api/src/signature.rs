//! Verification of detached-payload signature envelopes.
//!
//! Signed endpoints (`*.jws.json`) are served as a JSON Web Signature in the
//! general serialization with an unencoded payload:
//!
//! ```json
//! {
//!   "payload": "<raw JSON text>",
//!   "signatures": [
//!     {
//!       "header": { "kid": "homebrew-1" },
//!       "protected": "<base64url of {\"alg\":\"PS512\",\"b64\":false,...}>",
//!       "signature": "<base64url of the RSASSA-PSS signature>"
//!     }
//!   ]
//! }
//! ```
//!
//! The signing input is the still-encoded `protected` string, a `.`, and the
//! payload text exactly as it appears in the envelope.

use std::{fs, path::Path};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use rsa::{
    pkcs1::DecodeRsaPublicKey,
    pkcs8::DecodePublicKey,
    pss::{Signature, VerifyingKey},
    signature::Verifier,
    RsaPublicKey,
};
use serde_json::Value;
use sha2::Sha512;
use thiserror::Error;

use crate::error::{ApiError, ErrorContext, Result};

/// Key id of the only signature that is checked; all others are ignored.
pub const KEY_ID: &str = "homebrew-1";

/// RSASSA-PSS with SHA-512, MGF1 with SHA-512 and a 64 byte salt.
pub const ALGORITHM: &str = "PS512";

/// base64url that accepts both padded and unpadded input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why an envelope was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    #[error("key not found")]
    KeyNotFound,

    #[error("invalid algorithm")]
    InvalidAlgorithm,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("malformed envelope: {0}")]
    Malformed(&'static str),
}

pub struct SignatureVerifier {
    key: VerifyingKey<Sha512>,
}

impl SignatureVerifier {
    pub fn new(key: RsaPublicKey) -> Self {
        // `VerifyingKey::new` uses the digest length as salt length.
        Self {
            key: VerifyingKey::new(key),
        }
    }

    /// Parses a PEM encoded RSA public key, either SubjectPublicKeyInfo or PKCS#1.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|err| err.to_string())
            .or_else(|spki_err| {
                RsaPublicKey::from_pkcs1_pem(pem)
                    .map_err(|_| spki_err)
            })
            .map_err(|err| ApiError::Configuration(format!("Invalid public key: {err}")))?;
        Ok(Self::new(key))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ApiError::Configuration(format!(
                "Public key {} not found; signed API files cannot be verified without it",
                path.display()
            )));
        }
        let pem = fs::read_to_string(path)
            .with_context(|| format!("reading public key {}", path.display()))?;
        Self::from_pem(&pem)
    }

    /// Checks the envelope's [`KEY_ID`] signature and returns the parsed payload.
    ///
    /// Pure: deleting the cache file and warning about interception is up to the caller.
    pub fn verify(&self, envelope: &Value) -> std::result::Result<Value, VerifyFailure> {
        let entry = envelope
            .get("signatures")
            .and_then(Value::as_array)
            .and_then(|signatures| {
                signatures
                    .iter()
                    .find(|sig| sig.pointer("/header/kid").and_then(Value::as_str) == Some(KEY_ID))
            })
            .ok_or(VerifyFailure::KeyNotFound)?;

        let protected = entry
            .get("protected")
            .and_then(Value::as_str)
            .ok_or(VerifyFailure::Malformed("missing protected header"))?;
        let header: Value = BASE64_URL
            .decode(protected)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(VerifyFailure::Malformed("undecodable protected header"))?;

        // An absent `b64` means `true`, which would sign the encoded payload instead.
        if header.get("alg").and_then(Value::as_str) != Some(ALGORITHM)
            || header.get("b64") != Some(&Value::Bool(false))
        {
            return Err(VerifyFailure::InvalidAlgorithm);
        }

        let payload = envelope
            .get("payload")
            .and_then(Value::as_str)
            .ok_or(VerifyFailure::Malformed("missing payload"))?;
        let signature = entry
            .get("signature")
            .and_then(Value::as_str)
            .and_then(|sig| BASE64_URL.decode(sig).ok())
            .ok_or(VerifyFailure::SignatureMismatch)?;
        let signature =
            Signature::try_from(signature.as_slice()).map_err(|_| VerifyFailure::SignatureMismatch)?;

        let signing_input = format!("{protected}.{payload}");
        self.key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| VerifyFailure::SignatureMismatch)?;

        serde_json::from_str(payload).map_err(|_| VerifyFailure::Malformed("payload is not JSON"))
    }
}
