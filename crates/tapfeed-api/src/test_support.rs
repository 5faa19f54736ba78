//! Shared fixtures for unit tests: a signing key, envelope builders and an in-memory transport.

use std::{
    collections::HashMap,
    fs,
    sync::{Mutex, OnceLock},
    time::SystemTime,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::{
    pss::BlindedSigningKey,
    signature::{RandomizedSigner, SignatureEncoding},
    RsaPrivateKey, RsaPublicKey,
};
use serde_json::{json, Value};
use sha2::Sha512;
use tapfeed_dl::{DownloadError, DownloadRequest, DownloadStatus, Transport};

use crate::signature::SignatureVerifier;

pub const PROTECTED_HEADER: &str = r#"{"alg":"PS512","b64":false,"crit":["b64"]}"#;

/// One key pair per test binary; RSA key generation is slow.
pub fn test_keys() -> &'static (RsaPrivateKey, RsaPublicKey) {
    static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate rsa key");
        let public_key = RsaPublicKey::from(&private_key);
        (private_key, public_key)
    })
}

pub fn verifier() -> SignatureVerifier {
    SignatureVerifier::new(test_keys().1.clone())
}

pub fn sign_envelope(payload: &str) -> Value {
    sign_envelope_with_header(payload, PROTECTED_HEADER)
}

pub fn sign_envelope_with_header(payload: &str, header: &str) -> Value {
    let protected = URL_SAFE_NO_PAD.encode(header);
    let signing_key = BlindedSigningKey::<Sha512>::new(test_keys().0.clone());
    let signature = signing_key.sign_with_rng(
        &mut rand::thread_rng(),
        format!("{protected}.{payload}").as_bytes(),
    );

    json!({
        "payload": payload,
        "signatures": [{
            "header": { "kid": "homebrew-1" },
            "protected": protected,
            "signature": URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        }]
    })
}

/// What the fake server answers for one URL.
#[derive(Clone, Debug)]
pub enum Reply {
    Body(String),
    NotModified,
    Fail,
}

/// A request the fake transport received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    pub url: String,
    pub modified_since: Option<SystemTime>,
    pub insecure: bool,
}

/// In-memory [`Transport`] serving queued replies per URL.
///
/// Each URL has a queue of replies; the last reply repeats once the queue is down to one.
/// Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<String, Vec<Reply>>>,
    requests: Mutex<Vec<Recorded>>,
    pub retries: u32,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            retries: 3,
            ..Self::default()
        }
    }

    pub fn reply(self, url: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(reply);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue[0].clone(),
            None => Reply::Fail,
        }
    }
}

fn unavailable(url: &str) -> DownloadError {
    DownloadError::HttpError {
        status: 503,
        url: url.to_string(),
    }
}

impl Transport for FakeTransport {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadStatus, DownloadError> {
        self.requests.lock().unwrap().push(Recorded {
            url: request.url.to_string(),
            modified_since: request.modified_since,
            insecure: request.insecure,
        });

        match self.next_reply(request.url) {
            Reply::Body(body) => {
                if let Some(parent) = request.target.parent() {
                    fs::create_dir_all(parent).unwrap();
                }
                fs::write(request.target, body).unwrap();
                Ok(DownloadStatus::Downloaded)
            }
            Reply::NotModified => Ok(DownloadStatus::NotModified),
            Reply::Fail => Err(unavailable(request.url)),
        }
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.requests.lock().unwrap().push(Recorded {
            url: url.to_string(),
            modified_since: None,
            insecure: false,
        });

        match self.next_reply(url) {
            Reply::Body(body) => Ok(body.into_bytes()),
            Reply::NotModified | Reply::Fail => Err(unavailable(url)),
        }
    }

    fn retries(&self) -> u32 {
        self.retries
    }
}
