//! The entry point tying transport, on-disk cache, memoization and verification together.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use serde_json::{json, Value};
use tapfeed_config::{Config, DEFAULT_API_DOMAIN};
use tapfeed_dl::{utils::join_url, ClientConfig, HttpTransport, Transport};
use tapfeed_utils::fs::{atomic_write, ensure_dir_exists, safe_remove};
use tracing::{debug, error, info, warn};

use crate::{
    cache::CacheStore,
    context::FetchContext,
    error::{ApiError, Result},
    fetcher::{skip_download, DomainFallbackFetcher},
    kind::ApiKind,
    queue::{DownloadQueue, JsonDownload},
    signature::SignatureVerifier,
    source::{source_origin, SourceOrigin},
};

/// Endpoints with this suffix carry a signature envelope instead of plain JSON.
pub const SIGNED_SUFFIX: &str = ".jws.json";

pub fn is_signed(endpoint: &str) -> bool {
    endpoint.ends_with(SIGNED_SUFFIX)
}

/// Access to the package metadata API.
///
/// Documents are memoized per endpoint for the lifetime of the value; for signed endpoints
/// the memoized document is always the verified payload, never the envelope.
pub struct Api<T: Transport = HttpTransport> {
    transport: T,
    context: FetchContext,
    domain: String,
    default_domain: String,
    api_cache_path: PathBuf,
    source_cache_path: PathBuf,
    stale_seconds: u64,
    public_key_path: PathBuf,
    verifier: OnceLock<SignatureVerifier>,
    cache: CacheStore,
}

impl Api<HttpTransport> {
    /// Builds an API client with an HTTP transport configured from `config`.
    pub fn from_config(config: &Config, context: FetchContext) -> Result<Self> {
        let mut client = ClientConfig::default()
            .with_proxy(config.proxy.as_deref())
            .map_err(|err| ApiError::Configuration(err.to_string()))?;
        if let Some(user_agent) = &config.user_agent {
            client.user_agent = Some(user_agent.clone());
        }
        client.timeout = config.get_timeout();
        client.retries = config.get_retries();

        Self::with_transport(config, context, HttpTransport::new(&client))
    }
}

impl<T: Transport> Api<T> {
    pub fn with_transport(config: &Config, context: FetchContext, transport: T) -> Result<Self> {
        Ok(Self {
            transport,
            context,
            domain: config.get_api_domain(),
            default_domain: DEFAULT_API_DOMAIN.to_string(),
            api_cache_path: config.get_api_cache_path()?,
            source_cache_path: config.get_api_source_cache_path()?,
            stale_seconds: config.get_api_auto_update_secs()?,
            public_key_path: config.get_public_key_path()?,
            verifier: OnceLock::new(),
            cache: CacheStore::new(),
        })
    }

    /// Uses `verifier` instead of loading the public key from its configured path.
    pub fn with_verifier(self, verifier: SignatureVerifier) -> Self {
        let _ = self.verifier.set(verifier);
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn api_cache_path(&self) -> &Path {
        &self.api_cache_path
    }

    pub fn context(&self) -> &FetchContext {
        &self.context
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Fetches `endpoint` over the network without touching the on-disk cache.
    ///
    /// Tries the configured domain first and the default domain once if they differ.
    ///
    /// # Errors
    ///
    /// * [`ApiError::NotFound`] if no domain served the endpoint
    /// * [`ApiError::InvalidJson`] if the body is not JSON
    /// * [`ApiError::Integrity`] if a signed endpoint fails verification
    pub fn fetch(&self, endpoint: &str) -> Result<Arc<Value>> {
        if let Some(document) = self.cache.get(endpoint) {
            debug!("{} served from memory", endpoint);
            return Ok(document);
        }

        let mut url = join_url(&self.domain, endpoint);
        let bytes = match self.transport.fetch_bytes(&url) {
            Ok(bytes) => bytes,
            Err(err) if self.domain != self.default_domain => {
                warn!(
                    "Failed to fetch {} ({}), retrying from {}",
                    url, err, self.default_domain
                );
                url = join_url(&self.default_domain, endpoint);
                self.transport.fetch_bytes(&url).map_err(|source| {
                    ApiError::NotFound {
                        url: url.clone(),
                        source,
                    }
                })?
            }
            Err(source) => return Err(ApiError::NotFound { url, source }),
        };

        let document: Value = serde_json::from_slice(&bytes).map_err(|source| {
            ApiError::InvalidJson {
                url: url.clone(),
                source,
            }
        })?;
        let document = if is_signed(endpoint) {
            self.verify(&document, &url, None)?
        } else {
            document
        };

        Ok(self.cache.put(endpoint, document))
    }

    /// Returns the document for `endpoint`, refreshing its cache file when needed.
    ///
    /// `target` defaults to `<api cache>/<endpoint>` and `stale_seconds` to the configured
    /// window. The returned flag is `true` when a download was attempted in this call.
    ///
    /// With a `queue`, a needed download is handed to the queue instead of performed, and an
    /// empty object is returned with `false`. When the cache file can be reused as is, it is
    /// read inline even if a queue was given.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Configuration`] if a first download is needed from an elevated process
    ///   that does not own the installation, or the public key is missing
    /// * [`ApiError::Transport`] if no domain could be reached and nothing is cached
    /// * [`ApiError::CorruptDownload`] if the file stayed invalid JSON past the retry ceiling
    /// * [`ApiError::Integrity`] if a signed endpoint fails verification; the cache file is
    ///   deleted first
    pub fn fetch_json_api_file(
        &self,
        endpoint: &str,
        target: Option<&Path>,
        stale_seconds: Option<u64>,
        queue: Option<&mut dyn DownloadQueue>,
    ) -> Result<(Arc<Value>, bool)> {
        if let Some(document) = self.cache.get(endpoint) {
            debug!("{} served from memory", endpoint);
            return Ok((document, false));
        }

        let target = target
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.api_cache_path.join(endpoint));
        let stale_seconds = stale_seconds.unwrap_or(self.stale_seconds);
        let fetcher = DomainFallbackFetcher::new(
            &self.transport,
            &self.context,
            &self.domain,
            &self.default_domain,
        );

        if let Some(queue) = queue {
            fetcher.check_privileges(endpoint, &target)?;
            if !skip_download(
                &target,
                &self.context,
                stale_seconds,
                std::time::SystemTime::now(),
            ) {
                debug!("Queueing download of {}", endpoint);
                queue.enqueue(JsonDownload {
                    endpoint: endpoint.to_string(),
                    target,
                    stale_seconds,
                });
                return Ok((Arc::new(json!({})), false));
            }
        }

        if let Some(parent) = target.parent() {
            ensure_dir_exists(parent)?;
        }

        let fetched = fetcher.fetch(endpoint, &target, stale_seconds)?;
        let document = if is_signed(endpoint) {
            self.verify(&fetched.document, &fetched.url, Some(&target))?
        } else {
            fetched.document
        };

        Ok((self.cache.put(endpoint, document), fetched.fresh))
    }

    /// Writes `<api cache>/<kind>_names.txt`, the names joined by newlines.
    ///
    /// The file is only rewritten when it is missing or `regenerate` is set. Returns whether
    /// it was written.
    pub fn write_names_file<S: AsRef<str>>(
        &self,
        names: &[S],
        kind: &str,
        regenerate: bool,
    ) -> Result<bool> {
        let path = self.api_cache_path.join(format!("{kind}_names.txt"));
        if path.exists() && !regenerate {
            return Ok(false);
        }

        let contents = names
            .iter()
            .map(|name| name.as_ref())
            .collect::<Vec<&str>>()
            .join("\n");

        ensure_dir_exists(&self.api_cache_path)?;
        atomic_write(&path, contents.as_bytes())?;
        debug!("Wrote {} names to {}", names.len(), path.display());
        Ok(true)
    }

    /// Refreshes the catalogue of `kind` and its names file, returning the names.
    ///
    /// The names file is regenerated whenever the catalogue was downloaded in this call.
    pub fn download_and_cache_names(&self, kind: ApiKind) -> Result<Vec<String>> {
        let (catalogue, fresh) = self.fetch_json_api_file(kind.endpoint(), None, None, None)?;
        let names = kind.names(&catalogue);
        if self.write_names_file(&names, kind.as_str(), fresh)? {
            info!("Cached {} {} names", names.len(), kind);
        }
        Ok(names)
    }

    /// The repository a file inside the API source cache was downloaded from.
    pub fn source_origin<P: AsRef<Path>>(&self, path: P) -> Result<Option<SourceOrigin>> {
        source_origin(path, &self.source_cache_path)
    }

    fn verifier(&self) -> Result<&SignatureVerifier> {
        if let Some(verifier) = self.verifier.get() {
            return Ok(verifier);
        }
        let verifier = SignatureVerifier::from_file(&self.public_key_path)?;
        Ok(self.verifier.get_or_init(|| verifier))
    }

    fn verify(&self, envelope: &Value, url: &str, target: Option<&Path>) -> Result<Value> {
        match self.verifier()?.verify(envelope) {
            Ok(payload) => Ok(payload),
            Err(failure) => {
                if let Some(target) = target {
                    safe_remove(target)?;
                }
                error!("Failed to verify integrity ({}) of {}", failure, url);
                Err(ApiError::Integrity {
                    reason: failure.to_string(),
                    url: url.to_string(),
                })
            }
        }
    }
}
