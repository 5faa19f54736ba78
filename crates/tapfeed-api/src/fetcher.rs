//! Cache-aware downloading of API files with domain fallback and corruption recovery.
//!
//! [`DomainFallbackFetcher::fetch`] runs the whole refresh sequence for one
//! endpoint:
//!
//! 1. refuse first-time downloads from a root process that does not own the installation
//! 2. decide whether the cached file can be reused as is
//! 3. otherwise download it conditionally from the configured domain
//! 4. on a transport failure, retry once from the default domain, or reuse the cached copy
//! 5. touch the file so the next run measures staleness from now
//! 6. parse it, and on invalid JSON delete it and start over, up to the retry ceiling

use std::{
    fs,
    io,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde_json::Value;
use tapfeed_dl::{utils::join_url, DownloadError, DownloadRequest, DownloadStatus, Transport};
use tapfeed_utils::fs::{has_content, modified_time, safe_remove, touch};
use tracing::{debug, info, warn};

use crate::{
    context::FetchContext,
    error::{ApiError, Result},
};

/// A parsed API file and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub document: Value,
    /// `true` when a download was attempted in this call rather than reusing the cache.
    pub fresh: bool,
    /// The URL the file was last requested from; the default domain's after a fallback.
    pub url: String,
}

/// Decides whether the cached `target` can be used without contacting the server.
///
/// A missing or empty file always needs a download. Otherwise the file is reused unless the
/// caller is an auto-update that is allowed to run and the file is older than `stale_seconds`.
/// A file whose modification time is exactly `now - stale_seconds` counts as stale.
pub fn skip_download(
    target: &Path,
    context: &FetchContext,
    stale_seconds: u64,
    now: SystemTime,
) -> bool {
    if !has_content(target) {
        return false;
    }
    if context.elevated_without_ownership {
        return true;
    }

    !context.auto_update_command
        || context.auto_update_disabled
        || is_fresh(target, stale_seconds, now)
}

fn is_fresh(target: &Path, stale_seconds: u64, now: SystemTime) -> bool {
    let Some(mtime) = modified_time(target) else {
        return false;
    };
    match now.checked_sub(Duration::from_secs(stale_seconds)) {
        Some(threshold) => threshold < mtime,
        None => true,
    }
}

pub struct DomainFallbackFetcher<'a, T: Transport> {
    transport: &'a T,
    context: &'a FetchContext,
    domain: &'a str,
    default_domain: &'a str,
}

impl<'a, T: Transport> DomainFallbackFetcher<'a, T> {
    pub fn new(
        transport: &'a T,
        context: &'a FetchContext,
        domain: &'a str,
        default_domain: &'a str,
    ) -> Self {
        Self {
            transport,
            context,
            domain,
            default_domain,
        }
    }

    /// Fails when this process may not create `target` because it runs with privileges that
    /// do not own the installation.
    pub fn check_privileges(&self, endpoint: &str, target: &Path) -> Result<()> {
        if self.context.elevated_without_ownership && !has_content(target) {
            return Err(ApiError::Configuration(format!(
                "Need to download {} but cannot as root! Run the update without `sudo` first, then try again.",
                join_url(self.domain, endpoint)
            )));
        }
        Ok(())
    }

    pub fn fetch(&self, endpoint: &str, target: &Path, stale_seconds: u64) -> Result<Fetched> {
        self.check_privileges(endpoint, target)?;

        let default_url = join_url(self.default_domain, endpoint);
        let mut url = join_url(self.domain, endpoint);
        let max_retries = self.transport.retries();
        let mut corrupt_retries = 0;
        let mut skip = skip_download(target, self.context, stale_seconds, SystemTime::now());

        loop {
            if skip {
                debug!("Using cached {}", target.display());
            } else {
                url = self.download(url, &default_url, target, corrupt_retries)?;

                let mtime = if self.context.insecure_download {
                    // Downloads without certificate checks must be re-checked next run.
                    UNIX_EPOCH
                } else {
                    SystemTime::now()
                };
                touch(target, mtime)?;
            }

            let content = match fs::read(target) {
                Ok(content) => content,
                Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
                Err(err) => {
                    return Err(ApiError::IoError {
                        action: format!("reading {}", target.display()),
                        source: err,
                    });
                }
            };

            match serde_json::from_slice(&content) {
                Ok(document) => {
                    return Ok(Fetched {
                        document,
                        fresh: !skip,
                        url,
                    });
                }
                Err(err) => {
                    warn!("{} is corrupt: {}", target.display(), err);
                    safe_remove(target)?;
                    corrupt_retries += 1;
                    skip = false;

                    if corrupt_retries > max_retries {
                        return Err(ApiError::CorruptDownload { url });
                    }
                }
            }
        }
    }

    /// Downloads `url` into `target`, falling back to the default domain at most once.
    ///
    /// Returns the URL that was used last. Failures that leave a usable cached copy behind
    /// degrade to a warning.
    fn download(
        &self,
        mut url: String,
        default_url: &str,
        target: &Path,
        corrupt_retries: u32,
    ) -> Result<String> {
        if self.context.insecure_download {
            warn!(
                "Downloading {} without verifying certificates; no usable certificate store is available",
                url
            );
        }

        loop {
            let err = match self.attempt(&url, target) {
                Ok(status) => {
                    debug!("{}: {:?}", url, status);
                    return Ok(url);
                }
                Err(err) => err,
            };

            if url == default_url {
                if !has_content(target) {
                    return Err(ApiError::Transport { url, source: err });
                }
            } else if corrupt_retries == 0 || !has_content(target) {
                warn!(
                    "Failed to download {} ({}), retrying from {}",
                    url, err, self.default_domain
                );
                url = default_url.to_string();
                if target.exists() && !has_content(target) {
                    safe_remove(target)?;
                }
                continue;
            }

            warn!(
                "{}: update failed, falling back to cached version.",
                target
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default()
            );
            return Ok(url);
        }
    }

    fn attempt(
        &self,
        url: &str,
        target: &Path,
    ) -> std::result::Result<DownloadStatus, DownloadError> {
        let modified_since = if has_content(target) {
            modified_time(target)
        } else {
            None
        };

        info!("Downloading {}", url);
        self.transport.download(&DownloadRequest {
            url,
            target,
            modified_since,
            insecure: self.context.insecure_download,
        })
    }
}
