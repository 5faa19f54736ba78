use std::{path::Path, time::SystemTime};

use crate::error::DownloadError;

/// A single conditional download of `url` into `target`.
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub target: &'a Path,
    /// Only fetch the body if the remote copy changed after this instant.
    pub modified_since: Option<SystemTime>,
    /// Skip certificate verification for this request.
    pub insecure: bool,
}

/// Outcome of a successful [`Transport::download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// A new body replaced the target.
    Downloaded,
    /// The server reported no change since `modified_since`; the target was left as is.
    NotModified,
}

/// The network capabilities the metadata pipeline consumes.
pub trait Transport {
    /// Performs a conditional GET, atomically replacing `request.target` with the body.
    ///
    /// On failure the target is left as it was before the call.
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadStatus, DownloadError>;

    /// Performs a plain GET and returns the body when the status is a success.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError>;

    /// The configured retry count of this transport.
    fn retries(&self) -> u32;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadStatus, DownloadError> {
        (**self).download(request)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        (**self).fetch_bytes(url)
    }

    fn retries(&self) -> u32 {
        (**self).retries()
    }
}
