//! Package metadata API access for tapfeed.
//!
//! [`Api`] fetches JSON documents from a configurable API domain, keeps one
//! cache file per endpoint, refreshes those files once they go stale, falls
//! back to the default domain when a mirror is unreachable, and verifies the
//! signed catalogue endpoints before handing their payload out.
//!
//! ```no_run
//! use tapfeed_api::{Api, ApiKind, FetchContext};
//! use tapfeed_config::Config;
//!
//! fn names() -> tapfeed_api::Result<Vec<String>> {
//!     let config = Config::new()?;
//!     let context = FetchContext::detect(&config, false)?;
//!     let api = Api::from_config(&config, context)?;
//!     api.download_and_cache_names(ApiKind::Formula)
//! }
//! ```

pub mod api;
pub mod cache;
pub mod context;
pub mod error;
pub mod fetcher;
pub mod kind;
pub mod queue;
pub mod signature;
pub mod source;
pub mod variations;

#[cfg(test)]
mod test_support;

pub use api::{is_signed, Api};
pub use cache::CacheStore;
pub use context::FetchContext;
pub use error::{ApiError, Result};
pub use fetcher::{skip_download, DomainFallbackFetcher, Fetched};
pub use kind::ApiKind;
pub use queue::{BatchQueue, DownloadQueue, JsonDownload};
pub use signature::{SignatureVerifier, VerifyFailure};
pub use source::{source_origin, SourceOrigin};
pub use variations::merge_variations;
