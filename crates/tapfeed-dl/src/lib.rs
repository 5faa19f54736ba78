//! HTTP transport for the tapfeed metadata pipeline.
//!
//! The pipeline only needs two things from the network: a conditional GET that
//! lands the body in a cache file, and a plain GET that returns the body as
//! bytes. [`transport::Transport`] names that contract and
//! [`http::HttpTransport`] implements it on top of `ureq`.

pub mod error;
pub mod http;
pub mod http_client;
pub mod transport;
pub mod utils;

pub use error::DownloadError;
pub use http::HttpTransport;
pub use http_client::ClientConfig;
pub use transport::{DownloadRequest, DownloadStatus, Transport};
