use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(tapfeed_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to fetch {url}: {source}")]
    #[diagnostic(
        code(tapfeed_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(tapfeed_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("Invalid proxy `{proxy}`: {source}")]
    #[diagnostic(code(tapfeed_dl::invalid_proxy))]
    InvalidProxy {
        proxy: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error(transparent)]
    #[diagnostic(code(tapfeed_dl::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(tapfeed_dl::fs))]
    FileSystem(#[from] tapfeed_utils::error::FileSystemError),
}

impl DownloadError {
    pub fn network(url: impl Into<String>, source: ureq::Error) -> Self {
        Self::Network {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// The URL the failed request was addressed to, when known.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::InvalidUrl { url, .. } | Self::Network { url, .. } | Self::HttpError { url, .. } => {
                Some(url)
            }
            _ => None,
        }
    }
}
