use std::time::Duration;

use ureq::{tls::TlsConfig, Agent, Proxy};

use crate::error::DownloadError;

pub const DEFAULT_USER_AGENT: &str = concat!("tapfeed/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
    /// How many times callers may retry a failed or corrupt download.
    ///
    /// The agent itself never retries; the number is carried here so the retry ceiling
    /// follows the transport configuration.
    pub retries: u32,
}

impl Default for ClientConfig {
    /// Creates a default ClientConfig populated with sensible defaults for HTTP requests.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapfeed_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert!(cfg.user_agent.as_deref().unwrap().starts_with("tapfeed/"));
    /// assert!(cfg.proxy.is_none());
    /// assert!(cfg.timeout.is_none());
    /// assert_eq!(cfg.retries, 3);
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.into()),
            proxy: None,
            timeout: None,
            retries: 3,
        }
    }
}

impl ClientConfig {
    /// Sets the proxy from a `scheme://host:port` string.
    pub fn with_proxy(mut self, proxy: Option<&str>) -> Result<Self, DownloadError> {
        self.proxy = proxy
            .map(|proxy| {
                Proxy::new(proxy).map_err(|err| {
                    DownloadError::InvalidProxy {
                        proxy: proxy.to_string(),
                        source: Box::new(err),
                    }
                })
            })
            .transpose()?;
        Ok(self)
    }

    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// HTTP error statuses are returned as responses rather than errors so callers can
    /// tell `304 Not Modified` and `404` apart themselves.
    pub fn build(&self) -> Agent {
        self.build_with_tls(TlsConfig::default())
    }

    /// Builds an `Agent` that does not verify server certificates.
    ///
    /// Only meant for environments known to lack a usable certificate store.
    pub fn build_insecure(&self) -> Agent {
        self.build_with_tls(TlsConfig::builder().disable_verification(true).build())
    }

    fn build_with_tls(&self, tls: TlsConfig) -> Agent {
        let mut config = Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout)
            .http_status_as_error(false)
            .tls_config(tls);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}
