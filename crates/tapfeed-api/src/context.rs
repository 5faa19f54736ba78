use tapfeed_config::Config;
use tapfeed_utils::system::running_as_root_but_not_owned_by_root;

use crate::error::Result;

/// Facts about the current invocation that decide whether cached files may be reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchContext {
    /// The caller is an automatic background update, which honours the staleness window.
    ///
    /// Any other caller reuses a non-empty cache file regardless of its age.
    pub auto_update_command: bool,

    /// Auto-updates were switched off by the administrator and not forced back on.
    pub auto_update_disabled: bool,

    /// The process runs as root while the installation belongs to another user.
    pub elevated_without_ownership: bool,

    /// Certificate verification cannot work in this environment.
    pub insecure_download: bool,
}

impl FetchContext {
    /// Derives the context from configuration and the running process.
    pub fn detect(config: &Config, auto_update_command: bool) -> Result<Self> {
        Ok(Self {
            auto_update_command,
            auto_update_disabled: config.auto_update_disabled(),
            elevated_without_ownership: running_as_root_but_not_owned_by_root(
                config.get_prefix_path()?,
            ),
            insecure_download: config.insecure_download(),
        })
    }
}
