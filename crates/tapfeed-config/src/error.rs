use miette::Diagnostic;
use tapfeed_utils::error::{FileSystemError, PathError, UtilsError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(tapfeed_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(tapfeed_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Invalid API domain `{domain}`: {source}")]
    #[diagnostic(
        code(tapfeed_config::invalid_domain),
        help("The API domain must be an absolute URL such as https://formulae.brew.sh/api")
    )]
    InvalidDomain {
        domain: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid value `{value}` for `{key}`")]
    #[diagnostic(
        code(tapfeed_config::invalid_value),
        help("Durations accept seconds (`450`) or units (`7m30s`, `1h`)")
    )]
    InvalidValue { key: &'static str, value: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(tapfeed_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(tapfeed_config::utils))]
    Utils(#[from] UtilsError),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
