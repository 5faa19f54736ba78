use std::path::{Component, Path};

use tapfeed_utils::path::normalize_absolute;

use crate::error::Result;

/// The repository a cached source file was downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrigin {
    pub org: String,
    pub repo: String,
}

impl SourceOrigin {
    /// `org/repo`, the form taps are written in.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }
}

/// Finds the `<org>/<repo>` a path inside the API source cache belongs to.
///
/// Both paths are made absolute and folded lexically first, so `..` cannot escape
/// `source_root`. Returns `None` for paths outside the cache and for paths too shallow to name
/// a repository.
pub fn source_origin<P, R>(path: P, source_root: R) -> Result<Option<SourceOrigin>>
where
    P: AsRef<Path>,
    R: AsRef<Path>,
{
    let path = normalize_absolute(path)?;
    let source_root = normalize_absolute(source_root)?;

    let Ok(relative) = path.strip_prefix(&source_root) else {
        return Ok(None);
    };

    let mut parts = relative.components().filter_map(|component| {
        match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        }
    });

    Ok(match (parts.next(), parts.next()) {
        (Some(org), Some(repo)) => Some(SourceOrigin { org, repo }),
        _ => None,
    })
}
