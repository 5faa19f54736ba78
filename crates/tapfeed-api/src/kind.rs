use std::fmt;

use serde_json::Value;

/// The two package catalogues served by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    Formula,
    Cask,
}

impl ApiKind {
    pub const ALL: [ApiKind; 2] = [ApiKind::Formula, ApiKind::Cask];

    /// The signed endpoint listing every package of this kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            ApiKind::Formula => "formula.jws.json",
            ApiKind::Cask => "cask.jws.json",
        }
    }

    /// The field holding a package's name in the catalogue.
    pub fn name_key(self) -> &'static str {
        match self {
            ApiKind::Formula => "name",
            ApiKind::Cask => "token",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiKind::Formula => "formula",
            ApiKind::Cask => "cask",
        }
    }

    /// Collects package names from a catalogue document, skipping entries without one.
    pub fn names(self, catalogue: &Value) -> Vec<String> {
        catalogue
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get(self.name_key()).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
