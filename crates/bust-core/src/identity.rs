//! Module identity parsed from a resource locator.

use serde::{Deserialize, Serialize};

/// Name and version of a module, derived from the final path segment of its
/// locator.
///
/// The segment is split on `.`: the first piece is the name, the second is
/// the version and anything after that is kept as the extension. For
/// `/x/missing.v2.js` that gives `missing` / `v2` / `js`. A segment without
/// a dot has an empty version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleIdentity {
    /// Module name, used as the registry key.
    pub name: String,
    /// Version suffix (empty when the segment has no dot).
    pub version: String,
    /// Remaining dotted suffix after the version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extension: String,
}

impl ModuleIdentity {
    /// Parse a locator. Never fails; an empty locator yields an empty name.
    pub fn parse(locator: &str) -> Self {
        let path = locator
            .find(['?', '#'])
            .map_or(locator, |end| &locator[..end]);
        let segment = path.rsplit('/').next().unwrap_or_default();

        let mut parts = segment.splitn(3, '.');
        let name = parts.next().unwrap_or_default().to_string();
        let version = parts.next().unwrap_or_default().to_string();
        let extension = parts.next().unwrap_or_default().to_string();

        Self {
            name,
            version,
            extension,
        }
    }

    /// Whether the locator produced a usable module name.
    pub fn is_well_formed(&self) -> bool {
        !self.name.is_empty()
    }
}

impl std::fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.version)
        }
    }
}
