//! Sources of "what is newer than what is installed".

pub mod pip;

pub use pip::PipOracle;

use crate::error::Result;
use crate::python::same_name;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of `pip list --outdated --format=json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedPackage {
    pub name: String,
    pub version: String,
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_filetype: Option<String>,
}

impl OutdatedPackage {
    #[cfg(test)]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        latest_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            latest_version: latest_version.into(),
            latest_filetype: None,
        }
    }
}

pub trait OutdatedOracle: Send + Sync {
    /// Packages installed for the project in `dir` that have a newer release.
    fn outdated(&self, dir: &Path) -> Result<Vec<OutdatedPackage>>;
}

pub fn find_outdated<'a>(packages: &'a [OutdatedPackage], name: &str) -> Option<&'a OutdatedPackage> {
    packages.iter().find(|p| same_name(&p.name, name))
}
