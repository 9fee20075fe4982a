//! The JSON document exchanged between `collect` and `act`.

use crate::error::{DepsError, Result};
use crate::files::{DependencyRecord, DirectDependencies, LockFile, ManifestFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manifests: BTreeMap<String, ManifestEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lockfiles: BTreeMap<String, LockfileEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub current: ManifestSnapshot,
    #[serde(default)]
    pub updated: ManifestSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestSnapshot {
    #[serde(default)]
    pub dependencies: BTreeMap<String, ManifestDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub source: String,
    pub constraint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockfileEntry {
    pub current: LockfileSnapshot,
    /// Present only when the post-update fingerprint differs from `current`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<LockfileSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockfileSnapshot {
    pub fingerprint: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, LockedDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub source: String,
    pub version: LockedVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_transitive: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedVersion {
    pub name: String,
}

impl Inventory {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DepsError::file_access(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| DepsError::parse(path, format!("invalid inventory: {}", e)))
    }

    /// Serializes first so that a failure never leaves a truncated file behind.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut serialized = serde_json::to_string_pretty(self)?;
        serialized.push('\n');
        fs::write(path, serialized).map_err(|e| DepsError::file_access(path, e))
    }

    /// Names declared by the manifests recorded in this document.
    pub fn direct_dependencies(&self) -> DirectDependencies {
        self.manifests
            .values()
            .flat_map(|entry| entry.current.dependencies.keys())
            .map(String::as_str)
            .collect()
    }
}

impl ManifestDependency {
    pub fn from_record(record: &DependencyRecord) -> Self {
        Self {
            source: record.source.clone(),
            constraint: record.constraint.clone(),
        }
    }
}

impl ManifestSnapshot {
    pub fn capture(manifest: &ManifestFile) -> Self {
        Self {
            dependencies: manifest
                .dependencies()
                .iter()
                .map(|record| (record.name.clone(), ManifestDependency::from_record(record)))
                .collect(),
        }
    }
}

impl LockfileSnapshot {
    pub fn capture(lock: &LockFile, direct: &DirectDependencies) -> Self {
        Self {
            fingerprint: lock.fingerprint().to_string(),
            dependencies: lock
                .dependencies()
                .iter()
                .map(|record| {
                    (
                        record.name.clone(),
                        LockedDependency {
                            source: record.source.clone(),
                            version: LockedVersion {
                                name: record.constraint.clone(),
                            },
                            is_transitive: Some(record.is_transitive(direct)),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Names whose pinned version differs from (or is missing in) `before`.
    pub fn changed_since(&self, before: &LockfileSnapshot) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|(name, dep)| {
                before
                    .dependencies
                    .get(*name)
                    .is_none_or(|old| old.version != dep.version)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn locked(version: &str) -> LockedDependency {
        LockedDependency {
            source: "pypi".to_string(),
            version: LockedVersion {
                name: version.to_string(),
            },
            is_transitive: None,
        }
    }

    #[test]
    fn reads_documents_without_optional_fields() {
        let inventory: Inventory = serde_json::from_str(
            r#"{
                "lockfiles": {
                    "Pipfile.lock": {
                        "current": {
                            "fingerprint": "sha256:00",
                            "dependencies": {"six": {"source": "pypi", "version": {"name": "1.16.0"}}}
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        assert!(inventory.manifests.is_empty());
        let entry = &inventory.lockfiles["Pipfile.lock"];
        assert!(entry.updated.is_none());
        assert_eq!(entry.current.dependencies["six"].is_transitive, None);
    }

    #[test]
    fn unchanged_lockfile_omits_updated_block() {
        let mut inventory = Inventory::default();
        inventory.lockfiles.insert(
            "poetry.lock".to_string(),
            LockfileEntry {
                current: LockfileSnapshot {
                    fingerprint: "sha256:00".to_string(),
                    dependencies: BTreeMap::new(),
                },
                updated: None,
            },
        );

        let json = serde_json::to_value(&inventory).unwrap();
        assert!(json["lockfiles"]["poetry.lock"].get("updated").is_none());
        assert!(json.get("manifests").is_none());
    }

    #[test]
    fn write_then_read_preserves_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.json");

        let mut inventory = Inventory::default();
        let mut entry = ManifestEntry::default();
        entry.current.dependencies.insert(
            "foo".to_string(),
            ManifestDependency {
                source: "pypi".to_string(),
                constraint: ">=1.0,<2.0".to_string(),
            },
        );
        inventory
            .manifests
            .insert("requirements.txt".to_string(), entry);

        inventory.write(&path).unwrap();
        assert_eq!(Inventory::read(&path).unwrap(), inventory);
        assert!(Inventory::read(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn changed_since_lists_new_and_bumped_pins() {
        let before = LockfileSnapshot {
            fingerprint: "a".to_string(),
            dependencies: [("foo".to_string(), locked("1.0")), ("bar".to_string(), locked("2.0"))]
                .into_iter()
                .collect(),
        };
        let after = LockfileSnapshot {
            fingerprint: "b".to_string(),
            dependencies: [
                ("foo".to_string(), locked("1.1")),
                ("bar".to_string(), locked("2.0")),
                ("baz".to_string(), locked("0.1")),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(after.changed_since(&before), vec!["baz", "foo"]);
    }
}
