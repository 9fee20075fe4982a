use crate::agents::manifest_graph::ManifestGraphResolver;
use crate::agents::native_tool::{CommandRunner, SystemRunner};
use crate::config::{Settings, is_verbose};
use crate::error::{DepsError, Result};
use crate::files::{DependencyRecord, DirectDependencies, LockFile, ManifestFile};
use crate::inventory::{
    Inventory, LockfileEntry, LockfileSnapshot, ManifestDependency, ManifestEntry,
    ManifestSnapshot,
};
use crate::oracle::{OutdatedOracle, PipOracle, find_outdated};
use crate::python::{Constraint, Version, VersionComparator};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds an inventory of current and proposed dependency state.
pub struct CollectionEngine {
    oracle: Arc<dyn OutdatedOracle>,
    runner: Arc<dyn CommandRunner>,
    settings: Settings,
}

impl CollectionEngine {
    pub fn new(settings: Settings) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let oracle = Arc::new(PipOracle::new(runner.clone(), settings.pip_path.clone()));
        Self::with_clients(oracle, runner, settings)
    }

    pub fn with_clients(
        oracle: Arc<dyn OutdatedOracle>,
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
    ) -> Self {
        Self {
            oracle,
            runner,
            settings,
        }
    }

    fn enumerate_manifests(&self, start: &Path) -> Result<Vec<ManifestFile>> {
        ManifestGraphResolver::new(&self.settings).resolve(start)
    }

    /// Records every manifest and returns the union of their dependency names.
    fn record_manifests(
        &self,
        manifests: &[ManifestFile],
        inventory: &mut Inventory,
    ) -> Result<DirectDependencies> {
        let mut direct = DirectDependencies::default();

        for manifest in manifests {
            let mut entry = ManifestEntry {
                current: ManifestSnapshot::capture(manifest),
                ..ManifestEntry::default()
            };

            for record in manifest.dependencies() {
                direct.insert(&record.name);
                if let Some(latest) = self.proposed_update(manifest, record)? {
                    println!(
                        "  {} {} {} → {}",
                        "↑".cyan(),
                        record.name.bold(),
                        record.constraint.dimmed(),
                        latest.green()
                    );
                    entry.updated.dependencies.insert(
                        record.name.clone(),
                        ManifestDependency {
                            source: record.source.clone(),
                            constraint: format!("=={}", latest),
                        },
                    );
                }
            }

            inventory.manifests.insert(path_key(manifest.path()), entry);
        }

        Ok(direct)
    }

    /// The latest version of `record` when it is newer than what is installed
    /// and falls outside the declared constraint.
    fn proposed_update(
        &self,
        manifest: &ManifestFile,
        record: &DependencyRecord,
    ) -> Result<Option<String>> {
        let outdated = manifest.outdated(self.oracle.as_ref())?;
        let Some(package) = find_outdated(outdated, &record.name) else {
            return Ok(None);
        };

        let Some(latest) = Version::parse_strict(&package.latest_version) else {
            let err = DepsError::OracleLookup {
                name: record.name.clone(),
                reason: format!("unrecognised latest version '{}'", package.latest_version),
            };
            if self.settings.warn_on_missing_versions {
                eprintln!("{} {}", "Warning:".yellow().bold(), err);
                return Ok(None);
            }
            return Err(err);
        };

        if !VersionComparator::is_newer(&package.latest_version, &package.version) {
            return Ok(None);
        }

        let constraint = Constraint::parse(&record.constraint)
            .map_err(|reason| DepsError::parse(manifest.path(), reason))?;
        if constraint.contains(&latest) {
            if is_verbose() {
                eprintln!(
                    "[VERBOSE] {} {} already allowed by '{}'",
                    record.name, latest, record.constraint
                );
            }
            return Ok(None);
        }

        Ok(Some(latest.to_string()))
    }

    /// Captures each lockfile, re-locks it natively and captures it again.
    fn record_lockfiles(
        &self,
        lockfiles: &[PathBuf],
        direct: &DirectDependencies,
        inventory: &mut Inventory,
    ) -> Result<()> {
        for path in lockfiles {
            let lock = LockFile::load(path, &self.settings)?;
            let current = LockfileSnapshot::capture(&lock, direct);

            println!("  Updating {}...", path.display());
            let lock = lock.native_update(self.runner.as_ref())?;
            let after = LockfileSnapshot::capture(&lock, direct);

            let updated = if after.fingerprint != current.fingerprint {
                println!(
                    "  {} {} changed ({} pins)",
                    "✓".green(),
                    path.display(),
                    after.changed_since(&current).len()
                );
                Some(after)
            } else {
                println!("  {} {} is up to date", "✓".green(), path.display());
                None
            };

            inventory
                .lockfiles
                .insert(path_key(path), LockfileEntry { current, updated });
        }

        Ok(())
    }

    /// Runs the whole collection. Any failure aborts before anything is emitted.
    pub fn collect<P: AsRef<Path>>(&self, start: P) -> Result<Inventory> {
        let manifests = self.enumerate_manifests(start.as_ref())?;
        let mut inventory = Inventory::default();
        let direct = self.record_manifests(&manifests, &mut inventory)?;
        let lockfiles = ManifestGraphResolver::lockfiles(&manifests);
        self.record_lockfiles(&lockfiles, &direct, &mut inventory)?;
        Ok(inventory)
    }
}

pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
