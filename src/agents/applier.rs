use crate::agents::native_tool::{CommandRunner, SystemRunner};
use crate::config::{LockfileUpdateMode, Settings, is_verbose};
use crate::error::{DepsError, Result};
use crate::files::{LockFile, ManifestFile};
use crate::inventory::{
    Inventory, LockfileSnapshot, ManifestDependency, ManifestSnapshot,
};
use crate::python::Constraint;
use colored::Colorize;
use std::sync::Arc;

/// Applies the updates recorded in an inventory to the files on disk.
pub struct ActionEngine {
    runner: Arc<dyn CommandRunner>,
    settings: Settings,
}

impl ActionEngine {
    pub fn new(settings: Settings) -> Self {
        Self::with_runner(Arc::new(SystemRunner), settings)
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, settings: Settings) -> Self {
        Self { runner, settings }
    }

    /// Re-locks every lockfile that carries an `updated` block and replaces the
    /// proposal with what the locker actually produced.
    fn update_lockfiles(&self, inventory: &mut Inventory) -> Result<()> {
        let direct = inventory.direct_dependencies();

        for (path, entry) in inventory.lockfiles.iter_mut() {
            let Some(proposed) = entry.updated.take() else {
                if is_verbose() {
                    eprintln!("[VERBOSE] {} has no proposed update, leaving it alone", path);
                }
                continue;
            };

            let lock = LockFile::load(path, &self.settings)?;
            let lock = match self.settings.lockfile_update {
                LockfileUpdateMode::All => lock.native_update(self.runner.as_ref())?,
                LockfileUpdateMode::Targeted => {
                    let names = proposed.changed_since(&entry.current);
                    if names.is_empty() {
                        lock.native_update(self.runner.as_ref())?
                    } else {
                        lock.native_update_of(self.runner.as_ref(), &names)?
                    }
                }
            };

            let actual = LockfileSnapshot::capture(&lock, &direct);
            if actual.fingerprint != proposed.fingerprint {
                println!(
                    "  {} {} resolved differently than proposed",
                    "!".yellow(),
                    path
                );
            }

            if actual.fingerprint == entry.current.fingerprint {
                println!("  {} {} did not change", "!".yellow(), path);
            } else {
                println!("  {} Re-locked {}", "✓".green(), path);
                entry.updated = Some(actual);
            }
        }

        Ok(())
    }

    /// Rewrites each requested manifest constraint. Updates that cannot be
    /// located or would not parse are reported and left out of the document.
    fn update_manifests(&self, inventory: &mut Inventory) -> Result<()> {
        for (path, entry) in inventory.manifests.iter_mut() {
            let requested = std::mem::take(&mut entry.updated);
            if requested.dependencies.is_empty() {
                continue;
            }

            let mut manifest = match ManifestFile::load(path, &self.settings) {
                Ok(manifest) => manifest,
                Err(e @ DepsError::Parse { .. }) => {
                    eprintln!("{} {} (skipping its updates)", "Warning:".yellow().bold(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut applied = ManifestSnapshot::default();
            for (name, update) in requested.dependencies {
                match manifest.apply_update(&name, &update.constraint) {
                    Ok(rewritten) => {
                        manifest = rewritten;
                        if let Some(dependency) = self.verify(&manifest, &name, &update) {
                            println!(
                                "  {} {} {}",
                                "✓".green(),
                                name.bold(),
                                dependency.constraint.green()
                            );
                            applied.dependencies.insert(name, dependency);
                        }
                    }
                    Err(e @ (DepsError::DependencyNotFound { .. } | DepsError::Parse { .. })) => {
                        eprintln!("{} {} (update dropped)", "Warning:".yellow().bold(), e);
                    }
                    Err(e) => return Err(e),
                }
            }

            entry.updated = applied;
        }

        Ok(())
    }

    /// The declaration as it reads after the rewrite, if it says what was asked for.
    fn verify(
        &self,
        manifest: &ManifestFile,
        name: &str,
        update: &ManifestDependency,
    ) -> Option<ManifestDependency> {
        let record = manifest.state().find(name)?;
        let expected = Constraint::parse(&update.constraint)
            .map(|c| c.to_string())
            .unwrap_or_else(|_| update.constraint.clone());

        if record.constraint != expected {
            eprintln!(
                "{} {} reads '{}' after rewriting to '{}'",
                "Warning:".yellow().bold(),
                name,
                record.constraint,
                update.constraint
            );
            return None;
        }

        Some(ManifestDependency::from_record(record))
    }

    /// Lockfiles first, then manifest rewrites.
    pub fn act(&self, inventory: &Inventory) -> Result<Inventory> {
        let mut result = inventory.clone();
        self.update_lockfiles(&mut result)?;
        self.update_manifests(&mut result)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::collector::{CollectionEngine, path_key};
    use crate::testing::{FakeOracle, RecordingRunner};
    use std::fs;
    use tempfile::tempdir;

    const LOCK_BEFORE: &str =
        r#"{"_meta": {}, "default": {"requests": {"version": "==2.31.0"}, "idna": {"version": "==3.6"}}}"#;
    const LOCK_AFTER: &str =
        r#"{"_meta": {}, "default": {"requests": {"version": "==2.32.3"}, "idna": {"version": "==3.7"}}}"#;

    #[test]
    fn collect_then_act_rewrites_only_the_chosen_line() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("requirements.txt");
        let original = "# pinned for prod\nfoo>=1.0,<2.0  # core\nbar==3.1\n";
        fs::write(&manifest, original).unwrap();

        let collected = CollectionEngine::with_clients(
            Arc::new(FakeOracle::new(&[("foo", "1.9", "2.5.0")])),
            Arc::new(RecordingRunner::default()),
            Settings::default(),
        )
        .collect(&manifest)
        .unwrap();
        assert_eq!(fs::read_to_string(&manifest).unwrap(), original);

        let engine = ActionEngine::with_runner(Arc::new(RecordingRunner::default()), Settings::default());
        let result = engine.act(&collected).unwrap();

        assert_eq!(
            fs::read_to_string(&manifest).unwrap(),
            "# pinned for prod\nfoo==2.5.0  # core\nbar==3.1\n"
        );
        let entry = &result.manifests[&path_key(&manifest)];
        assert_eq!(entry.updated.dependencies["foo"].constraint, "==2.5.0");
        assert_eq!(entry.current, collected.manifests[&path_key(&manifest)].current);
    }

    #[test]
    fn missing_declaration_is_dropped_and_the_rest_applied() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("requirements.txt");
        fs::write(&manifest, "foo>=1.0\nbar<2\n").unwrap();

        let mut inventory = Inventory::default();
        let mut entry = crate::inventory::ManifestEntry::default();
        for (name, constraint) in [("bar", "==2.1"), ("ghost", "==9.9"), ("foo", "==1.2")] {
            entry.updated.dependencies.insert(
                name.to_string(),
                ManifestDependency {
                    source: "pypi".to_string(),
                    constraint: constraint.to_string(),
                },
            );
        }
        inventory.manifests.insert(path_key(&manifest), entry);

        let engine = ActionEngine::with_runner(Arc::new(RecordingRunner::default()), Settings::default());
        let result = engine.act(&inventory).unwrap();

        assert_eq!(fs::read_to_string(&manifest).unwrap(), "foo==1.2\nbar==2.1\n");
        let applied: Vec<_> = result.manifests[&path_key(&manifest)]
            .updated
            .dependencies
            .keys()
            .cloned()
            .collect();
        assert_eq!(applied, vec!["bar", "foo"]);
    }

    #[test]
    fn unparseable_constraint_is_dropped_and_other_manifests_still_apply() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        fs::write(&first, "foo>=1.0\nqux<3\n").unwrap();
        fs::write(&second, "bar>=1.0\n").unwrap();

        let mut inventory = Inventory::default();
        for (path, updates) in [
            (&first, vec![("foo", "==banana"), ("qux", "==3.1")]),
            (&second, vec![("bar", "==2.0")]),
        ] {
            let mut entry = crate::inventory::ManifestEntry::default();
            for (name, constraint) in updates {
                entry.updated.dependencies.insert(
                    name.to_string(),
                    ManifestDependency {
                        source: "pypi".to_string(),
                        constraint: constraint.to_string(),
                    },
                );
            }
            inventory.manifests.insert(path_key(path), entry);
        }

        let engine = ActionEngine::with_runner(Arc::new(RecordingRunner::default()), Settings::default());
        let result = engine.act(&inventory).unwrap();

        assert_eq!(fs::read_to_string(&first).unwrap(), "foo>=1.0\nqux==3.1\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "bar==2.0\n");
        let applied: Vec<_> = result.manifests[&path_key(&first)]
            .updated
            .dependencies
            .keys()
            .cloned()
            .collect();
        assert_eq!(applied, vec!["qux"]);
        assert_eq!(
            result.manifests[&path_key(&second)].updated.dependencies["bar"].constraint,
            "==2.0"
        );
    }

    #[test]
    fn only_drifted_lockfiles_are_relocked() {
        let dir = tempdir().unwrap();
        let pipenv_dir = dir.path().join("svc");
        let poetry_dir = dir.path().join("lib");
        fs::create_dir_all(&pipenv_dir).unwrap();
        fs::create_dir_all(&poetry_dir).unwrap();

        fs::write(pipenv_dir.join("Pipfile"), "[packages]\nrequests = \"*\"\n").unwrap();
        let pipenv_lock = pipenv_dir.join("Pipfile.lock");
        fs::write(&pipenv_lock, LOCK_BEFORE).unwrap();
        let poetry_lock = poetry_dir.join("poetry.lock");
        fs::write(&poetry_lock, "[[package]]\nname = \"six\"\nversion = \"1.16.0\"\n").unwrap();

        let settings = Settings::default();
        let direct = ["requests"].into_iter().collect();
        let current = LockfileSnapshot::capture(&LockFile::load(&pipenv_lock, &settings).unwrap(), &direct);
        let mut proposed = current.clone();
        proposed.fingerprint = "sha256:proposed".to_string();

        let mut inventory = Inventory::default();
        inventory.manifests.insert(
            path_key(&pipenv_dir.join("Pipfile")),
            crate::inventory::ManifestEntry {
                current: ManifestSnapshot {
                    dependencies: [(
                        "requests".to_string(),
                        ManifestDependency {
                            source: "pypi".to_string(),
                            constraint: "*".to_string(),
                        },
                    )]
                    .into_iter()
                    .collect(),
                },
                ..Default::default()
            },
        );
        inventory.lockfiles.insert(
            path_key(&pipenv_lock),
            crate::inventory::LockfileEntry {
                current: current.clone(),
                updated: Some(proposed),
            },
        );
        let poetry_current =
            LockfileSnapshot::capture(&LockFile::load(&poetry_lock, &settings).unwrap(), &direct);
        inventory.lockfiles.insert(
            path_key(&poetry_lock),
            crate::inventory::LockfileEntry {
                current: poetry_current,
                updated: None,
            },
        );

        let runner = Arc::new(RecordingRunner::default().writing("pipenv", "Pipfile.lock", LOCK_AFTER));
        let engine = ActionEngine::with_runner(runner.clone(), settings);
        let result = engine.act(&inventory).unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, "pipenv");
        assert_eq!(invocations[0].cwd, pipenv_dir);

        let relocked = result.lockfiles[&path_key(&pipenv_lock)].updated.as_ref().unwrap();
        assert_eq!(relocked.dependencies["requests"].version.name, "2.32.3");
        assert_eq!(relocked.dependencies["requests"].is_transitive, Some(false));
        assert_eq!(relocked.dependencies["idna"].is_transitive, Some(true));
        assert!(result.lockfiles[&path_key(&poetry_lock)].updated.is_none());
    }

    #[test]
    fn targeted_mode_names_changed_packages() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("poetry.lock");
        fs::write(&lock_path, "[[package]]\nname = \"six\"\nversion = \"1.15.0\"\n").unwrap();

        let settings = Settings {
            lockfile_update: LockfileUpdateMode::Targeted,
            ..Settings::default()
        };
        let direct = crate::files::DirectDependencies::default();
        let current = LockfileSnapshot::capture(&LockFile::load(&lock_path, &settings).unwrap(), &direct);
        let mut proposed = current.clone();
        proposed.fingerprint = "sha256:new".to_string();
        if let Some(six) = proposed.dependencies.get_mut("six") {
            six.version.name = "1.16.0".to_string();
        }

        let mut inventory = Inventory::default();
        inventory.lockfiles.insert(
            path_key(&lock_path),
            crate::inventory::LockfileEntry {
                current,
                updated: Some(proposed),
            },
        );

        let runner = Arc::new(RecordingRunner::default().writing(
            "poetry",
            "poetry.lock",
            "[[package]]\nname = \"six\"\nversion = \"1.16.0\"\n",
        ));
        ActionEngine::with_runner(runner.clone(), settings)
            .act(&inventory)
            .unwrap();

        assert_eq!(runner.invocations()[0].args, vec!["update", "six"]);
    }

    #[test]
    fn native_failure_during_act_is_fatal() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("Pipfile.lock");
        fs::write(&lock_path, LOCK_BEFORE).unwrap();

        let settings = Settings::default();
        let current = LockfileSnapshot::capture(
            &LockFile::load(&lock_path, &settings).unwrap(),
            &crate::files::DirectDependencies::default(),
        );
        let mut inventory = Inventory::default();
        inventory.lockfiles.insert(
            path_key(&lock_path),
            crate::inventory::LockfileEntry {
                current: current.clone(),
                updated: Some(current),
            },
        );

        let runner = Arc::new(RecordingRunner::default().failing("pipenv", "locking failed"));
        let err = ActionEngine::with_runner(runner, settings)
            .act(&inventory)
            .unwrap_err();
        assert!(matches!(err, DepsError::NativeTool { .. }));
    }
}
