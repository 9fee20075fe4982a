//! Manifest and lockfile model.
//!
//! Every file is read into an immutable [`FileState`]; mutations write the new
//! text to disk and load a fresh state, so the parsed model can never drift
//! from the file it describes.

pub mod fingerprint;
pub mod pipfile;
pub mod pipfile_lock;
pub mod poetry;
pub mod requirements;

use crate::agents::native_tool::{CommandRunner, Invocation};
use crate::config::{Settings, is_verbose};
use crate::error::{DepsError, Result};
use crate::oracle::{OutdatedOracle, OutdatedPackage};
use crate::python::{canonical_name, same_name};
use std::cell::OnceCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Closed set of supported file dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    PipfileLock,
    PoetryLock,
    Pipfile,
    PoetryPyproject,
    Requirements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Manifest,
    Lockfile,
}

/// File-name suffixes in specificity order. Lockfiles come first so that
/// `Pipfile.lock` never falls through to `Pipfile`.
const DISPATCH: &[(&str, Dialect)] = &[
    ("Pipfile.lock", Dialect::PipfileLock),
    ("poetry.lock", Dialect::PoetryLock),
    ("Pipfile", Dialect::Pipfile),
    ("pyproject.toml", Dialect::PoetryPyproject),
];

impl Dialect {
    pub fn detect(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        DISPATCH
            .iter()
            .find(|(suffix, _)| file_name.ends_with(suffix))
            .map(|(_, dialect)| *dialect)
            .unwrap_or(Dialect::Requirements)
    }

    pub fn kind(self) -> FileKind {
        match self {
            Dialect::PipfileLock | Dialect::PoetryLock => FileKind::Lockfile,
            Dialect::Pipfile | Dialect::PoetryPyproject | Dialect::Requirements => {
                FileKind::Manifest
            }
        }
    }

    /// Conventional lockfile name living next to a manifest of this dialect.
    pub fn lockfile_name(self) -> Option<&'static str> {
        match self {
            Dialect::Pipfile => Some("Pipfile.lock"),
            Dialect::PoetryPyproject => Some("poetry.lock"),
            _ => None,
        }
    }

    /// Sections managed for this dialect; `None` means every record is in scope.
    fn scope(self, settings: &Settings) -> Option<Vec<String>> {
        match self {
            Dialect::Pipfile => Some(settings.pipfile_sections.clone()),
            Dialect::PipfileLock => Some(settings.pipfile_lock_sections.clone()),
            _ => None,
        }
    }

    fn parse(self, path: &Path, content: &str) -> Result<ParsedContent> {
        match self {
            Dialect::Requirements => requirements::parse(path, content),
            Dialect::Pipfile => pipfile::parse(path, content),
            Dialect::PoetryPyproject => poetry::parse_pyproject(path, content),
            Dialect::PipfileLock => pipfile_lock::parse(path, content),
            Dialect::PoetryLock => poetry::parse_lock(path, content),
        }
    }

    fn native_update_invocation(self, dir: &Path, names: &[String]) -> Option<Invocation> {
        let program = match self {
            Dialect::PipfileLock => "pipenv",
            Dialect::PoetryLock => "poetry",
            _ => return None,
        };

        let mut args = vec!["update".to_string()];
        args.extend(names.iter().cloned());
        Some(Invocation::new(program, args, dir))
    }
}

/// One dependency as declared in a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub name: String,
    pub source: String,
    /// Range expression for manifests, exact version for lockfiles.
    pub constraint: String,
    pub section: String,
}

impl DependencyRecord {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        constraint: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            constraint: constraint.into(),
            section: section.into(),
        }
    }

    pub fn is_transitive(&self, direct: &DirectDependencies) -> bool {
        !direct.contains(&self.name)
    }
}

/// Names declared directly by any manifest, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct DirectDependencies {
    names: HashSet<String>,
}

impl DirectDependencies {
    pub fn insert(&mut self, name: &str) {
        self.names.insert(canonical_name(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&canonical_name(name))
    }
}

impl<'a> FromIterator<&'a str> for DirectDependencies {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut direct = DirectDependencies::default();
        for name in iter {
            direct.insert(name);
        }
        direct
    }
}

/// Output of a dialect parser.
#[derive(Debug, Default)]
pub struct ParsedContent {
    pub records: Vec<DependencyRecord>,
    pub references: Vec<PathBuf>,
}

impl ParsedContent {
    /// Adds a record unless the name was already declared in the same section;
    /// the first declaration wins.
    pub fn push(&mut self, path: &Path, record: DependencyRecord) {
        if self
            .records
            .iter()
            .any(|r| r.section == record.section && same_name(&r.name, &record.name))
        {
            if is_verbose() {
                eprintln!(
                    "[VERBOSE] Ignoring duplicate declaration of '{}' in {}",
                    record.name,
                    path.display()
                );
            }
            return;
        }
        self.records.push(record);
    }
}

/// Immutable snapshot of one file as read from disk.
#[derive(Debug)]
pub struct FileState {
    path: PathBuf,
    dialect: Dialect,
    content: String,
    fingerprint: String,
    records: Vec<DependencyRecord>,
    references: Vec<PathBuf>,
    scope: Option<Vec<String>>,
}

impl FileState {
    fn load(path: &Path, dialect: Dialect, scope: Option<Vec<String>>) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| DepsError::file_access(path, e))?;

        let parsed = dialect.parse(path, &content)?;
        let fingerprint = fingerprint::fingerprint(dialect, &content)
            .map_err(|reason| DepsError::parse(path, reason))?;

        let in_scope = |r: &DependencyRecord| match &scope {
            Some(sections) => sections.iter().any(|s| s == &r.section),
            None => true,
        };
        let mut records: Vec<DependencyRecord> = Vec::new();
        for record in parsed.records.into_iter().filter(in_scope) {
            if records.iter().any(|r| same_name(&r.name, &record.name)) {
                if is_verbose() {
                    eprintln!(
                        "[VERBOSE] '{}' is also declared in [{}] of {}, keeping the first",
                        record.name,
                        record.section,
                        path.display()
                    );
                }
                continue;
            }
            records.push(record);
        }

        Ok(Self {
            path: path.to_path_buf(),
            dialect,
            content,
            fingerprint,
            records,
            references: parsed.references,
            scope,
        })
    }

    fn reload(&self) -> Result<Self> {
        Self::load(&self.path, self.dialect, self.scope.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dependencies(&self) -> &[DependencyRecord] {
        &self.records
    }

    pub fn find(&self, name: &str) -> Option<&DependencyRecord> {
        self.records.iter().find(|r| same_name(&r.name, name))
    }

    pub fn dir(&self) -> PathBuf {
        file_dir(&self.path)
    }
}

/// Directory a file lives in; `.` for bare file names.
pub fn file_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// A human-edited file declaring direct dependencies with constraints.
#[derive(Debug)]
pub struct ManifestFile {
    state: FileState,
    outdated: OnceCell<Vec<OutdatedPackage>>,
}

impl ManifestFile {
    pub fn load<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<Self> {
        let path = path.as_ref();
        let dialect = Dialect::detect(path);
        if dialect.kind() != FileKind::Manifest {
            return Err(DepsError::InvalidInput(format!(
                "{} is a lockfile, not a manifest",
                path.display()
            )));
        }

        Ok(Self::from_state(FileState::load(
            path,
            dialect,
            dialect.scope(settings),
        )?))
    }

    fn from_state(state: FileState) -> Self {
        Self {
            state,
            outdated: OnceCell::new(),
        }
    }

    pub fn state(&self) -> &FileState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        self.state.path()
    }

    pub fn dependencies(&self) -> &[DependencyRecord] {
        self.state.dependencies()
    }

    /// Other manifests this one includes (`-r other.txt`).
    pub fn references(&self) -> &[PathBuf] {
        &self.state.references
    }

    /// The lockfile that belongs to this manifest, if one exists on disk.
    pub fn lockfile(&self) -> Option<PathBuf> {
        let name = self.state.dialect.lockfile_name()?;
        let candidate = match self.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        };

        if candidate.is_file() {
            Some(candidate)
        } else {
            if is_verbose() {
                eprintln!(
                    "[VERBOSE] No {} next to {}",
                    name,
                    self.path().display()
                );
            }
            None
        }
    }

    /// Returns the manifest text with only `name`'s declaration changed to `constraint`.
    pub fn rewrite_one(&self, name: &str, constraint: &str) -> Result<String> {
        let record = self
            .state
            .find(name)
            .ok_or_else(|| DepsError::DependencyNotFound {
                path: self.path().to_path_buf(),
                name: name.to_string(),
            })?;

        let content = self.state.content();
        match self.state.dialect {
            Dialect::Requirements => requirements::rewrite(self.path(), content, record, constraint),
            Dialect::Pipfile => pipfile::rewrite(self.path(), content, record, constraint),
            Dialect::PoetryPyproject => {
                poetry::rewrite_pyproject(self.path(), content, record, constraint)
            }
            Dialect::PipfileLock | Dialect::PoetryLock => Err(DepsError::InvalidInput(format!(
                "{} cannot be rewritten one dependency at a time",
                self.path().display()
            ))),
        }
    }

    /// Rewrites one declaration, persists it and returns the re-parsed manifest.
    /// Text that would not parse again is never written.
    pub fn apply_update(&self, name: &str, constraint: &str) -> Result<ManifestFile> {
        let updated = self.rewrite_one(name, constraint)?;
        self.state.dialect.parse(self.path(), &updated)?;
        fs::write(self.path(), &updated).map_err(|e| DepsError::file_access(self.path(), e))?;
        Ok(Self::from_state(self.state.reload()?))
    }

    /// Installed-but-outdated packages for this manifest's environment, queried once.
    pub fn outdated(&self, oracle: &dyn OutdatedOracle) -> Result<&[OutdatedPackage]> {
        if let Some(cached) = self.outdated.get() {
            return Ok(cached.as_slice());
        }

        let fetched = oracle.outdated(&self.state.dir())?;
        Ok(self.outdated.get_or_init(|| fetched).as_slice())
    }
}

/// A tool-generated file pinning every dependency to an exact version.
#[derive(Debug)]
pub struct LockFile {
    state: FileState,
}

impl LockFile {
    pub fn load<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<Self> {
        let path = path.as_ref();
        let dialect = Dialect::detect(path);
        if dialect.kind() != FileKind::Lockfile {
            return Err(DepsError::InvalidInput(format!(
                "{} is not a recognised lockfile",
                path.display()
            )));
        }

        Ok(Self {
            state: FileState::load(path, dialect, dialect.scope(settings))?,
        })
    }

    pub fn path(&self) -> &Path {
        self.state.path()
    }

    pub fn dependencies(&self) -> &[DependencyRecord] {
        self.state.dependencies()
    }

    pub fn fingerprint(&self) -> &str {
        self.state.fingerprint()
    }

    /// Re-locks everything with the native tool and returns the re-parsed lockfile.
    pub fn native_update(self, runner: &dyn CommandRunner) -> Result<LockFile> {
        self.run_native_update(runner, &[])
    }

    /// Re-locks only the named packages.
    pub fn native_update_of(self, runner: &dyn CommandRunner, names: &[String]) -> Result<LockFile> {
        self.run_native_update(runner, names)
    }

    fn run_native_update(self, runner: &dyn CommandRunner, names: &[String]) -> Result<LockFile> {
        let invocation = self
            .state
            .dialect
            .native_update_invocation(&self.state.dir(), names)
            .ok_or_else(|| {
                DepsError::InvalidInput(format!(
                    "No native update tool for {}",
                    self.path().display()
                ))
            })?;

        runner.run(&invocation)?;

        Ok(Self {
            state: self.state.reload()?,
        })
    }
}
