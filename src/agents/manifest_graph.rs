use crate::config::{Settings, is_verbose};
use crate::error::Result;
use crate::files::ManifestFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Walks a manifest and everything it includes, depth first.
pub struct ManifestGraphResolver<'a> {
    settings: &'a Settings,
}

impl<'a> ManifestGraphResolver<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Every distinct manifest reachable from `start`, in discovery order.
    /// Include cycles terminate because a path is only ever loaded once.
    pub fn resolve<P: AsRef<Path>>(&self, start: P) -> Result<Vec<ManifestFile>> {
        let mut visited = HashSet::new();
        let mut manifests = Vec::new();
        self.visit(start.as_ref(), &mut visited, &mut manifests)?;
        Ok(manifests)
    }

    fn visit(
        &self,
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        manifests: &mut Vec<ManifestFile>,
    ) -> Result<()> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(key) {
            if is_verbose() {
                eprintln!("[VERBOSE] Already visited {}, skipping", path.display());
            }
            return Ok(());
        }

        let manifest = ManifestFile::load(path, self.settings)?;
        let references = manifest.references().to_vec();
        manifests.push(manifest);

        for reference in references {
            self.visit(&reference, visited, manifests)?;
        }

        Ok(())
    }

    /// Distinct lockfiles belonging to `manifests`, in manifest order.
    pub fn lockfiles(manifests: &[ManifestFile]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        manifests
            .iter()
            .filter_map(|manifest| manifest.lockfile())
            .filter(|lock| seen.insert(lock.canonicalize().unwrap_or_else(|_| lock.clone())))
            .collect()
    }
}
