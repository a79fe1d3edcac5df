use std::path::{Path, PathBuf};

use super::CacheBackend;
use crate::library::LibraryKind;
use crate::version::Version;

/// Read-only view of a Maven local repository (`~/.m2/repository`).
#[derive(Debug, Clone)]
pub struct MavenLocalCache {
    root: PathBuf,
}

impl MavenLocalCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn under_home(user_home: &Path) -> Self {
        Self::new(user_home.join(".m2").join("repository"))
    }
}

impl CacheBackend for MavenLocalCache {
    fn name(&self) -> &'static str {
        "maven-local"
    }

    fn find(&self, library: LibraryKind, version: &Version) -> Option<PathBuf> {
        let candidate = self.root.join(library.repository_path(version));
        candidate.is_file().then_some(candidate)
    }
}
