use std::fs;
use std::path::{Path, PathBuf};

use super::CacheBackend;
use crate::library::LibraryKind;
use crate::version::Version;

const MODULES_DIR: &str = ".gradle/caches/modules-2/files-2.1";

/// Read-only view of Gradle's module cache:
/// `<root>/<group>/<artifact>/<version>/<sha1-bucket>/<artifact>-<version>.jar`.
#[derive(Debug, Clone)]
pub struct GradleCache {
    root: PathBuf,
}

impl GradleCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn under_home(user_home: &Path) -> Self {
        Self::new(user_home.join(MODULES_DIR))
    }

    fn version_dir(&self, library: LibraryKind, version: &Version) -> PathBuf {
        self.root
            .join(library.group())
            .join(library.artifact())
            .join(library.version_of(version))
    }
}

impl CacheBackend for GradleCache {
    fn name(&self) -> &'static str {
        "gradle"
    }

    fn find(&self, library: LibraryKind, version: &Version) -> Option<PathBuf> {
        let dir = self.version_dir(library, version);
        let file_name = library.file_name(version);
        let mut buckets: Vec<PathBuf> = fs::read_dir(&dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        buckets.sort();
        buckets
            .into_iter()
            .map(|bucket| bucket.join(&file_name))
            .find(|candidate| candidate.is_file())
    }
}
