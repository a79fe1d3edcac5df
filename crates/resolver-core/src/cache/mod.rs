use std::path::{Path, PathBuf};

use crate::library::LibraryKind;
use crate::version::Version;

mod gradle;
mod maven;
mod private;

pub use gradle::GradleCache;
pub use maven::MavenLocalCache;
pub use private::{EntryStatus, PrivateCache};

/// A local place that may already hold a library artifact.
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Path of a usable artifact for `library` at the family `version`, if present.
    fn find(&self, library: LibraryKind, version: &Version) -> Option<PathBuf>;
}

/// Hit returned by [`CacheChain::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub backend: &'static str,
    pub path: PathBuf,
}

/// Backends consulted in priority order; the first hit wins.
#[derive(Default)]
pub struct CacheChain {
    backends: Vec<Box<dyn CacheBackend>>,
}

impl CacheChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build-tool cache, then local repository, then the private verified cache.
    pub fn standard(user_home: &Path, private: PrivateCache) -> Self {
        let mut chain = Self::new();
        chain.push(GradleCache::under_home(user_home));
        chain.push(MavenLocalCache::under_home(user_home));
        chain.push(private);
        chain
    }

    pub fn push(&mut self, backend: impl CacheBackend + 'static) {
        self.backends.push(Box::new(backend));
    }

    pub fn backends(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.backends.iter().map(|backend| backend.name())
    }

    pub fn resolve(&self, library: LibraryKind, version: &Version) -> Option<CacheHit> {
        for backend in &self.backends {
            match backend.find(library, version) {
                Some(path) => {
                    tracing::debug!(%library, %version, backend = backend.name(), path = %path.display(), "cache hit");
                    return Some(CacheHit {
                        backend: backend.name(),
                        path,
                    });
                }
                None => {
                    tracing::debug!(%library, %version, backend = backend.name(), "cache miss");
                }
            }
        }
        None
    }
}
