//! Orchestrates a resolution run: scan, finalize candidates, resolve each library,
//! then hand the result to the loader sink.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::cache::{CacheChain, PrivateCache};
use crate::collector::Collector;
use crate::env::ResolverConfig;
use crate::error::{FetchError, ResolveError};
use crate::fetch::{Fetcher, HttpRepository};
use crate::guard::{RESOLVER_VERSION, ResolutionGuard};
use crate::library::{FAMILY_PACKAGE_PREFIXES, LibraryKind, PlatformTier};
use crate::location::Location;
use crate::probe::{ClassFileProbe, MarkerProbe};
use crate::sink::LoaderSink;
use crate::state::ResolutionState;
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPhase {
    Scanning,
    CandidateSetFinalized,
    PerLibraryResolving,
    Ready,
}

/// Libraries resolved for one negotiated version, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSet {
    pub version: Option<Version>,
    pub libraries: BTreeMap<LibraryKind, Location>,
}

impl ResolvedSet {
    pub fn locations(&self) -> Vec<Location> {
        self.libraries.values().cloned().collect()
    }

    pub fn exclusions(&self) -> &'static [&'static str] {
        FAMILY_PACKAGE_PREFIXES
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guard reported an earlier successful run; nothing was done.
    AlreadyResolved,
    Resolved(ResolvedSet),
}

/// Coordinates the collector, cache chain, and fetcher.
pub struct Resolver {
    platform: PlatformTier,
    chain: CacheChain,
    fetcher: Fetcher,
    probe: Box<dyn MarkerProbe>,
}

impl Resolver {
    pub fn new(cfg: &ResolverConfig) -> Result<Self, FetchError> {
        let private = PrivateCache::new(cfg.cache_dir.clone());
        let repository = HttpRepository::new(cfg.repository.clone(), cfg.download_timeout)?;
        Ok(Self::from_parts(
            cfg.platform,
            CacheChain::standard(&cfg.user_home, private.clone()),
            Fetcher::new(repository, private),
        ))
    }

    pub fn from_parts(platform: PlatformTier, chain: CacheChain, fetcher: Fetcher) -> Self {
        Self {
            platform,
            chain,
            fetcher,
            probe: Box::new(ClassFileProbe),
        }
    }

    pub fn with_probe(mut self, probe: impl MarkerProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Scan plugin archives into a fresh state.
    pub fn scan(&self, archives: &[PathBuf]) -> Result<ResolutionState, ResolveError> {
        enter(ResolutionPhase::Scanning);
        let mut state = ResolutionState::new();
        Collector::new(self.probe.as_ref(), self.platform).collect_paths(&mut state, archives)?;
        Ok(state)
    }

    /// Resolve every candidate library of `state` to a location.
    pub fn resolve_state(&self, state: ResolutionState) -> Result<ResolvedSet, ResolveError> {
        let candidates = state.candidates();
        enter(ResolutionPhase::CandidateSetFinalized);
        let (version, _, mut resolved) = state.into_parts();
        tracing::info!(
            version = ?version.map(|v| v.to_string()),
            libraries = ?candidates.iter().map(|lib| lib.name()).collect::<Vec<_>>(),
            "resolving library family"
        );

        enter(ResolutionPhase::PerLibraryResolving);
        for library in candidates {
            if let Some(location) = resolved.get(&library) {
                tracing::debug!(%library, %location, "using bundled copy declared by plugin");
                continue;
            }
            let version = version.ok_or(ResolveError::NoVersion { library })?;
            let location = self.locate(library, &version)?;
            resolved.insert(library, location);
        }

        enter(ResolutionPhase::Ready);
        Ok(ResolvedSet {
            version,
            libraries: resolved,
        })
    }

    fn locate(&self, library: LibraryKind, version: &Version) -> Result<Location, ResolveError> {
        if let Some(hit) = self.chain.resolve(library, version) {
            return Ok(Location::Cached { path: hit.path });
        }
        let path = self
            .fetcher
            .fetch(library, version)
            .map_err(|source| ResolveError::Fetch {
                library,
                version: library.version_of(version),
                source,
            })?;
        Ok(Location::Downloaded { path })
    }

    /// Full run. The sink is only invoked once every candidate resolved; on any
    /// fatal error the partial state is dropped and the guard is left untouched.
    pub fn run(
        &self,
        archives: &[PathBuf],
        guard: &dyn ResolutionGuard,
        sink: &mut dyn LoaderSink,
    ) -> Result<RunOutcome, ResolveError> {
        if guard.already_resolved() {
            tracing::debug!("library family already resolved in this process");
            return Ok(RunOutcome::AlreadyResolved);
        }
        let state = self.scan(archives)?;
        let resolved = self.resolve_state(state)?;
        sink.accept(&resolved.locations(), resolved.exclusions())
            .map_err(ResolveError::Sink)?;
        guard.record(RESOLVER_VERSION);
        Ok(RunOutcome::Resolved(resolved))
    }
}

fn enter(phase: ResolutionPhase) {
    tracing::debug!(?phase, "resolution phase");
}
