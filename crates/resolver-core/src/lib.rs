//! Library-family resolver for plugin hosts.
//!
//! This crate scans plugin archives for the Kotlin libraries they bundle or
//! declare, negotiates a single family version, and locates each library in the
//! local build-tool caches or downloads it into a SHA-1 verified private cache
//! before handing the result to a loader sink.

pub mod archive;
pub mod cache;
pub mod collector;
pub mod digest;
pub mod env;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod library;
pub mod location;
pub mod probe;
pub mod resolve;
pub mod sink;
pub mod state;
pub mod version;

pub use archive::{JarArchive, ManifestAttributes, PluginArchive, discover_archives, plugin_dirs};
pub use cache::{CacheBackend, CacheChain, CacheHit, EntryStatus, PrivateCache};
pub use collector::{Collector, RequirementDeclaration};
pub use env::ResolverConfig;
pub use error::{FetchError, ResolveError};
pub use fetch::{Fetcher, HttpRepository, RemoteRepository};
pub use guard::{AlwaysResolve, MemoryGuard, RESOLVER_VERSION, ResolutionGuard};
pub use library::{LibraryKind, PlatformTier};
pub use location::Location;
pub use probe::{ClassFileProbe, MarkerProbe};
pub use resolve::{ResolvedSet, Resolver, RunOutcome};
pub use sink::{LoaderSink, RecordingSink};
pub use state::ResolutionState;
pub use version::Version;
