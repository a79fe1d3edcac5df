//! Scans plugin archives for bundled libraries and `MCKT-*` manifest declarations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::archive::{JarArchive, ManifestAttributes, PluginArchive};
use crate::error::ResolveError;
use crate::library::{FALLBACK_VERSION, LibraryKind, PlatformTier};
use crate::location::Location;
use crate::probe::MarkerProbe;
use crate::state::ResolutionState;
use crate::version::Version;

/// Highest `MCKT-MF-Version` this resolver understands (inclusive).
pub const MANIFEST_VERSION: u32 = 1;

pub const ATTR_MANIFEST_VERSION: &str = "MCKT-MF-Version";
pub const ATTR_FAMILY_VERSION: &str = "MCKT-KT-Version";
pub const ATTR_PARTS: &str = "MCKT-KT-Parts";
pub const ATTR_JARS: &str = "MCKT-KT-Jars";

/// What a single archive asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementDeclaration {
    /// Libraries found bundled in the archive, plus the version read from the
    /// bundled marker class when the primary library is among them.
    Implicit {
        libraries: BTreeSet<LibraryKind>,
        embedded_version: Option<String>,
    },
    /// `MCKT-*` manifest attributes.
    Explicit {
        archive: PathBuf,
        manifest_version: u32,
        family_version: Version,
        parts: ExplicitParts,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplicitParts {
    /// No `MCKT-KT-Parts`: the platform default set applies.
    PlatformDefault,
    /// Listed libraries, each with an optional in-archive path to a bundled copy.
    Listed(Vec<(LibraryKind, Option<String>)>),
}

pub struct Collector<'p> {
    probe: &'p dyn MarkerProbe,
    platform: PlatformTier,
}

impl<'p> Collector<'p> {
    pub fn new(probe: &'p dyn MarkerProbe, platform: PlatformTier) -> Self {
        Self { probe, platform }
    }

    /// Open and scan every archive in order. Archives that cannot be opened are
    /// skipped; fatal manifest problems abort the whole scan.
    pub fn collect_paths(
        &self,
        state: &mut ResolutionState,
        paths: &[PathBuf],
    ) -> Result<(), ResolveError> {
        for path in paths {
            match JarArchive::open(path) {
                Ok(mut archive) => self.collect(state, &mut archive)?,
                Err(err) => {
                    tracing::warn!(archive = %path.display(), error = %err, "skipping unreadable plugin archive");
                }
            }
        }
        Ok(())
    }

    /// Scan one archive and fold its declarations into `state`.
    pub fn collect(
        &self,
        state: &mut ResolutionState,
        archive: &mut dyn PluginArchive,
    ) -> Result<(), ResolveError> {
        for declaration in self.declarations(archive)? {
            self.apply(state, declaration);
        }
        Ok(())
    }

    /// Declarations of one archive, implicit first. Reading the manifest can fail
    /// after bundled libraries were already detected; the implicit part is kept.
    pub fn declarations(
        &self,
        archive: &mut dyn PluginArchive,
    ) -> Result<Vec<RequirementDeclaration>, ResolveError> {
        let mut declarations = Vec::new();
        if let Some(implicit) = self.detect_bundled(archive) {
            declarations.push(implicit);
        }
        let attributes = match archive.attributes() {
            Ok(attributes) => attributes,
            Err(err) => {
                tracing::warn!(archive = %archive.path().display(), error = %err, "skipping unreadable manifest");
                return Ok(declarations);
            }
        };
        if let Some(explicit) = parse_explicit(archive.path(), &attributes)? {
            declarations.push(explicit);
        }
        Ok(declarations)
    }

    fn detect_bundled(&self, archive: &mut dyn PluginArchive) -> Option<RequirementDeclaration> {
        let libraries: BTreeSet<LibraryKind> = LibraryKind::ALL
            .into_iter()
            .filter(|kind| archive.contains(kind.detector()))
            .collect();
        if libraries.is_empty() {
            return None;
        }
        let embedded_version = libraries.contains(&LibraryKind::PRIMARY).then(|| {
            self.probe
                .probe(archive)
                .unwrap_or_else(|| FALLBACK_VERSION.to_string())
        });
        tracing::debug!(archive = %archive.path().display(), ?libraries, ?embedded_version, "bundled libraries detected");
        Some(RequirementDeclaration::Implicit {
            libraries,
            embedded_version,
        })
    }

    pub fn apply(&self, state: &mut ResolutionState, declaration: RequirementDeclaration) {
        match declaration {
            RequirementDeclaration::Implicit {
                libraries,
                embedded_version,
            } => {
                state.require_all(libraries);
                if let Some(raw) = embedded_version {
                    match Version::parse(&raw) {
                        Some(version) => merge(state, version),
                        None => tracing::warn!(version = %raw, "ignoring unparsable bundled version"),
                    }
                }
            }
            RequirementDeclaration::Explicit {
                archive,
                family_version,
                parts,
                ..
            } => {
                merge(state, family_version);
                match parts {
                    ExplicitParts::PlatformDefault => {
                        state.require_all(self.platform.default_libraries());
                    }
                    ExplicitParts::Listed(parts) => {
                        for (library, jar) in parts {
                            state.require(library);
                            if let Some(entry) = jar {
                                state.set_location(library, Location::in_archive(&archive, entry));
                            }
                        }
                    }
                }
            }
        }
    }
}

fn merge(state: &mut ResolutionState, version: Version) {
    if state.merge(Some(version)) {
        tracing::debug!(%version, "merged family version raised");
    }
}

/// Validate `MCKT-*` attributes. `Ok(None)` when the archive declares nothing.
pub fn parse_explicit(
    archive: &Path,
    attributes: &ManifestAttributes,
) -> Result<Option<RequirementDeclaration>, ResolveError> {
    let Some(raw_manifest_version) = attributes.get(ATTR_MANIFEST_VERSION) else {
        return Ok(None);
    };
    let manifest_version = raw_manifest_version
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|version| *version <= MANIFEST_VERSION)
        .ok_or_else(|| ResolveError::UnsupportedManifestVersion {
            archive: archive.to_path_buf(),
            value: raw_manifest_version.to_string(),
        })?;

    let raw_family = attributes
        .get(ATTR_FAMILY_VERSION)
        .ok_or_else(|| ResolveError::MissingFamilyVersion {
            archive: archive.to_path_buf(),
        })?;
    let family_version =
        Version::parse(raw_family.trim()).ok_or_else(|| ResolveError::UnparsableFamilyVersion {
            archive: archive.to_path_buf(),
            value: raw_family.to_string(),
        })?;

    let parts = match attributes.get(ATTR_PARTS) {
        None => ExplicitParts::PlatformDefault,
        Some(raw_parts) => {
            let names: Vec<&str> = raw_parts.split(',').map(str::trim).collect();
            let jars: Vec<Option<String>> = match attributes.get(ATTR_JARS) {
                None => vec![None; names.len()],
                Some(raw_jars) => raw_jars
                    .split(',')
                    .map(str::trim)
                    .map(|jar| (!jar.is_empty()).then(|| jar.to_string()))
                    .collect(),
            };
            if jars.len() != names.len() {
                return Err(ResolveError::PartsJarsMismatch {
                    archive: archive.to_path_buf(),
                    parts: names.len(),
                    jars: jars.len(),
                });
            }
            let listed = names
                .into_iter()
                .zip(jars)
                .map(|(name, jar)| {
                    LibraryKind::by_name(name)
                        .map(|library| (library, jar))
                        .ok_or_else(|| ResolveError::UnknownLibrary {
                            archive: archive.to_path_buf(),
                            name: name.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ExplicitParts::Listed(listed)
        }
    };

    Ok(Some(RequirementDeclaration::Explicit {
        archive: archive.to_path_buf(),
        manifest_version,
        family_version,
        parts,
    }))
}
