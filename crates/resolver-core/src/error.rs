//! Fatal conditions that abort a resolution run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::library::LibraryKind;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported MCKT manifest version `{value}` in {}", archive.display())]
    UnsupportedManifestVersion { archive: PathBuf, value: String },

    #[error("invalid MCKT manifest in {}: MCKT-KT-Version is not specified", archive.display())]
    MissingFamilyVersion { archive: PathBuf },

    #[error(
        "invalid MCKT manifest in {}: MCKT-KT-Version is not parsable: `{value}`",
        archive.display()
    )]
    UnparsableFamilyVersion { archive: PathBuf, value: String },

    #[error(
        "invalid MCKT manifest in {}: MCKT-KT-Jars and MCKT-KT-Parts conflict ({parts} parts, {jars} jars)",
        archive.display()
    )]
    PartsJarsMismatch {
        archive: PathBuf,
        parts: usize,
        jars: usize,
    },

    #[error("unknown library key `{name}` in {}", archive.display())]
    UnknownLibrary { archive: PathBuf, name: String },

    #[error("invalid version `{value}`")]
    InvalidVersion { value: String },

    #[error("no family version could be negotiated for {library}")]
    NoVersion { library: LibraryKind },

    #[error("failed to fetch {library} {version}: {source}")]
    Fetch {
        library: LibraryKind,
        version: String,
        #[source]
        source: FetchError,
    },

    #[error("loader sink rejected resolved locations: {0}")]
    Sink(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid remote path `{path}`")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
