use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::CacheBackend;
use crate::digest::{self, DigestWriter, SHA1_LEN};
use crate::error::FetchError;
use crate::library::LibraryKind;
use crate::version::Version;

/// Read/write cache owned by the resolver: `<root>/<library>-<version>.jar` plus a
/// `.sha1` sidecar holding the lowercase hex digest of the jar.
#[derive(Debug, Clone)]
pub struct PrivateCache {
    root: PathBuf,
}

/// Integrity state of a private cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Ok,
    Corrupt,
    MissingDigest,
}

impl PrivateCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, library: LibraryKind, version: &Version) -> PathBuf {
        self.root.join(format!(
            "{}-{}.jar",
            library.name(),
            library.version_of(version)
        ))
    }

    /// Check an existing entry against its sidecar.
    pub fn inspect(&self, artifact: &Path) -> io::Result<EntryStatus> {
        let Some(expected) = (match digest::read_sidecar(artifact) {
            Ok(expected) => expected,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(EntryStatus::MissingDigest);
            }
            Err(err) => return Err(err),
        }) else {
            return Ok(EntryStatus::Corrupt);
        };
        if digest::sha1_file(artifact)? == expected {
            Ok(EntryStatus::Ok)
        } else {
            Ok(EntryStatus::Corrupt)
        }
    }

    /// All `*.jar` files currently in the cache root, sorted.
    pub fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut jars = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "jar") {
                jars.push(path);
            }
        }
        jars.sort();
        Ok(jars)
    }

    /// Stream `source` into the entry for `library`/`version`, hashing in the same pass,
    /// then write the sidecar. Both files go through a temp file and a rename, so a
    /// failure never leaves a half-written jar under the final name.
    pub fn store(
        &self,
        library: LibraryKind,
        version: &Version,
        source: &mut dyn Read,
    ) -> Result<PathBuf, FetchError> {
        fs::create_dir_all(&self.root).map_err(|err| FetchError::io(&self.root, err))?;
        let target = self.path_for(library, version);

        let temp = NamedTempFile::new_in(&self.root).map_err(|err| FetchError::io(&self.root, err))?;
        let mut writer = DigestWriter::new(BufWriter::new(temp));
        io::copy(source, &mut writer).map_err(|err| FetchError::io(&target, err))?;
        let (buffered, sha1) = writer.finish();
        let temp = buffered
            .into_inner()
            .map_err(|err| FetchError::io(&target, err.into_error()))?;
        temp.persist(&target)
            .map_err(|err| FetchError::io(&target, err.error))?;

        write_sidecar_atomic(&self.root, &target, &sha1)?;
        Ok(target)
    }
}

fn write_sidecar_atomic(root: &Path, artifact: &Path, sha1: &[u8; SHA1_LEN]) -> Result<(), FetchError> {
    let sidecar = digest::sidecar_path(artifact);
    let mut temp = NamedTempFile::new_in(root).map_err(|err| FetchError::io(root, err))?;
    temp.write_all(digest::encode_sidecar(sha1).as_bytes())
        .map_err(|err| FetchError::io(&sidecar, err))?;
    temp.persist(&sidecar)
        .map_err(|err| FetchError::io(&sidecar, err.error))?;
    Ok(())
}

impl CacheBackend for PrivateCache {
    fn name(&self) -> &'static str {
        "private"
    }

    fn find(&self, library: LibraryKind, version: &Version) -> Option<PathBuf> {
        let artifact = self.path_for(library, version);
        if !artifact.is_file() {
            return None;
        }
        match self.inspect(&artifact) {
            Ok(EntryStatus::Ok) => Some(artifact),
            Ok(status) => {
                tracing::warn!(%library, %version, path = %artifact.display(), ?status, "private cache entry failed verification; will re-fetch");
                None
            }
            Err(err) => {
                tracing::warn!(%library, %version, path = %artifact.display(), error = %err, "private cache entry unreadable; will re-fetch");
                None
            }
        }
    }
}
