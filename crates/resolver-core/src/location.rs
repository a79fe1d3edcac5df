use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

/// Where a resolved library artifact comes from for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// A copy bundled inside a plugin archive.
    InArchive { archive: PathBuf, entry: String },
    /// An existing file in one of the local caches.
    Cached { path: PathBuf },
    /// A file written by the fetcher during this run.
    Downloaded { path: PathBuf },
}

impl Location {
    pub fn in_archive(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self::InArchive {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    /// Filesystem path backing this location (the archive itself for bundled copies).
    pub fn path(&self) -> &Path {
        match self {
            Self::InArchive { archive, .. } => archive,
            Self::Cached { path } | Self::Downloaded { path } => path,
        }
    }

    /// `jar:file:///archive.jar!/entry` or `file:///path`.
    pub fn to_uri(&self) -> String {
        match self {
            Self::InArchive { archive, entry } => {
                format!("jar:{}!/{}", file_uri(archive), entry_uri_path(entry))
            }
            Self::Cached { path } | Self::Downloaded { path } => file_uri(path),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

fn file_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    Url::from_file_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|_| format!("file://{}", absolute.display()))
}

/// Percent-encode each `/`-separated segment of an in-archive entry name.
fn entry_uri_path(entry: &str) -> String {
    let trimmed = entry.trim_start_matches('/');
    let Ok(mut scratch) = Url::parse("file:///") else {
        return trimmed.to_string();
    };
    if let Ok(mut segments) = scratch.path_segments_mut() {
        segments.clear().extend(trimmed.split('/'));
    }
    scratch.path().trim_start_matches('/').to_string()
}
