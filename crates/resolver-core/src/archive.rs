//! Plugin archives: entry lookup, manifest attributes and raw entry bytes.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Entries larger than this are treated as malformed. Manifests and marker classes
/// are a few kilobytes at most.
const MAX_ENTRY_BYTES: u64 = 16 * 1024 * 1024;

/// A plugin archive as handed to the requirement collector.
pub trait PluginArchive {
    /// Path of the archive file, used to build in-archive locations.
    fn path(&self) -> &Path;

    fn contains(&self, entry: &str) -> bool;

    /// Main-section manifest attributes; empty when the archive has no manifest.
    fn attributes(&mut self) -> io::Result<ManifestAttributes>;

    fn read_entry(&mut self, entry: &str) -> io::Result<Vec<u8>>;
}

/// Main-section attributes of a JAR manifest. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAttributes {
    values: BTreeMap<String, String>,
}

impl ManifestAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse the main section of a manifest: `Name: value` lines, continuation
    /// lines starting with a single space, terminated by the first blank line.
    pub fn parse(raw: &str) -> Self {
        let mut attributes = Self::default();
        let mut current: Option<(String, String)> = None;
        for line in raw.split("\r\n").flat_map(|l| l.split(['\r', '\n'])) {
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(rest);
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                attributes.insert(&name, value);
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    current = Some((name.trim().to_string(), value.to_string()));
                }
                None => tracing::debug!(line, "ignoring malformed manifest line"),
            }
        }
        if let Some((name, value)) = current {
            attributes.insert(&name, value);
        }
        attributes
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ManifestAttributes {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut attributes = Self::default();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

/// `.jar`/`.zip` plugin archive backed by the `zip` crate.
pub struct JarArchive {
    path: PathBuf,
    entries: HashSet<String>,
    archive: ZipArchive<File>,
}

impl JarArchive {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(zip_to_io)?;
        let entries = archive.file_names().map(str::to_string).collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            archive,
        })
    }
}

impl PluginArchive for JarArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    fn attributes(&mut self) -> io::Result<ManifestAttributes> {
        if !self.contains(MANIFEST_PATH) {
            return Ok(ManifestAttributes::default());
        }
        let bytes = self.read_entry(MANIFEST_PATH)?;
        let text = String::from_utf8(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        Ok(ManifestAttributes::parse(&text))
    }

    fn read_entry(&mut self, entry: &str) -> io::Result<Vec<u8>> {
        // The size recorded in the archive is not trusted for allocation.
        let file = self.archive.by_name(entry).map_err(zip_to_io)?;
        let mut bytes = Vec::new();
        file.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > MAX_ENTRY_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry `{entry}` exceeds {MAX_ENTRY_BYTES} bytes"),
            ));
        }
        Ok(bytes)
    }
}

fn zip_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(err) => err,
        ZipError::FileNotFound => io::Error::new(io::ErrorKind::NotFound, "no such archive entry"),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Plugin directories for a game directory: `mods` and, when known, `mods/<mc-version>`.
pub fn plugin_dirs(game_dir: &Path, mc_version: Option<&str>) -> Vec<PathBuf> {
    let mods = game_dir.join("mods");
    let mut dirs = vec![mods.clone()];
    if let Some(version) = mc_version {
        dirs.push(mods.join(version));
    }
    dirs
}

/// List `*.jar` and `*.zip` files directly inside each directory, sorted by name
/// within a directory. Missing or unreadable directories are skipped.
pub fn discover_archives(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), error = %err, "plugin directory not readable");
                continue;
            }
        };
        let mut archives: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_archive_name(path))
            .collect();
        archives.sort();
        found.extend(archives);
    }
    found
}

fn is_archive_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(".jar") || name.ends_with(".zip"))
        .unwrap_or(false)
}
