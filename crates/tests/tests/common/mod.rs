#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use resolver_core::{PlatformTier, ResolverConfig};
use tiny_http::{Response, Server};
use url::Url;
use zip::write::{FileOptions, ZipWriter};


/// Write a plugin jar with the given entries and optional main-section manifest lines.
/// Every entry holds a bare class-file magic.
pub fn write_jar(path: &Path, entries: &[&str], manifest: Option<&str>) -> Result<PathBuf> {
    let entries: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|entry| (*entry, b"\xca\xfe\xba\xbe".to_vec()))
        .collect();
    write_jar_with(path, &entries, manifest)
}

/// Like [`write_jar`] with explicit entry contents.
pub fn write_jar_with(
    path: &Path,
    entries: &[(&str, Vec<u8>)],
    manifest: Option<&str>,
) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default();
    if let Some(manifest) = manifest {
        zip.start_file("META-INF/MANIFEST.MF", options)?;
        zip.write_all(b"Manifest-Version: 1.0\r\n")?;
        for line in manifest.lines() {
            zip.write_all(line.as_bytes())?;
            zip.write_all(b"\r\n")?;
        }
        zip.write_all(b"\r\n")?;
    }
    for (entry, bytes) in entries {
        zip.start_file(*entry, options)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(path.to_path_buf())
}

/// Maven-layout repository served over HTTP. Every path answers with
/// `artifact:<path>` unless it contains one of the `missing` fragments.
pub struct FakeRepository {
    pub base: Url,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeRepository {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

pub fn body_for(path: &str) -> Vec<u8> {
    format!("artifact:{path}").into_bytes()
}

/// `None` when the sandbox forbids binding a local port.
pub fn start_repository(missing: &[&str]) -> Result<Option<FakeRepository>> {
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            eprintln!("skipping http repository test: {err}");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let addr = listener.local_addr()?;
    let server =
        Server::from_listener(listener, None).map_err(|err| anyhow!("server error: {err}"))?;
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    let missing: Vec<String> = missing.iter().map(|m| m.to_string()).collect();
    thread::spawn(move || {
        while let Ok(request) = server.recv() {
            let path = request.url().trim_start_matches('/').to_string();
            seen.lock().push(path.clone());
            let response = if missing.iter().any(|m| path.contains(m.as_str())) {
                Response::from_data(b"not found".to_vec()).with_status_code(404)
            } else {
                Response::from_data(body_for(&path))
            };
            let _ = request.respond(response);
        }
    });

    Ok(Some(FakeRepository {
        base: Url::parse(&format!("http://{addr}/maven2/"))?,
        requests,
    }))
}

pub fn config(root: &Path, repository: &FakeRepository) -> ResolverConfig {
    ResolverConfig {
        user_home: root.join("home"),
        plugin_dirs: vec![root.join("game/mods")],
        cache_dir: root.join("cache"),
        repository: repository.base.clone(),
        platform: PlatformTier::Jdk8,
        download_timeout: Some(Duration::from_secs(30)),
    }
}

/// Drop a jar into the Gradle module cache under `home`.
pub fn seed_gradle(home: &Path, group: &str, artifact: &str, version: &str) -> Result<PathBuf> {
    let dir = home
        .join(".gradle/caches/modules-2/files-2.1")
        .join(group)
        .join(artifact)
        .join(version)
        .join("0d6b1f0a9c");
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{artifact}-{version}.jar"));
    fs::write(&path, b"gradle copy")?;
    Ok(path)
}
