use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

/// Length of a raw SHA-1 digest.
pub const SHA1_LEN: usize = 20;

/// Writer that feeds every byte it forwards into a SHA-1 accumulator.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha1,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
        }
    }

    pub fn finish(self) -> (W, [u8; SHA1_LEN]) {
        (self.inner, self.hasher.finalize().into())
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Stream a file through SHA-1.
pub fn sha1_file(path: &Path) -> io::Result<[u8; SHA1_LEN]> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut sink = DigestWriter::new(io::sink());
    io::copy(&mut reader, &mut sink)?;
    Ok(sink.finish().1)
}

/// `<artifact>.sha1` next to the artifact.
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".sha1");
    PathBuf::from(name)
}

/// Lowercase hex, no trailing newline.
pub fn encode_sidecar(digest: &[u8; SHA1_LEN]) -> String {
    hex::encode(digest)
}

/// Decode a sidecar's contents. No whitespace is stripped: the writer never emits any.
pub fn decode_sidecar(raw: &[u8]) -> Option<[u8; SHA1_LEN]> {
    let mut digest = [0u8; SHA1_LEN];
    hex::decode_to_slice(raw, &mut digest).ok()?;
    Some(digest)
}

/// Read and decode the sidecar stored next to `artifact`.
pub fn read_sidecar(artifact: &Path) -> io::Result<Option<[u8; SHA1_LEN]>> {
    let mut raw = Vec::with_capacity(SHA1_LEN * 2);
    File::open(sidecar_path(artifact))?.read_to_end(&mut raw)?;
    Ok(decode_sidecar(&raw))
}

/// Whether `artifact` exists and its bytes match the stored sidecar digest.
pub fn verify_against_sidecar(artifact: &Path) -> io::Result<bool> {
    let Some(expected) = read_sidecar(artifact)? else {
        return Ok(false);
    };
    Ok(sha1_file(artifact)? == expected)
}

/// Test-only seeding; the private cache writes sidecars through a temp file.
#[cfg(test)]
pub(crate) fn write_sidecar(artifact: &Path, digest: &[u8; SHA1_LEN]) -> io::Result<()> {
    std::fs::write(sidecar_path(artifact), encode_sidecar(digest))
}
