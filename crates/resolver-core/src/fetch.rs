use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::cache::PrivateCache;
use crate::error::FetchError;
use crate::library::LibraryKind;
use crate::version::Version;

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// Source of artifact bytes addressed by Maven repository path.
pub trait RemoteRepository: Send + Sync {
    fn describe(&self, path: &str) -> String;

    fn open(&self, path: &str) -> Result<Box<dyn Read>, FetchError>;
}

/// Plain unauthenticated HTTP(S) GET against a repository base URL.
///
/// Requests have no deadline unless `timeout` is given; stdlib artifacts are large
/// enough that a fixed client default cuts off slow mirrors mid-body.
pub struct HttpRepository {
    base: Url,
    client: Client,
}

impl HttpRepository {
    pub fn new(base: Url, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Http {
                url: base.to_string(),
                source,
            })?;
        Ok(Self {
            base: with_trailing_slash(base),
            client,
        })
    }

    pub fn maven_central() -> Result<Self, FetchError> {
        let base = Url::parse(MAVEN_CENTRAL).map_err(|source| FetchError::Url {
            path: MAVEN_CENTRAL.to_string(),
            source,
        })?;
        Self::new(base, None)
    }

    fn url_for(&self, path: &str) -> Result<Url, FetchError> {
        self.base.join(path).map_err(|source| FetchError::Url {
            path: path.to_string(),
            source,
        })
    }
}

impl RemoteRepository for HttpRepository {
    fn describe(&self, path: &str) -> String {
        self.url_for(path)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.base, path))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read>, FetchError> {
        let url = self.url_for(path)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        Ok(Box::new(response))
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Downloads artifacts into the private cache when every cache backend missed.
pub struct Fetcher {
    repository: Box<dyn RemoteRepository>,
    cache: PrivateCache,
}

impl Fetcher {
    pub fn new(repository: impl RemoteRepository + 'static, cache: PrivateCache) -> Self {
        Self {
            repository: Box::new(repository),
            cache,
        }
    }

    pub fn cache(&self) -> &PrivateCache {
        &self.cache
    }

    pub fn fetch(&self, library: LibraryKind, version: &Version) -> Result<PathBuf, FetchError> {
        let path = library.repository_path(version);
        tracing::info!(%library, %version, url = %self.repository.describe(&path), "downloading");
        let mut body = self.repository.open(&path)?;
        let stored = self.cache.store(library, version, &mut body)?;
        tracing::info!(%library, %version, path = %stored.display(), "cached download");
        Ok(stored)
    }
}
