use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use url::Url;

use crate::archive::plugin_dirs;
use crate::fetch::MAVEN_CENTRAL;
use crate::library::PlatformTier;

const CACHE_SUBDIR: &str = ".cache/mckt-resolver/kotlin-stdlib";
const DEFAULT_JAVA_SPEC: &str = "1.8";

/// Environment-driven configuration for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub user_home: PathBuf,
    pub plugin_dirs: Vec<PathBuf>,
    pub cache_dir: PathBuf,
    pub repository: Url,
    pub platform: PlatformTier,
    /// Per-request deadline for downloads; `None` waits as long as the server keeps the
    /// connection open.
    pub download_timeout: Option<Duration>,
}

impl ResolverConfig {
    /// Build a [`ResolverConfig`] by reading the documented MCKT_* variables.
    pub fn from_env() -> Result<Self> {
        let user_home = env::var_os("MCKT_HOME")
            .or_else(|| env::var_os("HOME"))
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("cannot determine user home; set MCKT_HOME"))?;

        let game_dir = env::var_os("MCKT_GAME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mc_version = env::var("MCKT_MC_VERSION").ok();

        let cache_dir = env::var_os("MCKT_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_cache_dir(&user_home));

        let repository_raw =
            env::var("MCKT_REPOSITORY_URL").unwrap_or_else(|_| MAVEN_CENTRAL.to_string());
        let repository = Url::parse(&repository_raw)
            .with_context(|| format!("MCKT_REPOSITORY_URL `{repository_raw}` is not a valid URL"))?;

        let java_spec =
            env::var("MCKT_JAVA_SPEC").unwrap_or_else(|_| DEFAULT_JAVA_SPEC.to_string());
        let download_timeout =
            parse_download_timeout(env::var("MCKT_DOWNLOAD_TIMEOUT_SECS").ok().as_deref())?;

        Ok(Self {
            plugin_dirs: plugin_dirs(&game_dir, mc_version.as_deref()),
            user_home,
            cache_dir,
            repository,
            platform: PlatformTier::from_java_spec(&java_spec),
            download_timeout,
        })
    }

    /// Defaults rooted at `user_home`, scanning `<game_dir>/mods`.
    pub fn for_home(user_home: impl Into<PathBuf>, game_dir: &Path) -> Result<Self> {
        let user_home = user_home.into();
        Ok(Self {
            plugin_dirs: plugin_dirs(game_dir, None),
            cache_dir: default_cache_dir(&user_home),
            user_home,
            repository: Url::parse(MAVEN_CENTRAL).context("default repository URL")?,
            platform: PlatformTier::from_java_spec(DEFAULT_JAVA_SPEC),
            download_timeout: None,
        })
    }
}

pub fn default_cache_dir(user_home: &Path) -> PathBuf {
    user_home.join(CACHE_SUBDIR)
}

/// Seconds from `MCKT_DOWNLOAD_TIMEOUT_SECS`; unset or `0` disables the deadline.
fn parse_download_timeout(raw: Option<&str>) -> Result<Option<Duration>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("MCKT_DOWNLOAD_TIMEOUT_SECS `{raw}` is not a number of seconds"))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
