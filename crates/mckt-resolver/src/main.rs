use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use resolver_core::{
    EntryStatus, MemoryGuard, PlatformTier, PrivateCache, RecordingSink, ResolvedSet, Resolver,
    ResolverConfig, RunOutcome, discover_archives, plugin_dirs,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "mckt-resolver", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the library family for every plugin archive and print the locations
    Resolve {
        #[command(flatten)]
        plugins: PluginArgs,

        /// Private cache directory for downloaded artifacts
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// Maven-layout repository used for downloads
        #[arg(long, value_name = "URL")]
        repository: Option<Url>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Classpath)]
        format: OutputFormat,
    },
    /// Only collect requirements and print the negotiated version
    Scan {
        #[command(flatten)]
        plugins: PluginArgs,
    },
    /// Check every cached artifact against its SHA-1 sidecar
    VerifyCache {
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct PluginArgs {
    /// Game directory containing `mods/`
    #[arg(long, value_name = "DIR")]
    game_dir: Option<PathBuf>,

    /// Game version; also scans `mods/<version>/`
    #[arg(long, value_name = "VERSION")]
    mc_version: Option<String>,

    /// Explicit plugin directories (repeatable); replaces the game directory layout
    #[arg(long = "mods-dir", value_name = "DIR")]
    mods_dirs: Vec<PathBuf>,

    /// Java specification version of the target runtime (e.g. 1.8)
    #[arg(long, value_name = "SPEC")]
    java_spec: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Classpath,
    Json,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        tracing::error!(error = %format!("{err:#}"), "resolver failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Resolve {
            plugins,
            cache_dir,
            repository,
            format,
        } => {
            let mut cfg = load_config(&plugins)?;
            if let Some(cache_dir) = cache_dir {
                cfg.cache_dir = cache_dir;
            }
            if let Some(repository) = repository {
                cfg.repository = repository;
            }
            resolve(&cfg, format)
        }
        Command::Scan { plugins } => scan(&load_config(&plugins)?),
        Command::VerifyCache { cache_dir } => {
            let cache_dir = match cache_dir {
                Some(dir) => dir,
                None => ResolverConfig::from_env()?.cache_dir,
            };
            verify_cache(&PrivateCache::new(cache_dir))
        }
    }
}

fn load_config(plugins: &PluginArgs) -> Result<ResolverConfig> {
    let mut cfg = ResolverConfig::from_env()?;
    if !plugins.mods_dirs.is_empty() {
        cfg.plugin_dirs = plugins.mods_dirs.clone();
    } else if plugins.game_dir.is_some() || plugins.mc_version.is_some() {
        let game_dir = plugins
            .game_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        cfg.plugin_dirs = plugin_dirs(&game_dir, plugins.mc_version.as_deref());
    }
    if let Some(spec) = plugins.java_spec.as_deref() {
        cfg.platform = PlatformTier::from_java_spec(spec);
    }
    Ok(cfg)
}

fn resolve(cfg: &ResolverConfig, format: OutputFormat) -> Result<()> {
    let archives = discover_archives(&cfg.plugin_dirs);
    tracing::info!(
        archives = archives.len(),
        cache = %cfg.cache_dir.display(),
        repository = %cfg.repository,
        "starting resolution"
    );

    let resolver = Resolver::new(cfg).context("failed to build resolver")?;
    let guard = MemoryGuard::new();
    let mut sink = RecordingSink::new();
    let resolved = match resolver.run(&archives, &guard, &mut sink)? {
        RunOutcome::Resolved(resolved) => resolved,
        RunOutcome::AlreadyResolved => bail!("fresh guard reported an earlier resolution"),
    };

    match format {
        OutputFormat::Classpath => {
            for location in &sink.locations {
                println!("{location}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report(&resolved))?),
    }
    Ok(())
}

fn report(resolved: &ResolvedSet) -> serde_json::Value {
    json!({
        "version": resolved.version,
        "libraries": resolved.libraries,
        "locations": resolved
            .locations()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "exclusions": resolved.exclusions(),
    })
}

fn scan(cfg: &ResolverConfig) -> Result<()> {
    let archives = discover_archives(&cfg.plugin_dirs);
    let resolver = Resolver::new(cfg).context("failed to build resolver")?;
    let state = resolver.scan(&archives)?;
    let summary = json!({
        "archives": archives.len(),
        "version": state.version(),
        "required": state.required(),
        "bundled": state.resolved(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn verify_cache(cache: &PrivateCache) -> Result<()> {
    let entries = match cache.entries() {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(cache = %cache.root().display(), "private cache does not exist yet");
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to list private cache {}", cache.root().display())
            });
        }
    };

    let mut corrupt = 0usize;
    for path in entries {
        let status = cache
            .inspect(&path)
            .with_context(|| format!("failed to inspect {}", path.display()))?;
        let label = match status {
            EntryStatus::Ok => "ok",
            EntryStatus::Corrupt => {
                corrupt += 1;
                "corrupt"
            }
            EntryStatus::MissingDigest => "missing-digest",
        };
        println!("{label}\t{}", path.display());
    }
    if corrupt > 0 {
        tracing::warn!(corrupt, "corrupt entries will be re-downloaded on the next resolve");
    }
    Ok(())
}
