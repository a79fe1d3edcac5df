mod common;

use std::fs;

use anyhow::Result;
use resolver_core::digest::verify_against_sidecar;
use resolver_core::guard::ResolutionGuard;
use resolver_core::{
    LibraryKind, Location, MemoryGuard, RecordingSink, ResolveError, Resolver, RunOutcome,
    discover_archives,
};

use common::class_file::{delegating_kotlin_version_classes, kotlin_version_class};
use common::{body_for, config, seed_gradle, start_repository, write_jar, write_jar_with};

const EXPLICIT_1_4_30: &str = "MCKT-MF-Version: 1\nMCKT-KT-Version: 1.4.30";

fn resolved(outcome: RunOutcome) -> resolver_core::ResolvedSet {
    match outcome {
        RunOutcome::Resolved(set) => set,
        RunOutcome::AlreadyResolved => panic!("expected a fresh resolution"),
    }
}

#[test]
fn explicit_default_set_is_downloaded_then_served_from_cache() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let cfg = config(temp.path(), &repo);
    let mods = &cfg.plugin_dirs[0];
    write_jar(&mods.join("a-bundled.jar"), &["kotlin/Pair.class"], None)?;
    write_jar(&mods.join("b-explicit.jar"), &[], Some(EXPLICIT_1_4_30))?;

    let archives = discover_archives(&cfg.plugin_dirs);
    assert_eq!(archives.len(), 2);

    let mut sink = RecordingSink::new();
    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut sink)?);
    assert_eq!(set.version.map(|v| v.to_string()).as_deref(), Some("1.4.30"));
    assert_eq!(
        set.libraries.keys().copied().collect::<Vec<_>>(),
        vec![
            LibraryKind::Stdlib,
            LibraryKind::StdlibJdk7,
            LibraryKind::StdlibJdk8
        ]
    );
    assert_eq!(sink.calls, 1);
    assert_eq!(sink.exclusions, vec!["kotlin.".to_string()]);
    assert_eq!(sink.locations, set.locations());

    let requests = repo.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].ends_with("org/jetbrains/kotlin/kotlin-stdlib/1.4.30/kotlin-stdlib-1.4.30.jar"));

    for location in &sink.locations {
        let Location::Downloaded { path } = location else {
            panic!("expected a download, got {location:?}");
        };
        assert!(path.starts_with(&cfg.cache_dir));
        assert!(verify_against_sidecar(path)?);
    }
    let stdlib = cfg.cache_dir.join("kotlin-stdlib-1.4.30.jar");
    let served = requests[0].clone();
    assert_eq!(fs::read(&stdlib)?, body_for(&served));

    let mut sink = RecordingSink::new();
    let again = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut sink)?);
    assert_eq!(repo.requests().len(), 3);
    assert_eq!(
        again.libraries[&LibraryKind::Stdlib],
        Location::Cached { path: stdlib }
    );
    Ok(())
}

#[test]
fn gradle_cache_beats_private_cache_and_download() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let mut cfg = config(temp.path(), &repo);
    cfg.platform = resolver_core::PlatformTier::Baseline;
    write_jar(
        &cfg.plugin_dirs[0].join("explicit.jar"),
        &[],
        Some(EXPLICIT_1_4_30),
    )?;
    let gradle = seed_gradle(&cfg.user_home, "org.jetbrains.kotlin", "kotlin-stdlib", "1.4.30")?;

    let mut sink = RecordingSink::new();
    let archives = discover_archives(&cfg.plugin_dirs);
    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut sink)?);
    assert_eq!(
        set.libraries[&LibraryKind::Stdlib],
        Location::Cached { path: gradle }
    );
    assert!(repo.requests().is_empty());
    Ok(())
}

#[test]
fn explicit_jar_inside_plugin_is_used_as_is() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let cfg = config(temp.path(), &repo);
    let plugin = write_jar(
        &cfg.plugin_dirs[0].join("reflective.jar"),
        &["lib/reflect.jar"],
        Some(
            "MCKT-MF-Version: 1\nMCKT-KT-Version: 1.3.72\n\
             MCKT-KT-Parts: kotlin-stdlib,kotlin-reflect\nMCKT-KT-Jars: ,lib/reflect.jar",
        ),
    )?;

    let mut sink = RecordingSink::new();
    let archives = discover_archives(&cfg.plugin_dirs);
    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut sink)?);

    assert_eq!(
        set.libraries.keys().copied().collect::<Vec<_>>(),
        vec![LibraryKind::Stdlib, LibraryKind::Reflect]
    );
    assert!(matches!(sink.locations[0], Location::Downloaded { .. }));
    assert_eq!(
        sink.locations[1],
        Location::in_archive(&plugin, "lib/reflect.jar")
    );
    let uri = sink.locations[1].to_uri();
    assert!(uri.starts_with("jar:file://"));
    assert!(uri.ends_with("reflective.jar!/lib/reflect.jar"));

    let requests = repo.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("kotlin-stdlib/1.3.72/"));
    Ok(())
}

#[test]
fn pinned_annotations_ignore_family_version() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let cfg = config(temp.path(), &repo);
    write_jar(
        &cfg.plugin_dirs[0].join("annotated.jar"),
        &["org/jetbrains/annotations/Nullable.class"],
        Some("MCKT-MF-Version: 1\nMCKT-KT-Version: 1.5.0\nMCKT-KT-Parts: kotlin-stdlib"),
    )?;

    let mut sink = RecordingSink::new();
    let archives = discover_archives(&cfg.plugin_dirs);
    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut sink)?);

    assert_eq!(
        set.libraries[&LibraryKind::JetbrainsAnnotations].path(),
        cfg.cache_dir.join("jetbrains-annotations-13.0.jar")
    );
    assert!(
        repo.requests()
            .iter()
            .any(|path| path.ends_with("org/jetbrains/annotations/13.0/annotations-13.0.jar"))
    );
    Ok(())
}

#[test]
fn corrupted_download_is_fetched_again() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let mut cfg = config(temp.path(), &repo);
    cfg.platform = resolver_core::PlatformTier::Baseline;
    write_jar(
        &cfg.plugin_dirs[0].join("explicit.jar"),
        &[],
        Some(EXPLICIT_1_4_30),
    )?;
    let archives = discover_archives(&cfg.plugin_dirs);

    resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut RecordingSink::new())?);
    let stdlib = cfg.cache_dir.join("kotlin-stdlib-1.4.30.jar");
    fs::write(&stdlib, b"truncated")?;
    assert!(!verify_against_sidecar(&stdlib)?);

    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut RecordingSink::new())?);
    assert_eq!(
        set.libraries[&LibraryKind::Stdlib],
        Location::Downloaded {
            path: stdlib.clone()
        }
    );
    assert_eq!(repo.requests().len(), 2);
    assert!(verify_against_sidecar(&stdlib)?);
    Ok(())
}

#[test]
fn unsupported_manifest_schema_aborts_before_sink() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let cfg = config(temp.path(), &repo);
    write_jar(&cfg.plugin_dirs[0].join("ok.jar"), &[], Some(EXPLICIT_1_4_30))?;
    write_jar(
        &cfg.plugin_dirs[0].join("zz-future.jar"),
        &[],
        Some("MCKT-MF-Version: 2\nMCKT-KT-Version: 1.9.0"),
    )?;

    let guard = MemoryGuard::new();
    let mut sink = RecordingSink::new();
    let archives = discover_archives(&cfg.plugin_dirs);
    let err = Resolver::new(&cfg)?
        .run(&archives, &guard, &mut sink)
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnsupportedManifestVersion { .. }));
    assert_eq!(sink.calls, 0);
    assert_eq!(guard.recorded(), None);
    assert!(repo.requests().is_empty());
    Ok(())
}

#[test]
fn failed_download_registers_nothing() -> Result<()> {
    let Some(repo) = start_repository(&["kotlin-stdlib-jdk8"])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let cfg = config(temp.path(), &repo);
    write_jar(
        &cfg.plugin_dirs[0].join("explicit.jar"),
        &[],
        Some(EXPLICIT_1_4_30),
    )?;

    let guard = MemoryGuard::new();
    let mut sink = RecordingSink::new();
    let archives = discover_archives(&cfg.plugin_dirs);
    let err = Resolver::new(&cfg)?
        .run(&archives, &guard, &mut sink)
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Fetch {
            library: LibraryKind::StdlibJdk8,
            ..
        }
    ));
    assert_eq!(sink.calls, 0);
    assert_eq!(guard.recorded(), None);
    assert!(!cfg.cache_dir.join("kotlin-stdlib-jdk8-1.4.30.jar").exists());
    Ok(())
}

#[test]
fn guard_skips_second_run() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let cfg = config(temp.path(), &repo);
    write_jar(
        &cfg.plugin_dirs[0].join("explicit.jar"),
        &[],
        Some(EXPLICIT_1_4_30),
    )?;

    let resolver = Resolver::new(&cfg)?;
    let guard = MemoryGuard::new();
    let mut sink = RecordingSink::new();
    let archives = discover_archives(&cfg.plugin_dirs);
    resolved(resolver.run(&archives, &guard, &mut sink)?);
    let downloads = repo.requests().len();

    assert_eq!(
        resolver.run(&archives, &guard, &mut sink)?,
        RunOutcome::AlreadyResolved
    );
    assert_eq!(sink.calls, 1);
    assert_eq!(repo.requests().len(), downloads);
    Ok(())
}

#[test]
fn bundled_stdlib_version_is_read_from_marker_class() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let mut cfg = config(temp.path(), &repo);
    cfg.platform = resolver_core::PlatformTier::Baseline;
    write_jar_with(
        &cfg.plugin_dirs[0].join("shaded.jar"),
        &[
            ("kotlin/Pair.class", b"\xca\xfe\xba\xbe".to_vec()),
            ("kotlin/KotlinVersion.class", kotlin_version_class([1, 6, 21])),
        ],
        None,
    )?;
    write_jar(
        &cfg.plugin_dirs[0].join("older.jar"),
        &[],
        Some("MCKT-MF-Version: 1\nMCKT-KT-Version: 1.4.30"),
    )?;

    let archives = discover_archives(&cfg.plugin_dirs);
    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut RecordingSink::new())?);
    assert_eq!(set.version.map(|v| v.to_string()).as_deref(), Some("1.6.21"));
    assert_eq!(
        set.libraries[&LibraryKind::Stdlib],
        Location::Downloaded {
            path: cfg.cache_dir.join("kotlin-stdlib-1.6.21.jar")
        }
    );
    let requests = repo.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].ends_with("kotlin-stdlib/1.6.21/kotlin-stdlib-1.6.21.jar"));
    Ok(())
}

#[test]
fn bundled_stdlib_with_factory_initializer_reports_its_version() -> Result<()> {
    let Some(repo) = start_repository(&[])? else {
        return Ok(());
    };
    let temp = tempfile::tempdir()?;
    let mut cfg = config(temp.path(), &repo);
    cfg.platform = resolver_core::PlatformTier::Baseline;
    let (marker, helper) = delegating_kotlin_version_classes([1, 9, 20]);
    write_jar_with(
        &cfg.plugin_dirs[0].join("modern.jar"),
        &[
            ("kotlin/Pair.class", b"\xca\xfe\xba\xbe".to_vec()),
            ("kotlin/KotlinVersion.class", marker),
            ("kotlin/KotlinVersionCurrentValue.class", helper),
        ],
        None,
    )?;

    let archives = discover_archives(&cfg.plugin_dirs);
    let set = resolved(Resolver::new(&cfg)?.run(&archives, &MemoryGuard::new(), &mut RecordingSink::new())?);
    assert_eq!(set.version.map(|v| v.to_string()).as_deref(), Some("1.9.20"));
    assert!(
        repo.requests()
            .iter()
            .any(|path| path.ends_with("kotlin-stdlib/1.9.20/kotlin-stdlib-1.9.20.jar"))
    );
    Ok(())
}
