//! Static catalog of the Kotlin library family artifacts.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::version::Version;

/// Artifacts that make up the library family.
///
/// Declaration order is the canonical order: derived `Ord` follows it, so any
/// `BTreeMap`/`BTreeSet` keyed by `LibraryKind` iterates in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum LibraryKind {
    Stdlib,
    StdlibJdk7,
    StdlibJdk8,
    Reflect,
    JetbrainsAnnotations,
}

/// Per-variant catalog data.
#[derive(Debug)]
pub struct LibrarySpec {
    pub name: &'static str,
    pub detector: &'static str,
    pub group: &'static str,
    pub artifact: &'static str,
    /// Fixed version used instead of the negotiated family version.
    pub pinned_version: Option<&'static str>,
}

const STDLIB: LibrarySpec = LibrarySpec {
    name: "kotlin-stdlib",
    detector: "kotlin/Pair.class",
    group: "org.jetbrains.kotlin",
    artifact: "kotlin-stdlib",
    pinned_version: None,
};

const STDLIB_JDK7: LibrarySpec = LibrarySpec {
    name: "kotlin-stdlib-jdk7",
    detector: "kotlin/internal/jdk7/JDK7PlatformImplementations.class",
    group: "org.jetbrains.kotlin",
    artifact: "kotlin-stdlib-jdk7",
    pinned_version: None,
};

const STDLIB_JDK8: LibrarySpec = LibrarySpec {
    name: "kotlin-stdlib-jdk8",
    detector: "kotlin/internal/jdk8/JDK8PlatformImplementations.class",
    group: "org.jetbrains.kotlin",
    artifact: "kotlin-stdlib-jdk8",
    pinned_version: None,
};

const REFLECT: LibrarySpec = LibrarySpec {
    name: "kotlin-reflect",
    detector: "kotlin/reflect/ReflectJvmMapping.class",
    group: "org.jetbrains.kotlin",
    artifact: "kotlin-reflect",
    pinned_version: None,
};

// Kotlin has depended on annotations 13.0 for its whole history; the family
// version never applies here.
const JETBRAINS_ANNOTATIONS: LibrarySpec = LibrarySpec {
    name: "jetbrains-annotations",
    detector: "org/jetbrains/annotations/Nullable.class",
    group: "org.jetbrains",
    artifact: "annotations",
    pinned_version: Some("13.0"),
};

/// Class whose `CURRENT` field names the bundled stdlib version.
pub const VERSION_MARKER_CLASS: &str = "kotlin/KotlinVersion.class";
pub const VERSION_MARKER_FIELD: &str = "CURRENT";
/// Used when the bundled marker class cannot be evaluated.
pub const FALLBACK_VERSION: &str = "1.1.0";
/// Package prefixes that must only come from the resolved artifacts.
pub const FAMILY_PACKAGE_PREFIXES: &[&str] = &["kotlin."];

impl LibraryKind {
    pub const ALL: [LibraryKind; 5] = [
        LibraryKind::Stdlib,
        LibraryKind::StdlibJdk7,
        LibraryKind::StdlibJdk8,
        LibraryKind::Reflect,
        LibraryKind::JetbrainsAnnotations,
    ];

    /// The family's primary library; detecting it triggers version recovery.
    pub const PRIMARY: LibraryKind = LibraryKind::Stdlib;

    pub fn spec(self) -> &'static LibrarySpec {
        match self {
            Self::Stdlib => &STDLIB,
            Self::StdlibJdk7 => &STDLIB_JDK7,
            Self::StdlibJdk8 => &STDLIB_JDK8,
            Self::Reflect => &REFLECT,
            Self::JetbrainsAnnotations => &JETBRAINS_ANNOTATIONS,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn detector(self) -> &'static str {
        self.spec().detector
    }

    pub fn group(self) -> &'static str {
        self.spec().group
    }

    pub fn artifact(self) -> &'static str {
        self.spec().artifact
    }

    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Version string to use for this artifact given the negotiated family version.
    pub fn version_of(self, family: &Version) -> String {
        match self.spec().pinned_version {
            Some(pinned) => pinned.to_string(),
            None => family.to_string(),
        }
    }

    /// `<artifact>-<version>.jar`
    pub fn file_name(self, family: &Version) -> String {
        format!("{}-{}.jar", self.artifact(), self.version_of(family))
    }

    /// Maven repository layout: `group/with/slashes/<artifact>/<version>/<artifact>-<version>.jar`.
    pub fn repository_path(self, family: &Version) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group().replace('.', "/"),
            self.artifact(),
            self.version_of(family),
            self.file_name(family)
        )
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<LibraryKind> for &'static str {
    fn from(kind: LibraryKind) -> Self {
        kind.name()
    }
}

impl FromStr for LibraryKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Self::by_name(value.trim()).ok_or_else(|| anyhow::anyhow!("unknown library `{value}`"))
    }
}

/// Runtime platform level deciding which compatibility layers are needed by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTier {
    /// Anything that is neither Java 7 nor Java 8 (older runtimes and 9+).
    Baseline,
    Jdk7,
    Jdk8,
}

impl PlatformTier {
    /// Map a `java.specification.version` value onto a tier.
    pub fn from_java_spec(spec: &str) -> Self {
        match spec.trim() {
            "1.8" => Self::Jdk8,
            "1.7" => Self::Jdk7,
            _ => Self::Baseline,
        }
    }

    pub fn default_libraries(self) -> BTreeSet<LibraryKind> {
        let libs: &[LibraryKind] = match self {
            Self::Baseline => &[LibraryKind::Stdlib],
            Self::Jdk7 => &[LibraryKind::Stdlib, LibraryKind::StdlibJdk7],
            Self::Jdk8 => &[
                LibraryKind::Stdlib,
                LibraryKind::StdlibJdk7,
                LibraryKind::StdlibJdk8,
            ],
        };
        libs.iter().copied().collect()
    }
}
