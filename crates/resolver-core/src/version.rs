use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ResolveError;

/// Version of the library family as a `major.minor.patch` triple.
///
/// The absent version is modelled as `Option<Version>`: `None` sorts below every
/// concrete version and is equal only to itself, which is exactly what
/// [`Option`]'s derived ordering provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `major.minor.patch` or `major.minor` (patch = 0). Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts = raw
            .split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            [major, minor, patch] => Some(Self::new(*major, *minor, *patch)),
            [major, minor] => Some(Self::new(*major, *minor, 0)),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl FromStr for Version {
    type Err = ResolveError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| ResolveError::InvalidVersion {
            value: raw.to_string(),
        })
    }
}

/// Compare two possibly-absent versions; absent is the minimum.
pub fn compare(a: Option<&Version>, b: Option<&Version>) -> Ordering {
    a.cmp(&b)
}
