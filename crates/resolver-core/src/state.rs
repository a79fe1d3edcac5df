use std::collections::{BTreeMap, BTreeSet};

use crate::library::LibraryKind;
use crate::location::Location;
use crate::version::Version;

/// Accumulator owned by a single resolution run.
#[derive(Debug, Default, Clone)]
pub struct ResolutionState {
    version: Option<Version>,
    required: BTreeSet<LibraryKind>,
    resolved: BTreeMap<LibraryKind, Location>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn required(&self) -> &BTreeSet<LibraryKind> {
        &self.required
    }

    pub fn resolved(&self) -> &BTreeMap<LibraryKind, Location> {
        &self.resolved
    }

    pub fn require(&mut self, kind: LibraryKind) {
        self.required.insert(kind);
    }

    pub fn require_all(&mut self, kinds: impl IntoIterator<Item = LibraryKind>) {
        self.required.extend(kinds);
    }

    pub fn set_location(&mut self, kind: LibraryKind, location: Location) {
        self.resolved.insert(kind, location);
    }

    /// Replace the merged version when `candidate` is strictly newer.
    ///
    /// Locations resolved so far were resolved for the old version, so they are
    /// dropped whenever the version moves. Returns whether it moved.
    pub fn merge(&mut self, candidate: Option<Version>) -> bool {
        if candidate <= self.version {
            return false;
        }
        self.version = candidate;
        self.resolved.clear();
        true
    }

    /// Libraries to resolve: everything required plus anything already mapped.
    pub fn candidates(&self) -> BTreeSet<LibraryKind> {
        self.required
            .iter()
            .chain(self.resolved.keys())
            .copied()
            .collect()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<Version>,
        BTreeSet<LibraryKind>,
        BTreeMap<LibraryKind, Location>,
    ) {
        (self.version, self.required, self.resolved)
    }
}
