use anyhow::Result;

use crate::location::Location;

/// Makes resolved artifacts visible to the running program.
pub trait LoaderSink {
    /// `locations` arrive in catalog order. `exclusions` are package prefixes that
    /// must not be served by any class source other than these locations.
    fn accept(&mut self, locations: &[Location], exclusions: &[&str]) -> Result<()>;
}

/// Sink that only remembers what it was handed.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub locations: Vec<Location>,
    pub exclusions: Vec<String>,
    pub calls: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoaderSink for RecordingSink {
    fn accept(&mut self, locations: &[Location], exclusions: &[&str]) -> Result<()> {
        self.locations.extend_from_slice(locations);
        self.exclusions
            .extend(exclusions.iter().map(|prefix| prefix.to_string()));
        self.calls += 1;
        Ok(())
    }
}
