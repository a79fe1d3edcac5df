use parking_lot::Mutex;

/// Implementation stamp recorded after a successful run.
pub const RESOLVER_VERSION: f64 = 1.0;

/// Remembers whether a resolver of at least [`RESOLVER_VERSION`] already ran.
/// Callers own it and decide how long it lives.
pub trait ResolutionGuard {
    fn recorded(&self) -> Option<f64>;

    fn record(&self, stamp: f64);

    fn already_resolved(&self) -> bool {
        self.recorded()
            .is_some_and(|stamp| stamp >= RESOLVER_VERSION)
    }
}

#[derive(Debug, Default)]
pub struct MemoryGuard {
    stamp: Mutex<Option<f64>>,
}

impl MemoryGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResolutionGuard for MemoryGuard {
    fn recorded(&self) -> Option<f64> {
        *self.stamp.lock()
    }

    fn record(&self, stamp: f64) {
        *self.stamp.lock() = Some(stamp);
    }
}

/// Guard that never short-circuits; every run resolves from scratch.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysResolve;

impl ResolutionGuard for AlwaysResolve {
    fn recorded(&self) -> Option<f64> {
        None
    }

    fn record(&self, _stamp: f64) {}
}
