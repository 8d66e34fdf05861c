use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter used to discard results of superseded lookups.
///
/// Every lookup captures [`FetchGeneration::advance`] at start and checks
/// [`FetchGeneration::is_current`] before touching shared state.
#[derive(Clone, Debug, Default)]
pub struct FetchGeneration {
    value: Arc<AtomicU64>,
}

impl FetchGeneration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation and returns its value.
    pub fn advance(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}
