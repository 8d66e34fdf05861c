/// Why the host's location may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSignal {
    PushState,
    ReplaceState,
    PopState,
    /// Emitted by polling strategies that only observe the location string.
    LocationPoll,
}

pub type NavigationCallback = Box<dyn FnMut(NavigationSignal) + Send>;

/// A host that can announce client-side navigations.
///
/// Implementations decide how the signal is produced: wrapping the history
/// entry points, listening to native navigation events, or anything else.
pub trait NavigationSource {
    fn on_navigation_changed(&mut self, callback: NavigationCallback);
}
