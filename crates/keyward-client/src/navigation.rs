//! One-way navigation side effects.
//!
//! Navigation abandons the in-flight call chain, so it is modelled as a
//! side effect handed to a [`Navigator`] rather than as a return value.

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

/// Where the user agent is being sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// The re-authentication entry point (the login page).
    Reauthenticate,
    /// The authorization endpoint, with the full authorization request.
    Authorize(Url),
}

/// Performs navigations on behalf of the core.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: NavigationTarget);
}

/// Shared navigator handle.
pub type SharedNavigator = Arc<dyn Navigator>;

/// Navigator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn navigate(&self, target: NavigationTarget) {
        tracing::debug!(?target, "Navigation ignored");
    }
}

/// Navigator that remembers every target it was sent to.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<NavigationTarget>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets in the order they were navigated to.
    pub fn targets(&self) -> Vec<NavigationTarget> {
        self.targets.lock().clone()
    }

    /// Number of `Reauthenticate` navigations.
    pub fn reauthentications(&self) -> usize {
        self.targets
            .lock()
            .iter()
            .filter(|t| **t == NavigationTarget::Reauthenticate)
            .count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: NavigationTarget) {
        self.targets.lock().push(target);
    }
}
