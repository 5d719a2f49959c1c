//! Deferred navigation to the login view.
//!
//! A redirect is a spawned tokio task that sleeps for the configured delay
//! and then calls the `Navigator`. The returned handle can be cancelled or
//! awaited, and tests drive it with a paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::ui::Navigator;

#[derive(Clone)]
pub struct RedirectScheduler {
    navigator: Arc<dyn Navigator>,
    route: String,
    delay: Duration,
}

impl RedirectScheduler {
    pub fn new(navigator: Arc<dyn Navigator>, route: impl Into<String>, delay: Duration) -> Self {
        Self {
            navigator,
            route: route.into(),
            delay,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule(&self) -> ScheduledRedirect {
        let navigator = self.navigator.clone();
        let route = self.route.clone();
        let delay = self.delay;
        debug!(%route, ?delay, "login redirect scheduled");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator.redirect_to(&route);
        });
        ScheduledRedirect { handle }
    }
}

#[derive(Debug)]
pub struct ScheduledRedirect {
    handle: JoinHandle<()>,
}

impl ScheduledRedirect {
    /// Drop the redirect if it has not fired yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the redirect to fire. Returns `false` if it was cancelled.
    pub async fn wait(self) -> bool {
        self.handle.await.is_ok()
    }
}
