//! Transient UI feedback the facade emits.
//!
//! # Design
//! The facade never draws anything; it calls into a `Feedback` and a
//! `Navigator` supplied by the host. The loading indicator is shared by every
//! in-flight call, so `LoadingIndicator` reference-counts it: the host sees one
//! show when the first call starts and one hide when the last call settles.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    /// Text only.
    None,
    Success,
    Error,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToastKind::None => "none",
            ToastKind::Success => "success",
            ToastKind::Error => "error",
        })
    }
}

pub trait Feedback: Send + Sync {
    fn show_loading(&self, title: &str);
    fn hide_loading(&self);
    fn show_toast(&self, text: &str, kind: ToastKind);
}

pub trait Navigator: Send + Sync {
    fn redirect_to(&self, route: &str);
}

/// Headless feedback: every signal becomes a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn show_loading(&self, title: &str) {
        info!(title, "loading shown");
    }

    fn hide_loading(&self) {
        info!("loading hidden");
    }

    fn show_toast(&self, text: &str, kind: ToastKind) {
        info!(text, %kind, "toast");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect_to(&self, route: &str) {
        info!(route, "redirect");
    }
}

pub struct LoadingIndicator {
    feedback: Arc<dyn Feedback>,
    title: String,
    active: Mutex<usize>,
}

impl LoadingIndicator {
    pub fn new(feedback: Arc<dyn Feedback>, title: impl Into<String>) -> Self {
        Self {
            feedback,
            title: title.into(),
            active: Mutex::new(0),
        }
    }

    /// Number of calls currently holding the indicator.
    pub fn active(&self) -> usize {
        *self.active.lock()
    }

    pub fn acquire(&self) -> LoadingGuard<'_> {
        let mut active = self.active.lock();
        if *active == 0 {
            self.feedback.show_loading(&self.title);
        }
        *active += 1;
        LoadingGuard { indicator: self }
    }

    fn release(&self) {
        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.feedback.hide_loading();
        }
    }
}

/// Holds the loading indicator until dropped.
#[must_use = "the indicator is released as soon as the guard is dropped"]
pub struct LoadingGuard<'a> {
    indicator: &'a LoadingIndicator,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.indicator.release();
    }
}
