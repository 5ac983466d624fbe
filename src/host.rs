//! Host capabilities
//!
//! The presentation layer plugs into the library through two interfaces:
//! a [`StylePolicy`] that builds style sets for new windows, and a
//! [`Presenter`] that receives outbound notifications from the interpreter
//! thread. Both are injected at startup; the core never names a concrete
//! rendering implementation.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{FileRefPrompt, LibraryState, StyleSet, WindowType};

/// Builds the style set for each window type
pub trait StylePolicy: Send + Sync {
    fn styleset(&self, wintype: WindowType) -> StyleSet;
}

/// Font-size based styles for hosts without their own policy
#[derive(Debug, Clone)]
pub struct DefaultStyles {
    pub font_family: String,
    pub font_size: f64,
}

impl DefaultStyles {
    pub fn new(font_family: impl Into<String>, font_size: f64) -> Self {
        Self {
            font_family: font_family.into(),
            font_size,
        }
    }
}

impl Default for DefaultStyles {
    fn default() -> Self {
        Self::new("serif", 13.333)
    }
}

impl StylePolicy for DefaultStyles {
    fn styleset(&self, wintype: WindowType) -> StyleSet {
        StyleSet::for_window_type(wintype, &self.font_family, self.font_size)
    }
}

/// Outbound notifications to the presentation side.
///
/// Called on the interpreter thread with no coordinator lock held. An
/// implementation should hand the data over and return quickly.
pub trait Presenter: Send + Sync {
    /// A new snapshot is ready
    fn library_state_changed(&self, _state: Arc<LibraryState>) {}

    /// The program has exited; restart or tear down
    fn vm_exited(&self) {}

    /// Show a file chooser and answer with `accept_event_file_select`
    fn file_prompt_pending(&self, _prompt: &FileRefPrompt) {}

    /// Start, change or stop (`None`) the timer
    fn timer_interval_changed(&self, _interval: Option<Duration>) {}
}

/// Presenter that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}
