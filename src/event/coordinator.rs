//! Cross-thread coordinator
//!
//! One mutex and one condition variable guard everything the interpreter
//! and presentation threads share. The presentation side posts events and
//! layout changes; the interpreter drains them inside `select`. At most one
//! UI event is buffered: the first writer wins and later ones are refused
//! until the interpreter waits again.
//!
//! Pending items are drained in a fixed order: size change, metrics change,
//! view update, timer, then the queued UI event. An exit request preempts
//! all of them.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::UiEvent;
use crate::core::{LibraryState, Rect, Tag};
use crate::error::{GlkError, Result};
use crate::host::Presenter;

/// Everything shared between the two threads
#[derive(Debug, Default)]
struct Shared {
    /// The interpreter is blocked in `select`
    waiting: bool,
    /// The single buffered UI event
    event: Option<UiEvent>,
    update_requested: bool,
    full_refresh: bool,
    timer_fired: bool,
    size_change: Option<Rect>,
    metrics_changed: bool,
    exit_requested: bool,
    restart_requested: bool,
    vm_exited: bool,
    /// The interpreter is blocked on a file prompt
    awaiting_file: bool,
    /// Answer to the file prompt; inner `None` means canceled
    file_answer: Option<Option<String>>,
    latest: Option<Arc<LibraryState>>,
    /// Partial line input per window, for canceling line requests
    editing: HashMap<Tag, String>,
}

/// What woke the interpreter
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Wake {
    Exit,
    Size(Rect),
    Metrics,
    Refresh { full: bool },
    Timer,
    Event(UiEvent),
}

/// Shared coordinator between the interpreter and presentation threads
pub struct Coordinator {
    shared: Mutex<Shared>,
    cond: Condvar,
    presenter: Arc<dyn Presenter>,
}

impl Coordinator {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            shared: Mutex::new(Shared::default()),
            cond: Condvar::new(),
            presenter,
        }
    }

    /// Lock the shared state; a panicked holder does not poison it for us
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Shared>) -> MutexGuard<'a, Shared> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }

    // Presentation side

    /// Offer a UI event to a waiting interpreter.
    ///
    /// Returns `false` (and drops the event) if the interpreter is not
    /// waiting or an event is already queued.
    pub fn accept_event(&self, event: UiEvent) -> bool {
        let mut shared = self.lock();
        if !shared.waiting || shared.event.is_some() || shared.vm_exited || shared.exit_requested {
            tracing::debug!("event for window {} refused", event.win());
            return false;
        }
        shared.event = Some(event);
        self.cond.notify_all();
        true
    }

    /// Whether `accept_event` would take an event right now
    pub fn accepting_event(&self) -> bool {
        let shared = self.lock();
        shared.waiting && shared.event.is_none() && !shared.vm_exited && !shared.exit_requested
    }

    /// Whether an event is queued and not yet consumed
    pub fn has_queued_event(&self) -> bool {
        self.lock().event.is_some()
    }

    /// Answer a pending file prompt; `None` cancels it
    pub fn accept_event_file_select(&self, filename: Option<String>) -> bool {
        let mut shared = self.lock();
        if !shared.awaiting_file || shared.file_answer.is_some() {
            return false;
        }
        shared.file_answer = Some(filename);
        self.cond.notify_all();
        true
    }

    pub fn accepting_event_file_select(&self) -> bool {
        let shared = self.lock();
        shared.awaiting_file && shared.file_answer.is_none()
    }

    /// Ask for a restart after the program has exited
    pub fn accept_event_restart(&self) -> bool {
        let mut shared = self.lock();
        if !shared.vm_exited {
            return false;
        }
        shared.restart_requested = true;
        self.cond.notify_all();
        true
    }

    /// Ask for a fresh snapshot
    pub fn request_view_update(&self) {
        let mut shared = self.lock();
        shared.update_requested = true;
        self.cond.notify_all();
    }

    /// The presentation side lost its state and needs everything again
    pub fn request_full_refresh(&self) {
        let mut shared = self.lock();
        shared.full_refresh = true;
        self.cond.notify_all();
    }

    /// New viewport; replaces any size change not yet drained
    pub fn set_frame_size(&self, bounds: Rect) {
        let mut shared = self.lock();
        shared.size_change = Some(bounds);
        self.cond.notify_all();
    }

    /// Fonts or spacing changed; style sets must be rebuilt
    pub fn note_metrics_changed(&self) {
        let mut shared = self.lock();
        shared.metrics_changed = true;
        self.cond.notify_all();
    }

    /// Called by the timer scheduler
    pub fn fire_timer(&self) {
        let mut shared = self.lock();
        shared.timer_fired = true;
        self.cond.notify_all();
    }

    /// Tear the interpreter down at its next wait
    pub fn request_exit(&self) {
        let mut shared = self.lock();
        shared.exit_requested = true;
        self.cond.notify_all();
    }

    /// Record the partial text of a line being edited
    pub fn note_editing_text(&self, win: Tag, text: impl Into<String>) {
        self.lock().editing.insert(win, text.into());
    }

    /// The most recently published snapshot
    pub fn latest_state(&self) -> Option<Arc<LibraryState>> {
        self.lock().latest.clone()
    }

    pub fn vm_exited(&self) -> bool {
        self.lock().vm_exited
    }

    /// Block until the interpreter is waiting with nothing left to drain,
    /// or the program has exited. Returns `false` on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut shared = self.lock();
        loop {
            let drained = shared.size_change.is_none()
                && !shared.metrics_changed
                && !shared.update_requested
                && !shared.full_refresh
                && shared.event.is_none();
            if (shared.waiting && drained) || shared.awaiting_file || shared.vm_exited {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(shared, timeout - elapsed)
                .unwrap_or_else(PoisonError::into_inner);
            shared = guard;
        }
    }

    // Interpreter side

    /// Enter the waiting state without blocking
    #[cfg(test)]
    pub(crate) fn begin_wait(&self) {
        let mut shared = self.lock();
        shared.waiting = true;
        self.cond.notify_all();
    }

    /// Block until something needs the interpreter.
    ///
    /// Waking ends the wait cycle atomically, so no second event can be
    /// accepted for it. The interpreter calls this again to keep waiting.
    pub(crate) fn wait_next(&self) -> Wake {
        let mut shared = self.lock();
        shared.waiting = true;
        self.cond.notify_all();
        loop {
            if let Some(wake) = Self::drain(&mut shared, true) {
                shared.waiting = false;
                self.cond.notify_all();
                return wake;
            }
            shared = self.wait(shared);
        }
    }

    /// Take the next pending item without blocking or waiting for UI events
    pub(crate) fn poll_next(&self) -> Option<Wake> {
        let mut shared = self.lock();
        let wake = Self::drain(&mut shared, false);
        if wake.is_some() {
            self.cond.notify_all();
        }
        wake
    }

    fn drain(shared: &mut Shared, with_events: bool) -> Option<Wake> {
        if shared.exit_requested {
            return Some(Wake::Exit);
        }
        if let Some(bounds) = shared.size_change.take() {
            return Some(Wake::Size(bounds));
        }
        if mem::take(&mut shared.metrics_changed) {
            return Some(Wake::Metrics);
        }
        if shared.update_requested || shared.full_refresh {
            shared.update_requested = false;
            let full = mem::take(&mut shared.full_refresh);
            return Some(Wake::Refresh { full });
        }
        if mem::take(&mut shared.timer_fired) {
            return Some(Wake::Timer);
        }
        if with_events {
            return shared.event.take().map(Wake::Event);
        }
        None
    }

    /// Consume a pending view update or full refresh request.
    ///
    /// Returns whether the refresh must be full, `None` if nothing was asked.
    pub(crate) fn take_refresh_request(&self) -> Option<bool> {
        let mut shared = self.lock();
        if !shared.update_requested && !shared.full_refresh {
            return None;
        }
        shared.update_requested = false;
        Some(mem::take(&mut shared.full_refresh))
    }

    pub(crate) fn clear_timer(&self) {
        self.lock().timer_fired = false;
    }

    pub(crate) fn store_latest(&self, state: Arc<LibraryState>) {
        self.lock().latest = Some(state);
    }

    pub(crate) fn editing_text(&self, win: Tag) -> String {
        self.lock().editing.remove(&win).unwrap_or_default()
    }

    /// Start waiting for a file prompt answer
    pub(crate) fn begin_file_prompt(&self) {
        let mut shared = self.lock();
        shared.awaiting_file = true;
        shared.file_answer = None;
        self.cond.notify_all();
    }

    /// Block until the prompt is answered
    pub(crate) fn wait_file_answer(&self) -> Result<Option<String>> {
        let mut shared = self.lock();
        loop {
            if shared.exit_requested {
                shared.awaiting_file = false;
                return Err(GlkError::ExitRequested);
            }
            if let Some(answer) = shared.file_answer.take() {
                shared.awaiting_file = false;
                self.cond.notify_all();
                return Ok(answer);
            }
            shared = self.wait(shared);
        }
    }

    /// The program has finished; refuse events until restarted
    pub(crate) fn set_vm_exited(&self) {
        let mut shared = self.lock();
        shared.vm_exited = true;
        shared.waiting = false;
        shared.event = None;
        shared.awaiting_file = false;
        self.cond.notify_all();
    }

    /// Block until a restart (`true`) or an exit request (`false`)
    pub(crate) fn wait_for_restart(&self) -> bool {
        let mut shared = self.lock();
        loop {
            if shared.exit_requested {
                return false;
            }
            if mem::take(&mut shared.restart_requested) {
                let latest = shared.latest.take();
                *shared = Shared {
                    latest,
                    ..Shared::default()
                };
                self.cond.notify_all();
                return true;
            }
            shared = self.wait(shared);
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("shared", &*self.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullPresenter;

    fn coordinator() -> Coordinator {
        Coordinator::new(Arc::new(NullPresenter))
    }

    fn char_event(id: u32) -> UiEvent {
        UiEvent::Char {
            win: Tag::new(1),
            request_id: id,
            ch: 'a' as u32,
        }
    }

    #[test]
    fn test_event_refused_when_not_waiting() {
        let coord = coordinator();
        assert!(!coord.accepting_event());
        assert!(!coord.accept_event(char_event(1)));
        assert!(!coord.has_queued_event());
    }

    #[test]
    fn test_first_writer_wins() {
        let coord = coordinator();
        coord.begin_wait();
        assert!(coord.accepting_event());
        assert!(coord.accept_event(char_event(1)));
        assert!(!coord.accepting_event());
        assert!(!coord.accept_event(char_event(2)));
        assert_eq!(coord.wait_next(), Wake::Event(char_event(1)));
        assert!(!coord.accepting_event());
    }

    #[test]
    fn test_drain_order() {
        let coord = coordinator();
        coord.begin_wait();
        coord.accept_event(char_event(1));
        coord.fire_timer();
        coord.request_view_update();
        coord.note_metrics_changed();
        let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        coord.set_frame_size(bounds);

        assert_eq!(coord.poll_next(), Some(Wake::Size(bounds)));
        assert_eq!(coord.poll_next(), Some(Wake::Metrics));
        assert_eq!(coord.poll_next(), Some(Wake::Refresh { full: false }));
        assert_eq!(coord.poll_next(), Some(Wake::Timer));
        assert_eq!(coord.poll_next(), None);
        assert_eq!(coord.wait_next(), Wake::Event(char_event(1)));
    }

    #[test]
    fn test_exit_preempts_everything() {
        let coord = coordinator();
        coord.begin_wait();
        coord.fire_timer();
        coord.request_exit();
        assert_eq!(coord.wait_next(), Wake::Exit);
        assert!(!coord.accept_event(char_event(1)));
    }

    #[test]
    fn test_not_accepting_once_exit_requested() {
        let coord = coordinator();
        coord.begin_wait();
        assert!(coord.accepting_event());
        coord.request_exit();
        assert!(!coord.accepting_event());
        assert!(!coord.accept_event(char_event(1)));
    }

    #[test]
    fn test_take_refresh_request() {
        let coord = coordinator();
        assert_eq!(coord.take_refresh_request(), None);
        coord.request_view_update();
        assert_eq!(coord.take_refresh_request(), Some(false));
        coord.request_view_update();
        coord.request_full_refresh();
        assert_eq!(coord.take_refresh_request(), Some(true));
        assert_eq!(coord.take_refresh_request(), None);
    }

    #[test]
    fn test_refresh_ends_wait_cycle() {
        let coord = coordinator();
        coord.begin_wait();
        coord.request_full_refresh();
        assert_eq!(coord.wait_next(), Wake::Refresh { full: true });
        assert!(!coord.accepting_event());
    }

    #[test]
    fn test_restart_only_after_exit() {
        let coord = coordinator();
        assert!(!coord.accept_event_restart());
        coord.set_vm_exited();
        assert!(!coord.accepting_event());
        assert!(coord.accept_event_restart());
        assert!(coord.wait_for_restart());
        assert!(!coord.vm_exited());
    }

    #[test]
    fn test_file_answer() {
        let coord = coordinator();
        assert!(!coord.accept_event_file_select(Some("x".into())));
        coord.begin_file_prompt();
        assert!(coord.accepting_event_file_select());
        assert!(coord.accept_event_file_select(Some("save1".into())));
        assert!(!coord.accept_event_file_select(None));
        assert_eq!(coord.wait_file_answer().unwrap(), Some("save1".to_string()));
        assert!(!coord.accepting_event_file_select());
    }

    #[test]
    fn test_editing_text_is_consumed() {
        let coord = coordinator();
        coord.note_editing_text(Tag::new(4), "go nor");
        assert_eq!(coord.editing_text(Tag::new(4)), "go nor");
        assert_eq!(coord.editing_text(Tag::new(4)), "");
    }

    #[test]
    fn test_wait_until_idle_times_out() {
        let coord = coordinator();
        assert!(!coord.wait_until_idle(Duration::from_millis(10)));
        coord.begin_wait();
        assert!(coord.wait_until_idle(Duration::from_millis(10)));
    }
}
