//! Interpreter-side session
//!
//! A [`Session`] pairs the [`Library`] with the shared [`Coordinator`]. It is
//! owned by the interpreter thread, which is the only place `select` may
//! block. The last-wait timestamp used for stall detection lives here, so
//! only the interpreter thread ever touches it.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::coordinator::{Coordinator, Wake};
use super::Event;
use crate::core::{FileMode, Library, LibraryState, Tag};
use crate::error::{strict_warning, GlkError, Result};

/// Default stall threshold for [`Session::tick`]
const DEFAULT_STALL: Duration = Duration::from_millis(500);

/// The interpreter's handle on the library and the coordinator
pub struct Session {
    library: Library,
    coordinator: Arc<Coordinator>,
    last_wait: Instant,
    stall_threshold: Duration,
}

impl Session {
    pub fn new(library: Library, coordinator: Arc<Coordinator>) -> Self {
        Self {
            library,
            coordinator,
            last_wait: Instant::now(),
            stall_threshold: DEFAULT_STALL,
        }
    }

    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn into_library(self) -> Library {
        self.library
    }

    /// Take a snapshot and hand it to the presentation side
    pub fn publish(&mut self) -> Arc<LibraryState> {
        let state = Arc::new(self.library.clone_state());
        self.coordinator.store_latest(Arc::clone(&state));
        self.coordinator
            .presenter()
            .library_state_changed(Arc::clone(&state));
        state
    }

    /// Publish the current state, then block until an event arrives.
    ///
    /// Layout changes and view updates are serviced while waiting. A UI
    /// event answering an outdated request is dropped and the wait goes on.
    /// Fails with `ExitRequested` once the presentation side asks to exit.
    pub fn select(&mut self) -> Result<Event> {
        self.publish();
        loop {
            let wake = self.coordinator.wait_next();
            if let Some(event) = self.service(wake)? {
                self.last_wait = Instant::now();
                return Ok(event);
            }
        }
    }

    /// Service pending layout and timer work without blocking.
    ///
    /// Returns a `None` event when nothing is pending. UI events are never
    /// taken here; they stay queued for the next `select`.
    pub fn select_poll(&mut self) -> Result<Event> {
        let mut serviced = false;
        let event = loop {
            match self.coordinator.poll_next() {
                None => break Event::none(),
                Some(wake) => {
                    serviced = true;
                    if let Some(event) = self.service(wake)? {
                        break event;
                    }
                }
            }
        };
        if serviced {
            self.publish();
        }
        self.last_wait = Instant::now();
        Ok(event)
    }

    fn service(&mut self, wake: Wake) -> Result<Option<Event>> {
        match wake {
            Wake::Exit => {
                tracing::info!("exit requested");
                Err(GlkError::ExitRequested)
            }
            Wake::Size(bounds) => {
                tracing::debug!("frame size {}x{}", bounds.width, bounds.height);
                self.library.set_bounds(bounds);
                self.publish();
                Ok(Some(Event::arrange(self.library.root())))
            }
            Wake::Metrics => {
                self.library.rebuild_stylesets();
                self.publish();
                Ok(Some(Event::arrange(self.library.root())))
            }
            Wake::Refresh { full } => {
                self.refresh(full);
                Ok(None)
            }
            Wake::Timer => {
                if self.library.timer_interval().is_some() {
                    Ok(Some(Event::timer()))
                } else {
                    tracing::debug!("timer fired while disabled");
                    Ok(None)
                }
            }
            Wake::Event(ui) => match self.library.apply_ui_event(&ui) {
                Ok(event) => Ok(Some(event)),
                Err(err) if err.is_benign() => {
                    tracing::debug!("dropping event: {}", err);
                    Ok(None)
                }
                Err(err) => {
                    strict_warning(self.library.settings().strict, &err);
                    Ok(None)
                }
            },
        }
    }

    fn refresh(&mut self, full: bool) {
        if full {
            let reissued = self.library.dirty_all_data();
            for (win, id) in reissued {
                tracing::debug!("window {} now waits on request {}", win, id);
            }
        }
        self.publish();
    }

    /// Publish a pending view update or full refresh if the interpreter has
    /// been busy for longer than the stall threshold. Long-running programs
    /// call this between `select`s; returns whether a snapshot was published.
    pub fn tick(&mut self) -> bool {
        if self.last_wait.elapsed() < self.stall_threshold {
            return false;
        }
        let Some(full) = self.coordinator.take_refresh_request() else {
            return false;
        };
        tracing::debug!("interpreter stalled, publishing");
        self.refresh(full);
        self.last_wait = Instant::now();
        true
    }

    /// Start (or with `0`, stop) timer events every `millis` milliseconds
    pub fn request_timer_events(&mut self, millis: u32) {
        self.library.set_timer_interval(millis);
        let interval = self
            .library
            .timer_interval()
            .map(|ms| Duration::from_millis(u64::from(ms)));
        if interval.is_none() {
            self.coordinator.clear_timer();
        }
        self.coordinator.presenter().timer_interval_changed(interval);
    }

    /// Ask the presentation side for a file name and build a file reference.
    ///
    /// Blocks until the prompt is answered. A canceled prompt yields `None`.
    pub fn fileref_create_by_prompt(
        &mut self,
        usage_bits: u32,
        mode: FileMode,
        rock: u32,
    ) -> Result<Option<Tag>> {
        let prompt = self.library.begin_file_prompt(usage_bits, mode);
        self.publish();
        self.coordinator.begin_file_prompt();
        self.coordinator.presenter().file_prompt_pending(&prompt);

        let answer = match self.coordinator.wait_file_answer() {
            Ok(answer) => answer,
            Err(err) => {
                self.library.finish_file_prompt(None, rock);
                return Err(err);
            }
        };
        self.last_wait = Instant::now();
        Ok(self.library.finish_file_prompt(answer, rock))
    }

    /// Cancel a line request, keeping whatever the player had typed so far
    pub fn cancel_line_event(&mut self, win: Tag) -> Result<Option<Event>> {
        self.library.window(win)?;
        let partial = self.coordinator.editing_text(win);
        self.library.cancel_line_event(win, &partial)
    }

    /// The program is done: publish the final state and refuse events
    fn finish(&mut self) {
        self.library.set_vm_exited();
        self.publish();
        self.coordinator.set_vm_exited();
        self.coordinator.presenter().vm_exited();
    }
}

impl Deref for Session {
    type Target = Library;

    fn deref(&self) -> &Library {
        &self.library
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Library {
        &mut self.library
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("library", &self.library)
            .field("stall_threshold", &self.stall_threshold)
            .finish()
    }
}

/// Run `program` on a dedicated interpreter thread.
///
/// When the program returns, the session is marked exited and the thread
/// waits for a restart or an exit request. A restart clears the library
/// and runs the program again with the same coordinator. The session is
/// handed back when the thread ends.
pub fn spawn_worker<F>(mut session: Session, mut program: F) -> std::io::Result<JoinHandle<Session>>
where
    F: FnMut(&mut Session) -> Result<()> + Send + 'static,
{
    std::thread::Builder::new()
        .name("glk-interpreter".to_string())
        .spawn(move || {
            loop {
                match program(&mut session) {
                    Ok(()) => tracing::info!("program finished"),
                    Err(GlkError::ExitRequested) => tracing::info!("program stopped on request"),
                    Err(err) => tracing::error!("program failed: {}", err),
                }
                session.finish();
                if !session.coordinator.wait_for_restart() {
                    break;
                }
                session.library.clear_for_restart();
                session.last_wait = Instant::now();
                tracing::info!("restarting program");
            }
            session
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::tests::library;
    use crate::core::{Division, SplitDir, SplitMethod, WindowType};
    use crate::event::{EventType, UiEvent};
    use crate::host::NullPresenter;

    fn session() -> (Session, Tag) {
        let mut lib = library();
        let win = lib
            .open_window(
                None,
                SplitMethod::new(SplitDir::Above, Division::Fixed),
                0,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        let coord = Arc::new(Coordinator::new(Arc::new(NullPresenter)));
        (Session::new(lib, coord), win)
    }

    fn idle(coord: &Coordinator) {
        assert!(coord.wait_until_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_select_returns_line_event() {
        let (mut session, win) = session();
        let id = session.request_line_event(win, false, 80, None).unwrap();
        let coord = Arc::clone(session.coordinator());

        let worker = std::thread::spawn(move || {
            let event = session.select();
            (session, event)
        });
        idle(&coord);
        assert!(coord.accept_event(UiEvent::Line {
            win,
            request_id: id,
            text: "look".into(),
        }));
        let (session, event) = worker.join().unwrap();
        let event = event.unwrap();
        assert_eq!(event.event_type, EventType::LineInput);
        assert_eq!(event.line.as_deref(), Some("look"));
        assert!(session.window(win).unwrap().input.is_idle());
    }

    #[test]
    fn test_stale_event_dropped_after_full_refresh() {
        let (mut session, win) = session();
        let first = session.request_line_event(win, false, 80, None).unwrap();
        let coord = Arc::clone(session.coordinator());

        let worker = std::thread::spawn(move || {
            let event = session.select();
            (session, event)
        });
        coord.request_full_refresh();
        idle(&coord);
        assert!(coord.accept_event(UiEvent::Line {
            win,
            request_id: first,
            text: "stale".into(),
        }));
        idle(&coord);
        coord.request_exit();

        let (session, event) = worker.join().unwrap();
        assert!(matches!(event, Err(GlkError::ExitRequested)));
        let input = &session.window(win).unwrap().input;
        assert!(input.line_request());
        assert_eq!(input.request_id(), first + 1);
    }

    #[test]
    fn test_size_change_yields_arrange() {
        let (mut session, win) = session();
        let coord = Arc::clone(session.coordinator());
        coord.set_frame_size(crate::core::Rect::new(0.0, 0.0, 200.0, 100.0));
        let event = session.select().unwrap();
        assert_eq!(event.event_type, EventType::Arrange);
        assert_eq!(event.win, Some(win));
        assert_eq!(session.window(win).unwrap().bbox.width, 200.0);
        assert_eq!(coord.latest_state().unwrap().bounds.width, 200.0);
    }

    #[test]
    fn test_select_poll_does_not_block() {
        let (mut session, _) = session();
        assert!(session.select_poll().unwrap().is_none());

        session.request_timer_events(50);
        session.coordinator().fire_timer();
        assert_eq!(session.select_poll().unwrap().event_type, EventType::Timer);

        session.request_timer_events(0);
        session.coordinator().fire_timer();
        assert!(session.select_poll().unwrap().is_none());
    }

    #[test]
    fn test_tick_waits_for_stall() {
        let (session, _) = session();
        let mut session = session.with_stall_threshold(Duration::ZERO);
        assert!(!session.tick());
        session.coordinator().request_view_update();
        assert!(session.tick());
        assert!(!session.tick());

        let mut patient = session.with_stall_threshold(Duration::from_secs(3600));
        patient.coordinator().request_view_update();
        assert!(!patient.tick());
    }

    #[test]
    fn test_tick_services_full_refresh() {
        let (session, win) = session();
        let mut session = session.with_stall_threshold(Duration::ZERO);
        let first = session.request_line_event(win, false, 80, None).unwrap();
        session.coordinator().request_full_refresh();

        assert!(session.tick());
        assert_eq!(session.window(win).unwrap().input.request_id(), first + 1);
        let state = session.coordinator().latest_state().unwrap();
        assert_eq!(state.window(win).unwrap().input_request_id, first + 1);
        assert!(!session.tick());
    }

    #[test]
    fn test_cancel_line_uses_partial_text() {
        let (mut session, win) = session();
        session.request_line_event(win, false, 80, None).unwrap();
        session.coordinator().note_editing_text(win, "go nor");
        let event = session.cancel_line_event(win).unwrap().unwrap();
        assert_eq!(event.line.as_deref(), Some("go nor"));
        assert!(session.cancel_line_event(win).unwrap().is_none());
    }

    #[test]
    fn test_worker_restart_resets_tags() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let coord = Arc::new(Coordinator::new(Arc::new(NullPresenter)));
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = spawn_worker(
            Session::new(library(), Arc::clone(&coord)),
            move |s: &mut Session| {
                let win = s.open_window(
                    None,
                    SplitMethod::new(SplitDir::Above, Division::Fixed),
                    0,
                    WindowType::TextBuffer,
                    7,
                )?;
                assert_eq!(win, Tag::new(1));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        idle(&coord);
        assert!(coord.vm_exited());
        assert!(coord.accept_event_restart());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !(runs.load(Ordering::SeqCst) == 2 && coord.vm_exited()) {
            assert!(Instant::now() < deadline, "program did not restart");
            std::thread::sleep(Duration::from_millis(1));
        }
        coord.request_exit();
        let session = handle.join().unwrap();
        assert_eq!(session.window_rock(Tag::new(1)).unwrap(), 7);
        assert_eq!(session.window_count(), 1);
    }
}
