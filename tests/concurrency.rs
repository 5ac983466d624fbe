//! Cross-thread behavior of the coordinator: racing producers, drain order
//! and shutdown.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use glk_bridge::core::{
    Division, Library, Rect, Settings, SplitDir, SplitMethod, Tag, WindowType,
};
use glk_bridge::error::GlkError;
use glk_bridge::event::{Coordinator, EventType, Session, UiEvent};
use glk_bridge::host::{DefaultStyles, NullPresenter};

const TIMEOUT: Duration = Duration::from_secs(5);

fn session_with_char_request() -> (Session, Tag, u32) {
    let mut lib = Library::new(Settings::default(), Arc::new(DefaultStyles::default()));
    lib.set_bounds(Rect::new(0.0, 0.0, 400.0, 300.0));
    let win = lib
        .open_window(
            None,
            SplitMethod::new(SplitDir::Above, Division::Fixed),
            0,
            WindowType::TextBuffer,
            0,
        )
        .unwrap();
    let id = lib.request_char_event(win, true).unwrap();
    let coord = Arc::new(Coordinator::new(Arc::new(NullPresenter)));
    (Session::new(lib, coord), win, id)
}

#[test]
fn test_racing_accept_event_has_one_winner() {
    for _ in 0..50 {
        let (mut session, win, id) = session_with_char_request();
        let coord = Arc::clone(session.coordinator());
        let worker = thread::spawn(move || {
            let first = session.select();
            (session, first)
        });
        assert!(coord.wait_until_idle(TIMEOUT));

        let barrier = Arc::new(Barrier::new(2));
        let racers: Vec<_> = ['a', 'b']
            .into_iter()
            .map(|ch| {
                let coord = Arc::clone(&coord);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let accepted = coord.accept_event(UiEvent::Char {
                        win,
                        request_id: id,
                        ch: u32::from(ch),
                    });
                    (ch, accepted)
                })
            })
            .collect();
        let results: Vec<(char, bool)> = racers.into_iter().map(|r| r.join().unwrap()).collect();

        let winners: Vec<char> = results.iter().filter(|(_, ok)| *ok).map(|(c, _)| *c).collect();
        assert_eq!(winners.len(), 1, "results: {:?}", results);

        let (session, first) = worker.join().unwrap();
        let event = first.unwrap();
        assert_eq!(event.event_type, EventType::CharInput);
        assert_eq!(event.val1, u32::from(winners[0]));

        // The loser was not buffered for a second return
        assert!(!coord.has_queued_event());
        assert!(session.window(win).unwrap().input.is_idle());
    }
}

#[test]
fn test_events_refused_outside_select() {
    let (session, win, id) = session_with_char_request();
    let coord = Arc::clone(session.coordinator());
    assert!(!coord.accepting_event());
    assert!(!coord.accept_event(UiEvent::Char {
        win,
        request_id: id,
        ch: u32::from('x'),
    }));
    assert!(!coord.has_queued_event());
}

#[test]
fn test_layout_changes_serviced_before_event() {
    let (mut session, win, id) = session_with_char_request();
    let coord = Arc::clone(session.coordinator());
    let worker = thread::spawn(move || {
        let mut seen = Vec::new();
        loop {
            match session.select() {
                Ok(event) => {
                    let done = event.event_type == EventType::CharInput;
                    seen.push(event.event_type);
                    if done {
                        break;
                    }
                }
                Err(e) => panic!("select failed: {}", e),
            }
        }
        seen
    });

    assert!(coord.wait_until_idle(TIMEOUT));
    assert!(coord.accept_event(UiEvent::Char {
        win,
        request_id: id,
        ch: u32::from('k'),
    }));
    coord.set_frame_size(Rect::new(0.0, 0.0, 300.0, 200.0));

    let seen = worker.join().unwrap();
    assert_eq!(seen.last(), Some(&EventType::CharInput));
    if seen.len() == 2 {
        assert_eq!(seen[0], EventType::Arrange);
    }
}

#[test]
fn test_exit_unblocks_select() {
    let (mut session, _, _) = session_with_char_request();
    let coord = Arc::clone(session.coordinator());
    let worker = thread::spawn(move || session.select());

    assert!(coord.wait_until_idle(TIMEOUT));
    coord.request_exit();
    assert!(matches!(worker.join().unwrap(), Err(GlkError::ExitRequested)));

    // Still answers queries without blocking
    assert!(!coord.accepting_event());
    assert!(coord.latest_state().is_some());
}
