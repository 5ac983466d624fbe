//! End-to-end scenarios for the window tree, buffers, input requests and
//! snapshots, driven through the public API.

use std::sync::Arc;
use std::time::Duration;

use glk_bridge::core::{
    ContentState, Division, Library, Rect, Settings, SplitDir, SplitMethod, Tag, WindowType,
};
use glk_bridge::error::GlkError;
use glk_bridge::event::{Coordinator, Session, UiEvent};
use glk_bridge::host::{DefaultStyles, NullPresenter};

fn library() -> Library {
    let mut lib = Library::new(Settings::default(), Arc::new(DefaultStyles::default()));
    lib.set_bounds(Rect::new(0.0, 0.0, 400.0, 300.0));
    lib
}

fn fixed_above() -> SplitMethod {
    SplitMethod::new(SplitDir::Above, Division::Fixed)
}

/// Buffer window W1 as the root, two-row grid W2 above it
fn status_layout(lib: &mut Library) -> (Tag, Tag) {
    let w1 = lib
        .open_window(None, fixed_above(), 0, WindowType::TextBuffer, 1)
        .unwrap();
    let w2 = lib
        .open_window(Some(w1), fixed_above(), 2, WindowType::TextGrid, 2)
        .unwrap();
    (w1, w2)
}

#[test]
fn test_status_grid_takes_two_rows() {
    let mut lib = library();
    let (w1, w2) = status_layout(&mut lib);

    assert_eq!(w1, Tag::new(1));
    assert_eq!(w2, Tag::new(3));
    let pair = lib.root().unwrap();
    assert_eq!(pair, Tag::new(5));
    assert_eq!(lib.window_type(pair).unwrap(), WindowType::Pair);
    assert_eq!(lib.parent(w1).unwrap(), Some(pair));
    assert_eq!(lib.sibling(w2).unwrap(), Some(w1));

    let charh = lib.window(w2).unwrap().styleset.charbox.height;
    assert_eq!(
        lib.window(w2).unwrap().bbox,
        Rect::new(0.0, 0.0, 400.0, 2.0 * charh)
    );
    assert_eq!(lib.window(w1).unwrap().bbox.y, 2.0 * charh);
    assert!(lib.sanity_check().is_empty());
}

#[test]
fn test_clear_then_write_ships_only_new_text() {
    let mut lib = library();
    let (w1, _) = status_layout(&mut lib);
    let stream = lib.window_stream(w1).unwrap().unwrap();

    lib.put_string_stream(stream, "Hello").unwrap();
    lib.clear_window(w1).unwrap();
    lib.put_string_stream(stream, "World").unwrap();

    let state = lib.clone_state();
    let win = state.window(w1).unwrap();
    match &win.content {
        ContentState::Buffer {
            clear_count,
            dirty_from,
            lines,
        } => {
            assert_eq!(*clear_count, 1);
            assert_eq!(*dirty_from, 0);
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].concat(), "World");
        }
        other => panic!("expected buffer content, got {:?}", other),
    }
    assert_eq!(win.text_lines(), vec!["World"]);
}

#[test]
fn test_rearrange_is_idempotent() {
    let mut lib = library();
    let (w1, w2) = status_layout(&mut lib);
    lib.clone_state();

    let before: Vec<Rect> = [w1, w2].iter().map(|t| lib.window(*t).unwrap().bbox).collect();
    lib.rearrange();
    lib.rearrange();
    let after: Vec<Rect> = [w1, w2].iter().map(|t| lib.window(*t).unwrap().bbox).collect();

    assert_eq!(before, after);
    assert!(!lib.geometry_changed());
}

#[test]
fn test_duplicate_input_request_changes_nothing() {
    let mut lib = library();
    let (w1, _) = status_layout(&mut lib);

    let id = lib.request_line_event(w1, false, 80, Some("go ")).unwrap();
    let before = lib.window(w1).unwrap().input.clone();

    assert!(matches!(
        lib.request_line_event(w1, false, 80, None),
        Err(GlkError::DuplicateInputRequest(t)) if t == w1
    ));
    assert!(matches!(
        lib.request_char_event(w1, true),
        Err(GlkError::DuplicateInputRequest(_))
    ));
    assert_eq!(lib.window(w1).unwrap().input, before);
    assert_eq!(lib.window(w1).unwrap().input.request_id(), id);
}

#[test]
fn test_snapshot_is_immutable() {
    let mut lib = library();
    let (w1, w2) = status_layout(&mut lib);
    let stream = lib.window_stream(w1).unwrap().unwrap();
    lib.put_string_stream(stream, "before").unwrap();

    let state = lib.clone_state();
    let json = state.to_json().unwrap();

    lib.put_string_stream(stream, "\nafter").unwrap();
    lib.close_window(w2).unwrap();
    lib.set_bounds(Rect::new(0.0, 0.0, 100.0, 100.0));

    assert_eq!(state.to_json().unwrap(), json);
    assert!(state.window(w2).is_some());
    assert_eq!(state.window(w1).unwrap().text_lines(), vec!["before"]);
}

#[test]
fn test_stale_response_after_forced_reissue() {
    let mut lib = library();
    let (w1, _) = status_layout(&mut lib);
    let first = lib.request_line_event(w1, false, 80, None).unwrap();
    assert_eq!(first, 1);

    let coord = Arc::new(Coordinator::new(Arc::new(NullPresenter)));
    let mut session = Session::new(lib, Arc::clone(&coord));
    let worker = std::thread::spawn(move || {
        let result = session.select();
        (session, result)
    });

    coord.request_full_refresh();
    assert!(coord.wait_until_idle(Duration::from_secs(5)));
    let state = coord.latest_state().unwrap();
    assert!(state.everything_changed);
    assert_eq!(state.window(w1).unwrap().input_request_id, 2);

    assert!(coord.accept_event(UiEvent::Line {
        win: w1,
        request_id: first,
        text: "too late".into(),
    }));
    assert!(coord.wait_until_idle(Duration::from_secs(5)));
    assert!(coord.accept_event(UiEvent::Line {
        win: w1,
        request_id: 2,
        text: "in time".into(),
    }));

    let (session, result) = worker.join().unwrap();
    let event = result.unwrap();
    assert_eq!(event.win, Some(w1));
    assert_eq!(event.line.as_deref(), Some("in time"));
    assert!(session.window(w1).unwrap().input.is_idle());
}
