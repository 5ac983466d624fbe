//! Events and thread coordination
//!
//! Events cross the thread boundary as plain data: the presentation side
//! produces [`UiEvent`]s tagged with the request id they answer, and the
//! interpreter receives [`Event`]s with the Glk layout (`type`, `win`,
//! `val1`, `val2`).

mod coordinator;
mod session;
mod timer;

pub use coordinator::Coordinator;
pub use session::{spawn_worker, Session};
pub use timer::TimerScheduler;

use serde::{Deserialize, Serialize};

use crate::core::Tag;

/// Event types, numbered as in `glk.h`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    None,
    Timer,
    CharInput,
    LineInput,
    MouseInput,
    Arrange,
    Redraw,
    SoundNotify,
    Hyperlink,
}

impl EventType {
    pub fn code(self) -> u32 {
        match self {
            EventType::None => 0,
            EventType::Timer => 1,
            EventType::CharInput => 2,
            EventType::LineInput => 3,
            EventType::MouseInput => 4,
            EventType::Arrange => 5,
            EventType::Redraw => 6,
            EventType::SoundNotify => 7,
            EventType::Hyperlink => 8,
        }
    }
}

/// An event as returned from `select`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub win: Option<Tag>,
    pub val1: u32,
    pub val2: u32,
    /// Text of a line-input event
    pub line: Option<String>,
}

impl Event {
    fn simple(event_type: EventType, win: Option<Tag>, val1: u32) -> Self {
        Self {
            event_type,
            win,
            val1,
            val2: 0,
            line: None,
        }
    }

    pub fn none() -> Self {
        Self::simple(EventType::None, None, 0)
    }

    pub fn timer() -> Self {
        Self::simple(EventType::Timer, None, 0)
    }

    pub fn arrange(win: Option<Tag>) -> Self {
        Self::simple(EventType::Arrange, win, 0)
    }

    pub fn char_input(win: Tag, ch: u32) -> Self {
        Self::simple(EventType::CharInput, Some(win), ch)
    }

    /// Line input; `val1` is the length in characters
    pub fn line_input(win: Tag, text: String) -> Self {
        let len = text.chars().count() as u32;
        Self {
            line: Some(text),
            ..Self::simple(EventType::LineInput, Some(win), len)
        }
    }

    pub fn is_none(&self) -> bool {
        self.event_type == EventType::None
    }

    /// Raw window tag (0 for none)
    pub fn win_raw(&self) -> u32 {
        self.win.map_or(0, Tag::get)
    }
}

/// Input produced by the presentation side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiEvent {
    Char { win: Tag, request_id: u32, ch: u32 },
    Line {
        win: Tag,
        request_id: u32,
        text: String,
    },
}

impl UiEvent {
    pub fn win(&self) -> Tag {
        match self {
            UiEvent::Char { win, .. } | UiEvent::Line { win, .. } => *win,
        }
    }

    pub fn request_id(&self) -> u32 {
        match self {
            UiEvent::Char { request_id, .. } | UiEvent::Line { request_id, .. } => *request_id,
        }
    }
}
