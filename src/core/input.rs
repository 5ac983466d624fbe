//! Per-window input request state
//!
//! A window is idle or waiting for exactly one char or line response. Every
//! new request (and every reissue) bumps the request id; a response is only
//! accepted when it carries the current id.

use serde::{Deserialize, Serialize};

use super::Tag;
use crate::error::{GlkError, Result};

/// Special key codes delivered through char input
pub mod keycode {
    pub const UNKNOWN: u32 = 0xffff_ffff;
    pub const LEFT: u32 = 0xffff_fffe;
    pub const RIGHT: u32 = 0xffff_fffd;
    pub const UP: u32 = 0xffff_fffc;
    pub const DOWN: u32 = 0xffff_fffb;
    pub const RETURN: u32 = 0xffff_fffa;
    pub const DELETE: u32 = 0xffff_fff9;
    pub const ESCAPE: u32 = 0xffff_fff8;
    pub const TAB: u32 = 0xffff_fff7;
    /// Lowest special key code (function key 12)
    pub const MIN: u32 = 0xffff_ffe4;

    pub fn is_special(ch: u32) -> bool {
        ch >= MIN
    }
}

/// Outstanding request on one window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputRequest {
    #[default]
    Idle,
    Char {
        unicode: bool,
    },
    Line {
        unicode: bool,
        /// Capacity of the destination buffer in characters
        max_len: usize,
        /// Pre-filled text shown in the input field
        initial: Option<String>,
    },
}

/// Input state machine for one window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputState {
    request: InputRequest,
    request_id: u32,
}

impl InputState {
    pub fn request(&self) -> &InputRequest {
        &self.request
    }

    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    pub fn is_idle(&self) -> bool {
        self.request == InputRequest::Idle
    }

    pub fn char_request(&self) -> bool {
        matches!(self.request, InputRequest::Char { .. })
    }

    pub fn line_request(&self) -> bool {
        matches!(self.request, InputRequest::Line { .. })
    }

    pub fn line_initial(&self) -> Option<&str> {
        match &self.request {
            InputRequest::Line { initial, .. } => initial.as_deref(),
            _ => None,
        }
    }

    /// Enter the char-wait state
    pub fn begin_char(&mut self, tag: Tag, unicode: bool) -> Result<u32> {
        if !self.is_idle() {
            return Err(GlkError::DuplicateInputRequest(tag));
        }
        self.request = InputRequest::Char { unicode };
        self.request_id += 1;
        Ok(self.request_id)
    }

    /// Enter the line-wait state
    pub fn begin_line(
        &mut self,
        tag: Tag,
        unicode: bool,
        max_len: usize,
        initial: Option<&str>,
    ) -> Result<u32> {
        if !self.is_idle() {
            return Err(GlkError::DuplicateInputRequest(tag));
        }
        let initial = initial
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().take(max_len).collect());
        self.request = InputRequest::Line {
            unicode,
            max_len,
            initial,
        };
        self.request_id += 1;
        Ok(self.request_id)
    }

    /// Accept a char response, returning the (possibly narrowed) character
    pub fn accept_char(&mut self, tag: Tag, id: u32, ch: u32) -> Result<u32> {
        let unicode = match self.request {
            InputRequest::Char { unicode } if id == self.request_id => unicode,
            _ => return Err(self.stale(tag, id)),
        };
        self.request = InputRequest::Idle;
        if !unicode && ch > 0xff && !keycode::is_special(ch) {
            return Ok(u32::from(b'?'));
        }
        Ok(ch)
    }

    /// Accept a line response, returning the text as it fits the request
    pub fn accept_line(&mut self, tag: Tag, id: u32, text: &str) -> Result<String> {
        let (unicode, max_len) = match self.request {
            InputRequest::Line {
                unicode, max_len, ..
            } if id == self.request_id => (unicode, max_len),
            _ => return Err(self.stale(tag, id)),
        };
        self.request = InputRequest::Idle;
        Ok(fit_line(text, unicode, max_len))
    }

    pub fn cancel_char(&mut self) {
        if self.char_request() {
            self.request = InputRequest::Idle;
        }
    }

    /// Cancel a line request, returning the partial text it would have held
    pub fn cancel_line(&mut self, partial: &str) -> Option<String> {
        let InputRequest::Line {
            unicode, max_len, ..
        } = self.request
        else {
            return None;
        };
        self.request = InputRequest::Idle;
        Some(fit_line(partial, unicode, max_len))
    }

    /// Cancel and resubmit the current request with a new id.
    ///
    /// Responses addressed to the old id become stale.
    pub fn reissue(&mut self) -> Option<u32> {
        if self.is_idle() {
            return None;
        }
        self.request_id += 1;
        Some(self.request_id)
    }

    fn stale(&self, tag: Tag, got: u32) -> GlkError {
        GlkError::StaleResponse {
            tag,
            expected: self.request_id,
            got,
        }
    }
}

/// Truncate to the buffer and narrow to Latin-1 for byte requests
fn fit_line(text: &str, unicode: bool, max_len: usize) -> String {
    text.chars()
        .take(max_len)
        .map(|c| if unicode || (c as u32) <= 0xff { c } else { '?' })
        .collect()
}
