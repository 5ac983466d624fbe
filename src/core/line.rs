//! Styled text buffer
//!
//! Text-buffer windows keep a log of styled lines. Each line carries an
//! absolute index and a status telling the presentation side how to join it
//! to what it already shows. Lines at or after `dirty_from` have not been
//! shipped in a snapshot yet.

use serde::{Deserialize, Serialize};

/// How a line relates to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    /// Continues the previous line (text appended after a snapshot)
    Continue,
    /// Starts a new paragraph
    NewLine,
    /// First line after the window was cleared
    ClearPage,
}

/// A run of text in one style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledString {
    pub text: String,
    pub style: u32,
}

/// One line of a buffer window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledLine {
    /// Absolute index since the last clear
    pub index: usize,
    pub status: LineStatus,
    pub spans: Vec<StyledString>,
}

impl StyledLine {
    pub fn new(index: usize, status: LineStatus) -> Self {
        Self {
            index,
            status,
            spans: Vec::new(),
        }
    }

    /// Append text, merging into the last span when the style matches
    pub fn push(&mut self, text: &str, style: u32) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(StyledString {
                text: text.to_string(),
                style,
            }),
        }
    }

    /// Line contents without style information
    pub fn concat(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }
}

/// Content of a text-buffer window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextBuffer {
    lines: Vec<StyledLine>,
    /// Index the next new line will get
    next_index: usize,
    /// First line index not yet shipped in a snapshot
    dirty_from: usize,
    /// Incremented whenever the window is cleared
    clear_count: u32,
    /// Whether the next text starts on a fresh page
    fresh_page: bool,
    /// Maximum lines retained (0 = unlimited)
    max_lines: usize,
}

impl TextBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            ..Default::default()
        }
    }

    pub fn lines(&self) -> &[StyledLine] {
        &self.lines
    }

    pub fn dirty_from(&self) -> usize {
        self.dirty_from
    }

    pub fn clear_count(&self) -> u32 {
        self.clear_count
    }

    pub fn set_max_lines(&mut self, max_lines: usize) {
        self.max_lines = max_lines;
        self.trim();
    }

    /// Index of the oldest retained line
    pub fn first_index(&self) -> usize {
        self.lines.first().map_or(self.next_index, |l| l.index)
    }

    /// Append text, splitting it into lines at newlines
    pub fn put_str(&mut self, text: &str, style: u32) {
        let mut parts = text.split('\n').peekable();
        if let Some(first) = parts.next() {
            // A newline on an empty page still ends a (blank) first line
            if !first.is_empty() || (self.next_index == 0 && parts.peek().is_some()) {
                self.writable_line().push(first, style);
            }
        }
        for part in parts {
            self.start_line(LineStatus::NewLine).push(part, style);
        }
        self.trim();
    }

    /// Reset content and bump the clear counter
    pub fn clear(&mut self) {
        self.lines.clear();
        self.next_index = 0;
        self.dirty_from = 0;
        self.clear_count += 1;
        self.fresh_page = true;
    }

    /// Lines not yet shipped, plus the index they start at
    pub fn dirty_lines(&self) -> (usize, &[StyledLine]) {
        let start = self
            .lines
            .iter()
            .position(|l| l.index >= self.dirty_from)
            .unwrap_or(self.lines.len());
        (self.dirty_from, &self.lines[start..])
    }

    /// Everything up to now has been shipped
    pub fn mark_clean(&mut self) {
        self.dirty_from = self.next_index;
    }

    /// Ship every retained line again
    pub fn mark_all_dirty(&mut self) {
        self.dirty_from = self.first_index();
    }

    /// Last line still open for writing, created if needed
    fn writable_line(&mut self) -> &mut StyledLine {
        let reusable = matches!(self.lines.last(), Some(l) if l.index >= self.dirty_from);
        if !reusable {
            let status = if self.next_index == 0 {
                LineStatus::NewLine
            } else {
                LineStatus::Continue
            };
            return self.start_line(status);
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn start_line(&mut self, status: LineStatus) -> &mut StyledLine {
        let status = if self.fresh_page {
            self.fresh_page = false;
            LineStatus::ClearPage
        } else {
            status
        };
        let line = StyledLine::new(self.next_index, status);
        self.next_index += 1;
        self.lines.push(line);
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn trim(&mut self) {
        if self.max_lines == 0 || self.lines.len() <= self.max_lines {
            return;
        }
        let excess = self.lines.len() - self.max_lines;
        self.lines.drain(..excess);
        self.dirty_from = self.dirty_from.max(self.first_index());
    }
}
