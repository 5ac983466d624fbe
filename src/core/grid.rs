//! Character grid
//!
//! Text-grid windows hold a fixed-size array of characters with one style
//! per cell and a cursor. The grid is resized whenever its window is
//! rearranged; content that still fits is kept.

use serde::{Deserialize, Serialize};

use super::styleset::style;

/// One row of a text grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLine {
    pub chars: Vec<char>,
    pub styles: Vec<u32>,
    /// Changed since the last snapshot
    pub dirty: bool,
}

impl GridLine {
    pub fn new(width: usize) -> Self {
        Self {
            chars: vec![' '; width],
            styles: vec![style::NORMAL; width],
            dirty: true,
        }
    }

    pub fn width(&self) -> usize {
        self.chars.len()
    }

    pub fn resize(&mut self, width: usize) {
        if width != self.chars.len() {
            self.chars.resize(width, ' ');
            self.styles.resize(width, style::NORMAL);
        }
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.chars.fill(' ');
        self.styles.fill(style::NORMAL);
        self.dirty = true;
    }

    /// Row text with trailing blanks removed
    pub fn text(&self) -> String {
        let s: String = self.chars.iter().collect();
        s.trim_end().to_string()
    }
}

/// Content of a text-grid window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextGrid {
    width: usize,
    height: usize,
    lines: Vec<GridLine>,
    /// Cursor column; may sit past the right edge until the next write
    curx: usize,
    cury: usize,
}

impl TextGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            lines: (0..height).map(|_| GridLine::new(width)).collect(),
            curx: 0,
            cury: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.curx, self.cury)
    }

    pub fn lines(&self) -> &[GridLine] {
        &self.lines
    }

    /// Change dimensions, keeping whatever content still fits
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }
        self.lines.truncate(height);
        for line in &mut self.lines {
            line.resize(width);
        }
        while self.lines.len() < height {
            self.lines.push(GridLine::new(width));
        }
        self.width = width;
        self.height = height;
    }

    /// Move the cursor; positions off the grid are allowed and clip writes
    pub fn move_cursor(&mut self, x: usize, y: usize) {
        self.curx = x;
        self.cury = y;
    }

    /// Place one character at the cursor and advance it
    pub fn put_char(&mut self, ch: char, style: u32) {
        if ch == '\n' {
            self.curx = 0;
            self.cury += 1;
            return;
        }
        if self.width == 0 {
            return;
        }
        if self.curx >= self.width {
            self.curx = 0;
            self.cury += 1;
        }
        if self.cury >= self.height {
            return;
        }
        let line = &mut self.lines[self.cury];
        line.chars[self.curx] = ch;
        line.styles[self.curx] = style;
        line.dirty = true;
        self.curx += 1;
    }

    pub fn put_str(&mut self, text: &str, style: u32) {
        for ch in text.chars() {
            self.put_char(ch, style);
        }
    }

    pub fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.curx = 0;
        self.cury = 0;
    }

    pub fn mark_clean(&mut self) {
        for line in &mut self.lines {
            line.dirty = false;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for line in &mut self.lines {
            line.dirty = true;
        }
    }

    /// Rows as plain text
    pub fn to_text(&self) -> Vec<String> {
        self.lines.iter().map(GridLine::text).collect()
    }
}
