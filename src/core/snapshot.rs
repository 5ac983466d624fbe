//! Library state snapshots
//!
//! A snapshot is an immutable deep copy of everything the presentation side
//! needs to draw: window boxes, style sets, input requests and the content
//! that changed since the previous snapshot. Snapshots are built on the
//! interpreter thread and handed over behind an `Arc`; nothing in them
//! aliases mutable library state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fileref::FileRefPrompt;
use super::geometry::{Geometry, Rect};
use super::line::StyledLine;
use super::styleset::StyleSet;
use super::window::{Window, WindowKind, WindowType};
use super::Tag;

/// Snapshot of one grid row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRowState {
    pub row: usize,
    pub text: String,
    pub styles: Vec<u32>,
}

/// Kind-specific window content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentState {
    Buffer {
        clear_count: u32,
        /// Index of the first line in `lines`
        dirty_from: usize,
        lines: Vec<StyledLine>,
    },
    Grid {
        width: usize,
        height: usize,
        curx: usize,
        cury: usize,
        /// Rows changed since the previous snapshot
        rows: Vec<GridRowState>,
    },
    Pair {
        geometry: Geometry,
    },
}

/// Snapshot of one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowState {
    pub tag: Tag,
    pub wintype: WindowType,
    pub rock: u32,
    pub parent: Option<Tag>,
    pub styleset: Arc<StyleSet>,
    pub bbox: Rect,
    pub input_request_id: u32,
    pub char_request: bool,
    pub line_request: bool,
    pub line_request_initial: Option<String>,
    pub content: ContentState,
}

impl WindowState {
    /// Copy the presentation-relevant state of a window
    pub fn from_window(win: &Window) -> Self {
        let content = match &win.kind {
            WindowKind::Buffer(buf) => {
                let (dirty_from, lines) = buf.dirty_lines();
                ContentState::Buffer {
                    clear_count: buf.clear_count(),
                    dirty_from,
                    lines: lines.to_vec(),
                }
            }
            WindowKind::Grid(grid) => {
                let (curx, cury) = grid.cursor();
                ContentState::Grid {
                    width: grid.width(),
                    height: grid.height(),
                    curx,
                    cury,
                    rows: grid
                        .lines()
                        .iter()
                        .enumerate()
                        .filter(|(_, l)| l.dirty)
                        .map(|(row, l)| GridRowState {
                            row,
                            text: l.chars.iter().collect(),
                            styles: l.styles.clone(),
                        })
                        .collect(),
                }
            }
            WindowKind::Pair(geometry) => ContentState::Pair {
                geometry: geometry.clone(),
            },
        };

        Self {
            tag: win.tag,
            wintype: win.window_type(),
            rock: win.rock,
            parent: win.parent,
            styleset: Arc::clone(&win.styleset),
            bbox: win.bbox,
            input_request_id: win.input.request_id(),
            char_request: win.input.char_request(),
            line_request: win.input.line_request(),
            line_request_initial: win.input.line_initial().map(str::to_string),
            content,
        }
    }

    /// Plain-text rendering of the content carried by this snapshot
    pub fn text_lines(&self) -> Vec<String> {
        match &self.content {
            ContentState::Buffer { lines, .. } => lines.iter().map(StyledLine::concat).collect(),
            ContentState::Grid { rows, .. } => rows
                .iter()
                .map(|r| r.text.trim_end().to_string())
                .collect(),
            ContentState::Pair { .. } => Vec::new(),
        }
    }
}

/// A complete snapshot of the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryState {
    /// Sequence number of this snapshot
    pub generation: u64,
    /// Windows in tree order (root first)
    pub windows: Vec<WindowState>,
    pub root: Option<Tag>,
    pub bounds: Rect,
    pub vm_exited: bool,
    pub special_request: Option<FileRefPrompt>,
    pub geometry_changed: bool,
    pub metrics_changed: bool,
    pub everything_changed: bool,
}

impl LibraryState {
    pub fn window(&self, tag: Tag) -> Option<&WindowState> {
        self.windows.iter().find(|w| w.tag == tag)
    }

    /// Convert snapshot to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse snapshot from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Simple text dump of every leaf window (for debugging)
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for win in &self.windows {
            if win.wintype == WindowType::Pair {
                continue;
            }
            out.push_str(&format!("[{} {:?}]\n", win.tag, win.wintype));
            for line in win.text_lines() {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::style;

    fn buffer_window() -> Window {
        Window::leaf(
            Tag::new(1),
            WindowType::TextBuffer,
            7,
            Arc::new(StyleSet::default()),
        )
    }

    #[test]
    fn test_buffer_snapshot_copies_dirty_lines() {
        let mut win = buffer_window();
        win.put_str("one\ntwo");
        win.mark_clean();
        win.put_str("\nthree");

        let state = WindowState::from_window(&win);
        let ContentState::Buffer {
            dirty_from, lines, ..
        } = &state.content
        else {
            panic!("expected buffer content");
        };
        assert_eq!(*dirty_from, 2);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].concat(), "three");
        assert_eq!(state.rock, 7);
    }

    #[test]
    fn test_snapshot_is_independent_of_window() {
        let mut win = buffer_window();
        win.put_str("before");
        let state = WindowState::from_window(&win);
        win.put_str(" after");
        win.clear();
        assert_eq!(state.text_lines(), vec!["before"]);
    }

    #[test]
    fn test_grid_snapshot_only_dirty_rows() {
        let mut win = Window::leaf(
            Tag::new(2),
            WindowType::TextGrid,
            0,
            Arc::new(StyleSet::default()),
        );
        win.set_leaf_bbox(Rect::new(0.0, 0.0, 80.0, 48.0));
        win.mark_clean();
        win.move_cursor(0, 1).unwrap();
        win.put_styled("Score: 0", style::ALERT);

        let state = WindowState::from_window(&win);
        let ContentState::Grid { rows, height, .. } = &state.content else {
            panic!("expected grid content");
        };
        assert_eq!(*height, 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].styles[0], style::ALERT);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut win = buffer_window();
        win.put_str("hello");
        let state = LibraryState {
            generation: 1,
            windows: vec![WindowState::from_window(&win)],
            root: Some(win.tag),
            bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
            vm_exited: false,
            special_request: None,
            geometry_changed: true,
            metrics_changed: false,
            everything_changed: false,
        };
        let json = state.to_json().unwrap();
        let restored = LibraryState::from_json(&json).unwrap();
        assert_eq!(restored.windows[0].content, state.windows[0].content);
        assert!(restored.to_text().contains("hello"));
    }
}
