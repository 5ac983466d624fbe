//! Windows
//!
//! A window is a common header (tag, rock, parent, style set, box, streams,
//! input state) plus a kind-specific payload. Pair windows are interior
//! nodes of the window tree; buffer and grid windows are leaves.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::geometry::{Geometry, Rect, Size};
use super::grid::TextGrid;
use super::input::InputState;
use super::line::TextBuffer;
use super::styleset::StyleSet;
use super::Tag;
use crate::error::{GlkError, Result};

/// Window types, numbered as in `glk.h`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    Pair,
    TextBuffer,
    TextGrid,
}

impl WindowType {
    pub fn code(self) -> u32 {
        match self {
            WindowType::Pair => 1,
            WindowType::TextBuffer => 3,
            WindowType::TextGrid => 4,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(WindowType::Pair),
            3 => Ok(WindowType::TextBuffer),
            4 => Ok(WindowType::TextGrid),
            other => Err(GlkError::InvalidOperation(format!(
                "unsupported window type {other}"
            ))),
        }
    }
}

/// Kind-specific window state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowKind {
    Buffer(TextBuffer),
    Grid(TextGrid),
    Pair(Geometry),
}

/// A window in the library's tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub tag: Tag,
    pub rock: u32,
    pub parent: Option<Tag>,
    /// Current output style
    pub style: u32,
    pub bbox: Rect,
    /// The window's own output stream (none for pair windows)
    pub stream: Option<Tag>,
    pub echo_stream: Option<Tag>,
    /// Echo accepted line input into the window
    pub echo_line_input: bool,
    pub input: InputState,
    /// Rebuilt from the style policy after restore
    #[serde(skip)]
    pub styleset: Arc<StyleSet>,
    pub kind: WindowKind,
}

impl Window {
    /// A new buffer or grid window
    pub fn leaf(tag: Tag, wintype: WindowType, rock: u32, styleset: Arc<StyleSet>) -> Self {
        let kind = match wintype {
            WindowType::TextGrid => WindowKind::Grid(TextGrid::new(0, 0)),
            _ => WindowKind::Buffer(TextBuffer::new(0)),
        };
        Self::with_kind(tag, kind, rock, styleset)
    }

    /// A new pair window
    pub fn pair(tag: Tag, geometry: Geometry, styleset: Arc<StyleSet>) -> Self {
        Self::with_kind(tag, WindowKind::Pair(geometry), 0, styleset)
    }

    fn with_kind(tag: Tag, kind: WindowKind, rock: u32, styleset: Arc<StyleSet>) -> Self {
        Self {
            tag,
            rock,
            parent: None,
            style: 0,
            bbox: Rect::default(),
            stream: None,
            echo_stream: None,
            echo_line_input: true,
            input: InputState::default(),
            styleset,
            kind,
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut TextBuffer> {
        match &mut self.kind {
            WindowKind::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn window_type(&self) -> WindowType {
        match self.kind {
            WindowKind::Buffer(_) => WindowType::TextBuffer,
            WindowKind::Grid(_) => WindowType::TextGrid,
            WindowKind::Pair(_) => WindowType::Pair,
        }
    }

    pub fn supports_input(&self) -> bool {
        !matches!(self.kind, WindowKind::Pair(_))
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.kind {
            WindowKind::Pair(g) => Some(g),
            _ => None,
        }
    }

    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        match &mut self.kind {
            WindowKind::Pair(g) => Some(g),
            _ => None,
        }
    }

    pub fn buffer(&self) -> Option<&TextBuffer> {
        match &self.kind {
            WindowKind::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn grid(&self) -> Option<&TextGrid> {
        match &self.kind {
            WindowKind::Grid(g) => Some(g),
            _ => None,
        }
    }

    /// Children of a pair window
    pub fn children(&self) -> Option<(Tag, Tag)> {
        self.geometry().map(|g| (g.child1, g.child2))
    }

    /// Size in character cells
    pub fn size_in_cells(&self) -> (u32, u32) {
        match &self.kind {
            WindowKind::Grid(g) => (g.width() as u32, g.height() as u32),
            WindowKind::Buffer(_) => self
                .styleset
                .cells_in(Size::new(self.bbox.width, self.bbox.height)),
            WindowKind::Pair(_) => (0, 0),
        }
    }

    /// Write text in the window's current style
    pub fn put_str(&mut self, text: &str) {
        let style = self.style;
        match &mut self.kind {
            WindowKind::Buffer(b) => b.put_str(text, style),
            WindowKind::Grid(g) => g.put_str(text, style),
            WindowKind::Pair(_) => {}
        }
    }

    /// Write text in an explicit style without changing the current one
    pub fn put_styled(&mut self, text: &str, style: u32) {
        match &mut self.kind {
            WindowKind::Buffer(b) => b.put_str(text, style),
            WindowKind::Grid(g) => g.put_str(text, style),
            WindowKind::Pair(_) => {}
        }
    }

    pub fn clear(&mut self) {
        match &mut self.kind {
            WindowKind::Buffer(b) => b.clear(),
            WindowKind::Grid(g) => g.clear(),
            WindowKind::Pair(_) => {}
        }
    }

    pub fn move_cursor(&mut self, x: u32, y: u32) -> Result<()> {
        match &mut self.kind {
            WindowKind::Grid(g) => {
                g.move_cursor(x as usize, y as usize);
                Ok(())
            }
            _ => Err(GlkError::WrongWindowType(self.tag)),
        }
    }

    /// Set the box of a leaf window and resize its content to match
    pub fn set_leaf_bbox(&mut self, bbox: Rect) {
        self.bbox = bbox;
        if let WindowKind::Grid(g) = &mut self.kind {
            let (w, h) = self.styleset.cells_in(Size::new(bbox.width, bbox.height));
            g.resize(w as usize, h as usize);
        }
    }

    pub fn mark_clean(&mut self) {
        match &mut self.kind {
            WindowKind::Buffer(b) => b.mark_clean(),
            WindowKind::Grid(g) => g.mark_clean(),
            WindowKind::Pair(_) => {}
        }
    }

    pub fn mark_all_dirty(&mut self) {
        match &mut self.kind {
            WindowKind::Buffer(b) => b.mark_all_dirty(),
            WindowKind::Grid(g) => g.mark_all_dirty(),
            WindowKind::Pair(_) => {}
        }
    }
}
