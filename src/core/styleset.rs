//! Style sets
//!
//! A style set maps the eleven Glk style ids to concrete rendering
//! attributes for one window. Style sets are built by the host's style
//! policy, shared immutably between the live window and its snapshots, and
//! replaced wholesale when metrics change.

use serde::{Deserialize, Serialize};

use super::geometry::{KeyMetrics, Size};
use super::window::WindowType;

/// Glk style ids
pub mod style {
    pub const NORMAL: u32 = 0;
    pub const EMPHASIZED: u32 = 1;
    pub const PREFORMATTED: u32 = 2;
    pub const HEADER: u32 = 3;
    pub const SUBHEADER: u32 = 4;
    pub const ALERT: u32 = 5;
    pub const NOTE: u32 = 6;
    pub const BLOCK_QUOTE: u32 = 7;
    pub const INPUT: u32 = 8;
    pub const USER1: u32 = 9;
    pub const USER2: u32 = 10;
    pub const COUNT: usize = 11;
}

/// An RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Font selection for one style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    /// Point size
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "serif".to_string(),
            size: 14.0,
            bold: false,
            italic: false,
        }
    }
}

/// Rendering attributes for one style id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleAttrs {
    pub font: FontSpec,
    pub color: Rgb,
}

/// Margins around a window's text
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Insets {
    pub const fn uniform(v: f64) -> Self {
        Self {
            top: v,
            left: v,
            bottom: v,
            right: v,
        }
    }
}

/// Complete set of style attributes for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSet {
    styles: Vec<StyleAttrs>,
    /// Extra space below each line
    pub leading: f64,
    /// Size of one rendered character of the normal style, including leading
    pub charbox: Size,
    pub background: Rgb,
    pub margins: Insets,
}

impl Default for StyleSet {
    fn default() -> Self {
        Self {
            styles: vec![StyleAttrs::default(); style::COUNT],
            leading: 0.0,
            charbox: Size::new(8.0, 16.0),
            background: Rgb::WHITE,
            margins: Insets::default(),
        }
    }
}

impl StyleSet {
    /// Default style set for a window type at a given font.
    ///
    /// Grid windows use one monospace face for every style. Character boxes
    /// are estimated from the point size since no font is rasterized here.
    pub fn for_window_type(wintype: WindowType, family: &str, size: f64) -> Self {
        let grid = wintype == WindowType::TextGrid;
        let family = if grid { "monospace" } else { family };
        let leading = if grid { 0.0 } else { (size * 0.2).round() };

        let mut styles = Vec::with_capacity(style::COUNT);
        for id in 0..style::COUNT as u32 {
            let mut font = FontSpec {
                family: family.to_string(),
                size,
                bold: false,
                italic: false,
            };
            let mut color = Rgb::BLACK;
            match id {
                style::EMPHASIZED | style::NOTE => font.italic = true,
                style::PREFORMATTED => {
                    font.family = "monospace".to_string();
                }
                style::HEADER if !grid => {
                    font.bold = true;
                    font.size = size * 1.25;
                }
                style::SUBHEADER | style::INPUT => font.bold = true,
                style::ALERT => {
                    font.bold = true;
                    color = Rgb(0x80, 0, 0);
                }
                style::BLOCK_QUOTE => color = Rgb(0x40, 0x40, 0x40),
                _ => {}
            }
            styles.push(StyleAttrs { font, color });
        }

        Self {
            styles,
            leading,
            charbox: Size::new((size * 0.6).ceil(), (size * 1.2).ceil() + leading),
            background: Rgb::WHITE,
            margins: Insets::uniform(if grid { 0.0 } else { 4.0 }),
        }
    }

    /// Attributes for a style id; out-of-range ids fall back to normal
    pub fn get(&self, id: u32) -> &StyleAttrs {
        self.styles
            .get(id as usize)
            .or_else(|| self.styles.first())
            .unwrap_or(&DEFAULT_ATTRS)
    }

    /// Replace the attributes for one style id
    pub fn set(&mut self, id: u32, attrs: StyleAttrs) {
        if let Some(slot) = self.styles.get_mut(id as usize) {
            *slot = attrs;
        }
    }

    /// Left+right and top+bottom margins
    pub fn margin_total(&self) -> Size {
        Size::new(
            self.margins.left + self.margins.right,
            self.margins.top + self.margins.bottom,
        )
    }

    /// The metrics a pair needs when this window is its key
    pub fn key_metrics(&self) -> KeyMetrics {
        KeyMetrics {
            charbox: self.charbox,
            margin_total: self.margin_total(),
        }
    }

    /// Number of whole character cells that fit in a box of the given size
    pub fn cells_in(&self, size: Size) -> (u32, u32) {
        let margin = self.margin_total();
        let fit = |extent: f64, margin: f64, cell: f64| {
            if cell <= 0.0 {
                return 0;
            }
            ((extent - margin) / cell).floor().max(0.0) as u32
        };
        (
            fit(size.width, margin.width, self.charbox.width),
            fit(size.height, margin.height, self.charbox.height),
        )
    }
}

static DEFAULT_ATTRS: StyleAttrs = StyleAttrs {
    font: FontSpec {
        family: String::new(),
        size: 0.0,
        bold: false,
        italic: false,
    },
    color: Rgb::BLACK,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_styles_are_monospace() {
        let set = StyleSet::for_window_type(WindowType::TextGrid, "Georgia", 12.0);
        for id in 0..style::COUNT as u32 {
            assert_eq!(set.get(id).font.family, "monospace");
        }
        assert_eq!(set.leading, 0.0);
    }

    #[test]
    fn test_buffer_header_is_larger() {
        let set = StyleSet::for_window_type(WindowType::TextBuffer, "Georgia", 12.0);
        assert!(set.get(style::HEADER).font.bold);
        assert!(set.get(style::HEADER).font.size > set.get(style::NORMAL).font.size);
        assert!(set.get(style::EMPHASIZED).font.italic);
        assert_eq!(set.get(style::NORMAL).font.family, "Georgia");
    }

    #[test]
    fn test_out_of_range_falls_back() {
        let set = StyleSet::default();
        assert_eq!(set.get(99), set.get(style::NORMAL));
    }

    #[test]
    fn test_cells_in() {
        let mut set = StyleSet::default();
        set.margins = Insets::uniform(2.0);
        assert_eq!(set.cells_in(Size::new(84.0, 36.0)), (10, 2));
        assert_eq!(set.cells_in(Size::new(1.0, 1.0)), (0, 0));
    }
}
