//! Pair-window geometry
//!
//! A pair window splits its box between two children. The split is a pure
//! function of the box, the split method and the key window's character
//! metrics, so rearranging the same tree into the same box always produces
//! the same child boxes.

use serde::{Deserialize, Serialize};

use super::Tag;
use crate::error::{GlkError, Result};

/// Axis-aligned rectangle in presentation units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which side of the split window the new window takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitDir {
    Left,
    Right,
    Above,
    Below,
}

impl SplitDir {
    /// Left/right splits divide the width
    pub fn is_vertical(self) -> bool {
        matches!(self, SplitDir::Left | SplitDir::Right)
    }

    /// Left/above splits put the new window first
    pub fn is_backward(self) -> bool {
        matches!(self, SplitDir::Left | SplitDir::Above)
    }
}

/// How the split size is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Division {
    /// Size in character cells of the key window
    Fixed,
    /// Size as a percentage of the pair's extent
    Proportional,
}

/// Split method bits as used by `glk_window_open`
pub mod method {
    pub const LEFT: u32 = 0x00;
    pub const RIGHT: u32 = 0x01;
    pub const ABOVE: u32 = 0x02;
    pub const BELOW: u32 = 0x03;
    pub const DIR_MASK: u32 = 0x0f;
    pub const FIXED: u32 = 0x10;
    pub const PROPORTIONAL: u32 = 0x20;
    pub const DIVISION_MASK: u32 = 0xf0;
    pub const BORDER: u32 = 0x000;
    pub const NO_BORDER: u32 = 0x100;
    pub const BORDER_MASK: u32 = 0x100;
}

/// Decoded split method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitMethod {
    pub dir: SplitDir,
    pub division: Division,
    pub border: bool,
}

impl SplitMethod {
    pub fn new(dir: SplitDir, division: Division) -> Self {
        Self {
            dir,
            division,
            border: false,
        }
    }

    pub fn with_border(mut self, border: bool) -> Self {
        self.border = border;
        self
    }

    /// Decode method bits, rejecting unknown directions or divisions
    pub fn from_bits(bits: u32) -> Result<Self> {
        let dir = match bits & method::DIR_MASK {
            method::LEFT => SplitDir::Left,
            method::RIGHT => SplitDir::Right,
            method::ABOVE => SplitDir::Above,
            method::BELOW => SplitDir::Below,
            other => {
                return Err(GlkError::InvalidSplit(format!(
                    "unknown direction {other:#x}"
                )))
            }
        };
        let division = match bits & method::DIVISION_MASK {
            method::FIXED => Division::Fixed,
            method::PROPORTIONAL => Division::Proportional,
            other => {
                return Err(GlkError::InvalidSplit(format!(
                    "unknown division {other:#x}"
                )))
            }
        };
        Ok(Self {
            dir,
            division,
            border: bits & method::BORDER_MASK == method::BORDER,
        })
    }

    pub fn bits(&self) -> u32 {
        let dir = match self.dir {
            SplitDir::Left => method::LEFT,
            SplitDir::Right => method::RIGHT,
            SplitDir::Above => method::ABOVE,
            SplitDir::Below => method::BELOW,
        };
        let division = match self.division {
            Division::Fixed => method::FIXED,
            Division::Proportional => method::PROPORTIONAL,
        };
        let border = if self.border {
            method::BORDER
        } else {
            method::NO_BORDER
        };
        dir | division | border
    }

    /// Reject sizes no box could satisfy
    pub fn validate_size(&self, size: u32) -> Result<()> {
        if self.division == Division::Proportional && size > 100 {
            return Err(GlkError::InvalidSplit(format!(
                "proportional size {size} exceeds 100%"
            )));
        }
        Ok(())
    }
}

/// Character metrics of a pair's key window, needed for fixed splits
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub charbox: Size,
    pub margin_total: Size,
}

/// Split descriptor of one pair window, keyed by child tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub method: SplitMethod,
    /// Split size (cells or percent)
    pub size: u32,
    /// Key window; `None` once the key window has been closed
    pub key: Option<Tag>,
    /// Metrics of the key window at the time of the last rearrange
    pub key_metrics: Option<KeyMetrics>,
    pub child1: Tag,
    pub child2: Tag,
}

impl Geometry {
    pub fn vertical(&self) -> bool {
        self.method.dir.is_vertical()
    }

    pub fn backward(&self) -> bool {
        self.method.dir.is_backward()
    }

    /// Divide `bbox` into the boxes for child1 and child2.
    ///
    /// Child2 always receives the measured split; backward splits place it
    /// first along the axis. The border gap only exists when the method asks
    /// for one.
    pub fn compute_division(&self, bbox: Rect, border_width: f64) -> (Rect, Rect) {
        let vertical = self.vertical();
        let (min, max) = if vertical {
            (bbox.x, bbox.right())
        } else {
            (bbox.y, bbox.bottom())
        };
        let diff = (max - min).max(0.0);

        let splitwid = if self.method.border {
            border_width.clamp(0.0, diff)
        } else {
            0.0
        };

        let split = match self.method.division {
            Division::Fixed => match self.key_metrics {
                Some(m) if vertical => {
                    (self.size as f64 * m.charbox.width + m.margin_total.width).ceil()
                }
                Some(m) => (self.size as f64 * m.charbox.height + m.margin_total.height).ceil(),
                None => 0.0,
            },
            Division::Proportional => (diff * self.size as f64 / 100.0).floor(),
        };
        let split = split.clamp(0.0, diff - splitwid);

        let split_at = if self.backward() {
            min + split
        } else {
            max - split - splitwid
        };

        let (first, second) = if vertical {
            (
                Rect::new(min, bbox.y, split_at - min, bbox.height),
                Rect::new(split_at + splitwid, bbox.y, max - split_at - splitwid, bbox.height),
            )
        } else {
            (
                Rect::new(bbox.x, min, bbox.width, split_at - min),
                Rect::new(bbox.x, split_at + splitwid, bbox.width, max - split_at - splitwid),
            )
        };

        if self.backward() {
            (second, first)
        } else {
            (first, second)
        }
    }
}
