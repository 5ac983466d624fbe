//! Library Core Module
//!
//! The interpreter-owned document model. This module contains:
//! - Tags identifying every library-owned entity
//! - The window tree (buffer, grid and pair windows) and split geometry
//! - Style sets
//! - Window, memory and file streams
//! - File references
//! - Immutable snapshots and the archive format
//!
//! Nothing in here blocks or touches another thread; cross-thread hand-off
//! happens in the `event` module.

mod archive;
mod fileref;
mod geometry;
mod grid;
mod input;
pub(crate) mod library;
mod line;
mod snapshot;
mod stream;
mod styleset;
mod tag;
mod window;

pub use archive::{Archive, ArchiveError, LibraryImage, ARCHIVE_VERSION};
pub use fileref::{sanitize_filename, usage, usage_dir, FileRef, FileRefPrompt, FileUsage};
pub use geometry::{method, Division, Geometry, KeyMetrics, Rect, Size, SplitDir, SplitMethod};
pub use grid::{GridLine, TextGrid};
pub use input::{keycode, InputRequest, InputState};
pub use library::{ClosedStream, Library, Settings};
pub use line::{LineStatus, StyledLine, StyledString, TextBuffer};
pub use snapshot::{ContentState, GridRowState, LibraryState, WindowState};
pub use stream::{
    codes_to_string, FileMode, FileStream, MemoryData, MemoryStream, SeekMode, Stream, StreamKind,
    StreamResult,
};
pub use styleset::{style, FontSpec, Insets, Rgb, StyleAttrs, StyleSet};
pub use tag::{Tag, TagCounter};
pub use window::{Window, WindowKind, WindowType};
