//! Archived sessions
//!
//! An archive is a self-describing JSON document holding the library's
//! windows, streams and file references. Entities refer to each other by
//! tag only. Restoring is two passes: materialize every entity, then
//! resolve and validate the tag cross-references, rebuild style sets and
//! reopen file streams at their saved offsets.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fileref::FileRef;
use super::geometry::Rect;
use super::library::{Library, Settings};
use super::stream::{Stream, StreamKind};
use super::window::Window;
use super::Tag;
use crate::error::GlkError;
use crate::host::StylePolicy;

/// Current archive format version
pub const ARCHIVE_VERSION: u32 = 1;

/// Error type for saving and restoring archives
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),

    #[error("{from} refers to missing entity {to}")]
    Dangling { from: Tag, to: Tag },

    #[error("window tree is malformed at {0}")]
    MalformedTree(Tag),

    #[error(transparent)]
    Glk(#[from] GlkError),
}

/// Serializable image of a library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryImage {
    pub windows: Vec<Window>,
    pub streams: Vec<Stream>,
    pub filerefs: Vec<FileRef>,
    pub root: Option<Tag>,
    pub current_stream: Option<Tag>,
    pub bounds: Rect,
    pub last_tag: u32,
    pub timer_interval: Option<u32>,
}

/// Archive envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    pub version: u32,
    pub library: LibraryImage,
    /// Interpreter-specific data, stored as-is
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl Archive {
    pub fn to_json(&self) -> Result<String, ArchiveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ArchiveError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the archive to a file
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read an archive from a file
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Library {
    /// Capture the library for archiving.
    ///
    /// File streams record their current byte offset; open handles are not
    /// part of the image.
    pub fn to_archive(&self, extra: serde_json::Value) -> Archive {
        Archive {
            version: ARCHIVE_VERSION,
            library: LibraryImage {
                windows: self.windows.values().cloned().collect(),
                streams: self.streams.values().cloned().collect(),
                filerefs: self.filerefs.values().cloned().collect(),
                root: self.root,
                current_stream: self.current_stream,
                bounds: self.bounds,
                last_tag: self.tags.last(),
                timer_interval: self.timer_interval,
            },
            extra,
        }
    }

    /// Rebuild a library from an archive
    pub fn from_archive(
        archive: Archive,
        settings: Settings,
        policy: Arc<dyn StylePolicy>,
    ) -> Result<Self, ArchiveError> {
        if archive.version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(archive.version));
        }
        let image = archive.library;

        // First pass: materialize
        let windows: BTreeMap<Tag, Window> =
            image.windows.into_iter().map(|w| (w.tag, w)).collect();
        let streams: BTreeMap<Tag, Stream> =
            image.streams.into_iter().map(|s| (s.tag, s)).collect();
        let filerefs: BTreeMap<Tag, FileRef> =
            image.filerefs.into_iter().map(|f| (f.tag, f)).collect();

        // Second pass: resolve references
        validate_refs(&windows, &streams, image.root, image.current_stream)?;
        validate_tree(&windows, image.root)?;

        let mut lib = Library::new(settings, policy);
        lib.windows = windows;
        lib.streams = streams;
        lib.filerefs = filerefs;
        lib.root = image.root;
        lib.current_stream = image.current_stream;
        lib.bounds = image.bounds;
        lib.timer_interval = image.timer_interval;

        let highest = lib
            .windows
            .keys()
            .chain(lib.streams.keys())
            .chain(lib.filerefs.keys())
            .max()
            .copied();
        lib.tags.observe(Tag::new(image.last_tag));
        if let Some(highest) = highest {
            lib.tags.observe(highest);
        }

        for stream in lib.streams.values_mut() {
            if let StreamKind::File(file) = &mut stream.kind {
                file.reopen()?;
            }
        }

        for win in lib.windows.values_mut() {
            win.mark_all_dirty();
        }
        lib.rebuild_stylesets();
        lib.mark_everything_changed();

        let problems = lib.sanity_check();
        if let Some(first) = problems.first() {
            return Err(GlkError::InvalidOperation(format!("restored tree is invalid: {first}")).into());
        }

        tracing::info!(
            "restored {} windows, {} streams, {} filerefs",
            lib.windows.len(),
            lib.streams.len(),
            lib.filerefs.len()
        );
        Ok(lib)
    }
}

fn validate_refs(
    windows: &BTreeMap<Tag, Window>,
    streams: &BTreeMap<Tag, Stream>,
    root: Option<Tag>,
    current: Option<Tag>,
) -> Result<(), ArchiveError> {
    let check = |present: bool, from: Tag, to: Tag| {
        if present {
            Ok(())
        } else {
            Err(ArchiveError::Dangling { from, to })
        }
    };

    if let Some(root) = root {
        check(windows.contains_key(&root), root, root)?;
    }
    if let Some(current) = current {
        check(streams.contains_key(&current), current, current)?;
    }

    for win in windows.values() {
        if let Some(parent) = win.parent {
            check(windows.contains_key(&parent), win.tag, parent)?;
        }
        if let Some((c1, c2)) = win.children() {
            check(windows.contains_key(&c1), win.tag, c1)?;
            check(windows.contains_key(&c2), win.tag, c2)?;
        }
        if let Some(key) = win.geometry().and_then(|g| g.key) {
            check(windows.contains_key(&key), win.tag, key)?;
        }
        if let Some(stream) = win.stream {
            check(streams.contains_key(&stream), win.tag, stream)?;
        }
        if let Some(echo) = win.echo_stream {
            check(streams.contains_key(&echo), win.tag, echo)?;
        }
    }

    for stream in streams.values() {
        if let Some(win) = stream.window_tag() {
            check(windows.contains_key(&win), stream.tag, win)?;
        }
    }
    Ok(())
}

/// Check the tree shape before anything walks it: parent links match
/// child links and every window is reached exactly once from the root.
fn validate_tree(windows: &BTreeMap<Tag, Window>, root: Option<Tag>) -> Result<(), ArchiveError> {
    let Some(root) = root else {
        return match windows.keys().next() {
            Some(&orphan) => Err(ArchiveError::MalformedTree(orphan)),
            None => Ok(()),
        };
    };

    let mut seen = BTreeSet::new();
    let mut stack = vec![(root, None)];
    while let Some((tag, parent)) = stack.pop() {
        let win = windows.get(&tag).ok_or(ArchiveError::Dangling {
            from: parent.unwrap_or(tag),
            to: tag,
        })?;
        if win.parent != parent || !seen.insert(tag) {
            return Err(ArchiveError::MalformedTree(tag));
        }
        if let Some((c1, c2)) = win.children() {
            stack.push((c2, Some(tag)));
            stack.push((c1, Some(tag)));
        }
    }

    match windows.keys().find(|tag| !seen.contains(tag)) {
        Some(&orphan) => Err(ArchiveError::MalformedTree(orphan)),
        None => Ok(()),
    }
}
