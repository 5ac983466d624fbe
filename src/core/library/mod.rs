//! The library document
//!
//! `Library` owns every window, stream and file reference, keyed by tag.
//! It lives on the interpreter thread; the presentation side only ever sees
//! tags and [`LibraryState`] snapshots.
//!
//! Every fallible operation validates its arguments before touching any
//! state, so a failed call leaves the library exactly as it was. Failures
//! that indicate interpreter bugs are also reported on the strict-warning
//! channel.

mod files;
mod input;
mod streams;
mod tree;

pub use streams::ClosedStream;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::archive::{Archive, ArchiveError};
use super::fileref::{FileRef, FileRefPrompt};
use super::geometry::Rect;
use super::snapshot::{LibraryState, WindowState};
use super::stream::Stream;
use super::styleset::StyleSet;
use super::window::{Window, WindowType};
use super::{Tag, TagCounter};
use crate::error::{strict_warning, GlkError, Result, StrictPolicy};
use crate::host::StylePolicy;

/// Per-library settings, usually derived from the app config
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for file references
    pub base_dir: PathBuf,
    /// Qualifies data and save directories
    pub game_id: String,
    /// Gap between the children of a pair with a border
    pub border_width: f64,
    /// Lines retained per buffer window (0 = unlimited)
    pub max_buffer_lines: usize,
    pub strict: StrictPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("glk-bridge"),
            game_id: "game".to_string(),
            border_width: 1.0,
            max_buffer_lines: 0,
            strict: StrictPolicy::Log,
        }
    }
}

/// The authoritative window/stream/file document
pub struct Library {
    pub(crate) windows: BTreeMap<Tag, Window>,
    pub(crate) streams: BTreeMap<Tag, Stream>,
    pub(crate) filerefs: BTreeMap<Tag, FileRef>,
    pub(crate) root: Option<Tag>,
    pub(crate) current_stream: Option<Tag>,
    pub(crate) bounds: Rect,
    pub(crate) tags: TagCounter,
    pub(crate) timer_interval: Option<u32>,
    special_request: Option<FileRefPrompt>,
    generation: u64,
    geometry_changed: bool,
    metrics_changed: bool,
    everything_changed: bool,
    vm_exited: bool,
    settings: Settings,
    policy: Arc<dyn StylePolicy>,
    buffer_styles: Arc<StyleSet>,
    grid_styles: Arc<StyleSet>,
}

impl Library {
    /// Create an empty library
    pub fn new(settings: Settings, policy: Arc<dyn StylePolicy>) -> Self {
        let buffer_styles = Arc::new(policy.styleset(WindowType::TextBuffer));
        let grid_styles = Arc::new(policy.styleset(WindowType::TextGrid));
        Self {
            windows: BTreeMap::new(),
            streams: BTreeMap::new(),
            filerefs: BTreeMap::new(),
            root: None,
            current_stream: None,
            bounds: Rect::default(),
            tags: TagCounter::default(),
            timer_interval: None,
            special_request: None,
            generation: 0,
            geometry_changed: false,
            metrics_changed: false,
            everything_changed: true,
            vm_exited: false,
            settings,
            policy,
            buffer_styles,
            grid_styles,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the whole library with a restored archive.
    ///
    /// The current viewport is kept and the windows are laid out in it.
    /// On failure the library is left as it was.
    pub fn restore(&mut self, archive: Archive) -> std::result::Result<(), ArchiveError> {
        let mut restored =
            Library::from_archive(archive, self.settings.clone(), Arc::clone(&self.policy))?;
        restored.generation = self.generation;
        if !self.bounds.is_empty() {
            restored.set_bounds(self.bounds);
        }
        *self = restored;
        Ok(())
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn geometry_changed(&self) -> bool {
        self.geometry_changed
    }

    pub fn metrics_changed(&self) -> bool {
        self.metrics_changed
    }

    pub fn everything_changed(&self) -> bool {
        self.everything_changed
    }

    pub fn vm_exited(&self) -> bool {
        self.vm_exited
    }

    pub fn set_vm_exited(&mut self) {
        self.vm_exited = true;
    }

    /// Timer interval in milliseconds, if a timer is requested
    pub fn timer_interval(&self) -> Option<u32> {
        self.timer_interval
    }

    /// Record the requested timer interval (0 stops the timer)
    pub fn set_timer_interval(&mut self, millis: u32) {
        self.timer_interval = (millis > 0).then_some(millis);
    }

    pub fn special_request(&self) -> Option<&FileRefPrompt> {
        self.special_request.as_ref()
    }

    pub fn window(&self, tag: Tag) -> Result<&Window> {
        let result = self.windows.get(&tag).ok_or(GlkError::UnknownTag(tag));
        self.report(result)
    }

    pub(crate) fn window_mut(&mut self, tag: Tag) -> Result<&mut Window> {
        if !self.windows.contains_key(&tag) {
            return Err(self.report_err(GlkError::UnknownTag(tag)));
        }
        self.windows
            .get_mut(&tag)
            .ok_or(GlkError::UnknownTag(tag))
    }

    pub fn stream(&self, tag: Tag) -> Result<&Stream> {
        let result = self.streams.get(&tag).ok_or(GlkError::UnknownTag(tag));
        self.report(result)
    }

    pub(crate) fn stream_mut(&mut self, tag: Tag) -> Result<&mut Stream> {
        if !self.streams.contains_key(&tag) {
            return Err(self.report_err(GlkError::UnknownTag(tag)));
        }
        self.streams
            .get_mut(&tag)
            .ok_or(GlkError::UnknownTag(tag))
    }

    pub fn fileref(&self, tag: Tag) -> Result<&FileRef> {
        let result = self.filerefs.get(&tag).ok_or(GlkError::UnknownTag(tag));
        self.report(result)
    }

    /// All windows in tag order
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Shared style set for a window type
    pub(crate) fn styles_for(&self, wintype: WindowType) -> Arc<StyleSet> {
        match wintype {
            WindowType::TextGrid => Arc::clone(&self.grid_styles),
            _ => Arc::clone(&self.buffer_styles),
        }
    }

    /// Rebuild every style set through the style policy, then re-lay out.
    ///
    /// Called when the host's fonts or spacing change.
    pub fn rebuild_stylesets(&mut self) {
        self.buffer_styles = Arc::new(self.policy.styleset(WindowType::TextBuffer));
        self.grid_styles = Arc::new(self.policy.styleset(WindowType::TextGrid));
        let (buffer, grid) = (Arc::clone(&self.buffer_styles), Arc::clone(&self.grid_styles));
        for win in self.windows.values_mut() {
            win.styleset = match win.window_type() {
                WindowType::TextGrid => Arc::clone(&grid),
                _ => Arc::clone(&buffer),
            };
        }
        self.metrics_changed = true;
        self.rearrange();
        tracing::debug!("style sets rebuilt for {} windows", self.windows.len());
    }

    /// Pass a result through, reporting interpreter errors
    pub(crate) fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if !err.is_benign() {
                strict_warning(self.settings.strict, err);
            }
        }
        result
    }

    pub(crate) fn report_err(&self, err: GlkError) -> GlkError {
        if !err.is_benign() {
            strict_warning(self.settings.strict, &err);
        }
        err
    }

    pub(crate) fn next_tag(&mut self) -> Tag {
        self.tags.next()
    }

    /// Take a snapshot for the presentation side.
    ///
    /// Windows are visited in tree order. Afterwards every window counts as
    /// shipped and the change flags are reset.
    pub fn clone_state(&mut self) -> LibraryState {
        self.generation += 1;
        let windows = self
            .tree_order()
            .into_iter()
            .filter_map(|tag| self.windows.get(&tag))
            .map(WindowState::from_window)
            .collect();

        let state = LibraryState {
            generation: self.generation,
            windows,
            root: self.root,
            bounds: self.bounds,
            vm_exited: self.vm_exited,
            special_request: self.special_request.clone(),
            geometry_changed: self.geometry_changed,
            metrics_changed: self.metrics_changed,
            everything_changed: self.everything_changed,
        };

        for win in self.windows.values_mut() {
            win.mark_clean();
        }
        self.geometry_changed = false;
        self.metrics_changed = false;
        self.everything_changed = false;
        state
    }

    /// Window tags in depth-first order from the root
    pub fn tree_order(&self) -> Vec<Tag> {
        let mut order = Vec::with_capacity(self.windows.len());
        let mut pending: Vec<Tag> = self.root.into_iter().collect();
        while let Some(tag) = pending.pop() {
            let Some(win) = self.windows.get(&tag) else {
                continue;
            };
            order.push(tag);
            if let Some((child1, child2)) = win.children() {
                pending.push(child2);
                pending.push(child1);
            }
        }
        order
    }

    /// Mark everything for a full redraw and reissue pending input requests.
    ///
    /// Used when the presentation side lost its state. Responses addressed
    /// to the old request ids become stale. Returns the windows whose
    /// requests were reissued.
    pub fn dirty_all_data(&mut self) -> Vec<(Tag, u32)> {
        let mut reissued = Vec::new();
        for win in self.windows.values_mut() {
            win.mark_all_dirty();
            if let Some(id) = win.input.reissue() {
                reissued.push((win.tag, id));
            }
        }
        self.everything_changed = true;
        self.geometry_changed = true;
        tracing::debug!("all data dirtied, {} requests reissued", reissued.len());
        reissued
    }

    /// Check structural invariants; returns a description of each violation
    pub fn sanity_check(&self) -> Vec<String> {
        let mut problems = Vec::new();

        match self.root {
            Some(root) => match self.windows.get(&root) {
                Some(win) if win.parent.is_some() => {
                    problems.push(format!("root window {root} has a parent"))
                }
                Some(_) => {}
                None => problems.push(format!("root window {root} does not exist")),
            },
            None if !self.windows.is_empty() => {
                problems.push("windows exist without a root".to_string())
            }
            None => {}
        }

        for win in self.windows.values() {
            if let Some(parent) = win.parent {
                match self.windows.get(&parent).and_then(Window::children) {
                    Some((c1, c2)) if c1 == win.tag || c2 == win.tag => {}
                    _ => problems.push(format!(
                        "window {} is not a child of its parent {parent}",
                        win.tag
                    )),
                }
            }
            if let Some(geom) = win.geometry() {
                for child in [geom.child1, geom.child2] {
                    match self.windows.get(&child) {
                        Some(c) if c.parent == Some(win.tag) => {}
                        _ => problems.push(format!(
                            "pair {} has a bad child {child}",
                            win.tag
                        )),
                    }
                }
                if let Some(key) = geom.key {
                    if !self.windows.contains_key(&key) {
                        problems.push(format!("pair {} has a dead key {key}", win.tag));
                    }
                }
            }
            if let Some(stream) = win.stream {
                if !self.streams.contains_key(&stream) {
                    problems.push(format!("window {} has a dead stream {stream}", win.tag));
                }
            }
            if let Some(echo) = win.echo_stream {
                if !self.streams.contains_key(&echo) {
                    problems.push(format!("window {} has a dead echo stream {echo}", win.tag));
                }
            }
        }

        let reachable = self.tree_order();
        if reachable.len() != self.windows.len() {
            problems.push(format!(
                "{} windows reachable from the root, {} exist",
                reachable.len(),
                self.windows.len()
            ));
        }

        for stream in self.streams.values() {
            if let Some(win) = stream.window_tag() {
                if !self.windows.contains_key(&win) {
                    problems.push(format!("stream {} targets dead window {win}", stream.tag));
                }
            }
        }
        if let Some(current) = self.current_stream {
            if !self.streams.contains_key(&current) {
                problems.push(format!("current stream {current} does not exist"));
            }
        }

        problems
    }

    /// Drop everything for a restart; tags start over from 1
    pub fn clear_for_restart(&mut self) {
        self.windows.clear();
        self.streams.clear();
        self.filerefs.clear();
        self.root = None;
        self.current_stream = None;
        self.special_request = None;
        self.timer_interval = None;
        self.tags.reset();
        self.vm_exited = false;
        self.geometry_changed = true;
        self.everything_changed = true;
        tracing::info!("library cleared for restart");
    }

    pub(crate) fn set_special_request(&mut self, prompt: Option<FileRefPrompt>) {
        self.special_request = prompt;
    }

    pub(crate) fn mark_geometry_changed(&mut self) {
        self.geometry_changed = true;
    }

    pub(crate) fn mark_everything_changed(&mut self) {
        self.everything_changed = true;
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("windows", &self.windows.len())
            .field("streams", &self.streams.len())
            .field("filerefs", &self.filerefs.len())
            .field("root", &self.root)
            .field("bounds", &self.bounds)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::geometry::{Division, SplitDir, SplitMethod};
    use crate::host::DefaultStyles;

    pub(crate) fn library() -> Library {
        let mut lib = Library::new(Settings::default(), Arc::new(DefaultStyles::default()));
        lib.set_bounds(Rect::new(0.0, 0.0, 400.0, 300.0));
        lib
    }

    fn above() -> SplitMethod {
        SplitMethod::new(SplitDir::Above, Division::Fixed)
    }

    #[test]
    fn test_clone_state_resets_flags() {
        let mut lib = library();
        let root = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        assert!(lib.geometry_changed());

        let state = lib.clone_state();
        assert!(state.geometry_changed);
        assert_eq!(state.windows[0].tag, root);
        assert!(!lib.geometry_changed());
        assert!(!lib.everything_changed());

        let next = lib.clone_state();
        assert_eq!(next.generation, state.generation + 1);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let mut lib = library();
        let win = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        let stream = lib.window(win).unwrap().stream;
        lib.set_current_stream(stream).unwrap();
        lib.put_string("first");

        let state = lib.clone_state();
        lib.put_string(" second");
        lib.clear_window(win).unwrap();
        lib.close_window(win).unwrap();

        let ws = state.window(win).unwrap();
        assert_eq!(ws.text_lines(), vec!["first"]);
        assert_eq!(state.windows.len(), 1);
    }

    #[test]
    fn test_tree_order_is_depth_first() {
        let mut lib = library();
        let w1 = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        let w2 = lib
            .open_window(Some(w1), above(), 2, WindowType::TextGrid, 0)
            .unwrap();
        let pair = lib.parent(w1).unwrap().unwrap();
        assert_eq!(lib.tree_order(), vec![pair, w1, w2]);
    }

    #[test]
    fn test_dirty_all_data_reissues_requests() {
        let mut lib = library();
        let win = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        assert_eq!(lib.request_line_event(win, false, 80, None).unwrap(), 1);
        lib.clone_state();

        let reissued = lib.dirty_all_data();
        assert_eq!(reissued, vec![(win, 2)]);
        let state = lib.clone_state();
        assert!(state.everything_changed);
        assert_eq!(state.window(win).unwrap().input_request_id, 2);
        assert!(state.window(win).unwrap().line_request);
    }

    #[test]
    fn test_sanity_check_clean_tree() {
        let mut lib = library();
        let w1 = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        let w2 = lib
            .open_window(Some(w1), above(), 1, WindowType::TextGrid, 0)
            .unwrap();
        lib.open_window(Some(w2), above(), 1, WindowType::TextBuffer, 0)
            .unwrap();
        assert!(lib.sanity_check().is_empty());
        lib.close_window(w2).unwrap();
        assert!(lib.sanity_check().is_empty());
    }

    #[test]
    fn test_clear_for_restart_resets_tags() {
        let mut lib = library();
        lib.open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        lib.clear_for_restart();
        assert_eq!(lib.window_count(), 0);
        assert!(lib.root().is_none());
        let again = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        assert_eq!(again.get(), 1);
    }

    #[test]
    fn test_rebuild_stylesets_marks_metrics() {
        let mut lib = library();
        let win = lib
            .open_window(None, above(), 0, WindowType::TextBuffer, 0)
            .unwrap();
        lib.clone_state();
        lib.rebuild_stylesets();
        assert!(lib.metrics_changed());
        assert!(Arc::ptr_eq(
            &lib.window(win).unwrap().styleset,
            &lib.styles_for(WindowType::TextBuffer)
        ));
    }
}
