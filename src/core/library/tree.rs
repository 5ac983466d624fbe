//! Window tree operations: open, close, layout and queries

use super::Library;
use crate::core::geometry::{Geometry, Rect, SplitMethod};
use crate::core::stream::{Stream, StreamResult};
use crate::core::window::{Window, WindowType};
use crate::core::Tag;
use crate::error::{GlkError, Result};

impl Library {
    /// Set the viewport and lay the tree out again
    pub fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds != bounds {
            self.bounds = bounds;
            self.mark_geometry_changed();
        }
        self.rearrange();
    }

    /// Open a new window.
    ///
    /// With no `split` the window becomes the root. Otherwise `split` is
    /// replaced by a new pair window whose first child is `split` and whose
    /// second child (and key) is the new window.
    pub fn open_window(
        &mut self,
        split: Option<Tag>,
        method: SplitMethod,
        size: u32,
        wintype: WindowType,
        rock: u32,
    ) -> Result<Tag> {
        let result = self.check_open(split, method, size, wintype);
        self.report(result)?;

        let tag = self.next_tag();
        let mut win = Window::leaf(tag, wintype, rock, self.styles_for(wintype));
        let max_lines = self.settings().max_buffer_lines;
        if let Some(buffer) = win.buffer_mut() {
            buffer.set_max_lines(max_lines);
        }

        let stream_tag = self.next_tag();
        win.stream = Some(stream_tag);
        self.streams.insert(stream_tag, Stream::window(stream_tag, tag));

        match split {
            None => {
                self.root = Some(tag);
                self.windows.insert(tag, win);
            }
            Some(split) => {
                let pair_tag = self.next_tag();
                let geometry = Geometry {
                    method,
                    size,
                    key: Some(tag),
                    key_metrics: None,
                    child1: split,
                    child2: tag,
                };
                let mut pair = Window::pair(pair_tag, geometry, self.styles_for(WindowType::Pair));
                let old_parent = self.windows.get(&split).and_then(|w| w.parent);
                pair.parent = old_parent;
                win.parent = Some(pair_tag);

                self.replace_child(old_parent, split, pair_tag);
                if let Some(split_win) = self.windows.get_mut(&split) {
                    split_win.parent = Some(pair_tag);
                }
                self.windows.insert(pair_tag, pair);
                self.windows.insert(tag, win);
            }
        }

        tracing::debug!(
            "opened {:?} window {} (split {:?}, rock {})",
            wintype,
            tag,
            split,
            rock
        );
        self.mark_geometry_changed();
        self.rearrange();
        Ok(tag)
    }

    fn check_open(
        &self,
        split: Option<Tag>,
        method: SplitMethod,
        size: u32,
        wintype: WindowType,
    ) -> Result<()> {
        if wintype == WindowType::Pair {
            return Err(GlkError::InvalidSplit(
                "pair windows cannot be opened directly".into(),
            ));
        }
        match split {
            None if self.root.is_some() => Err(GlkError::InvalidSplit(
                "a root window already exists".into(),
            )),
            None => Ok(()),
            Some(split) => {
                if !self.windows.contains_key(&split) {
                    return Err(GlkError::UnknownTag(split));
                }
                method.validate_size(size)
            }
        }
    }

    /// Point `parent`'s reference to `old` at `new`, or make `new` the root
    fn replace_child(&mut self, parent: Option<Tag>, old: Tag, new: Tag) {
        match parent {
            None => self.root = Some(new),
            Some(parent) => {
                if let Some(geom) = self.windows.get_mut(&parent).and_then(|w| w.geometry_mut()) {
                    if geom.child1 == old {
                        geom.child1 = new;
                    } else if geom.child2 == old {
                        geom.child2 = new;
                    }
                }
            }
        }
    }

    /// Close a window and everything below it.
    ///
    /// The parent pair goes away too and the sibling takes its place.
    /// Returns the final counts of the window's own stream.
    pub fn close_window(&mut self, tag: Tag) -> Result<StreamResult> {
        if !self.windows.contains_key(&tag) {
            return Err(self.report_err(GlkError::UnknownTag(tag)));
        }

        let result = self
            .windows
            .get(&tag)
            .and_then(|w| w.stream)
            .and_then(|s| self.streams.get(&s))
            .map(Stream::result)
            .unwrap_or_default();

        let parent = self.windows.get(&tag).and_then(|w| w.parent);
        let mut doomed = self.subtree(tag);

        match parent {
            None => self.root = None,
            Some(pair_tag) => {
                let (child1, child2) = self
                    .windows
                    .get(&pair_tag)
                    .and_then(Window::children)
                    .unwrap_or((tag, tag));
                let sibling = if child1 == tag { child2 } else { child1 };
                let grandparent = self.windows.get(&pair_tag).and_then(|w| w.parent);
                self.replace_child(grandparent, pair_tag, sibling);
                if let Some(sib) = self.windows.get_mut(&sibling) {
                    sib.parent = grandparent;
                }
                doomed.push(pair_tag);
            }
        }

        for dead in &doomed {
            if let Some(win) = self.windows.remove(dead) {
                if let Some(stream) = win.stream {
                    self.drop_stream_refs(stream);
                    self.streams.remove(&stream);
                }
            }
        }
        for win in self.windows.values_mut() {
            if let Some(geom) = win.geometry_mut() {
                if geom.key.is_some_and(|k| doomed.contains(&k)) {
                    geom.key = None;
                    geom.key_metrics = None;
                }
            }
        }

        tracing::debug!("closed window {} ({} windows removed)", tag, doomed.len());
        self.mark_geometry_changed();
        self.rearrange();
        Ok(result)
    }

    /// Tags of `tag` and all its descendants
    fn subtree(&self, tag: Tag) -> Vec<Tag> {
        let mut out = Vec::new();
        let mut pending = vec![tag];
        while let Some(t) = pending.pop() {
            if let Some((c1, c2)) = self.windows.get(&t).and_then(Window::children) {
                pending.push(c1);
                pending.push(c2);
            }
            out.push(t);
        }
        out
    }

    /// Recompute every box from the current bounds.
    ///
    /// Deterministic: running it again with the same bounds changes nothing.
    pub fn rearrange(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        let border = self.settings().border_width;
        let mut pending = vec![(root, self.bounds)];
        let mut changed = false;

        while let Some((tag, bbox)) = pending.pop() {
            let Some(win) = self.windows.get(&tag) else {
                continue;
            };
            match win.geometry() {
                Some(geom) => {
                    let metrics = geom
                        .key
                        .and_then(|k| self.windows.get(&k))
                        .map(|k| k.styleset.key_metrics());
                    let mut geom = geom.clone();
                    geom.key_metrics = metrics;
                    let (box1, box2) = geom.compute_division(bbox, border);
                    pending.push((geom.child1, box1));
                    pending.push((geom.child2, box2));

                    if let Some(win) = self.windows.get_mut(&tag) {
                        changed |= win.bbox != bbox;
                        win.bbox = bbox;
                        if let Some(g) = win.geometry_mut() {
                            g.key_metrics = metrics;
                        }
                    }
                }
                None => {
                    if let Some(win) = self.windows.get_mut(&tag) {
                        changed |= win.bbox != bbox;
                        win.set_leaf_bbox(bbox);
                    }
                }
            }
        }

        if changed {
            self.mark_geometry_changed();
        }
    }

    /// Change how a pair window divides its box.
    ///
    /// `key` of `None` keeps the current key window. A new key must be a
    /// buffer or grid window inside the pair.
    pub fn set_arrangement(
        &mut self,
        pair: Tag,
        method: SplitMethod,
        size: u32,
        key: Option<Tag>,
    ) -> Result<()> {
        let result = self.check_arrangement(pair, method, size, key);
        self.report(result)?;

        if let Some(geom) = self.windows.get_mut(&pair).and_then(|w| w.geometry_mut()) {
            geom.method = method;
            geom.size = size;
            if key.is_some() {
                geom.key = key;
            }
        }
        self.mark_geometry_changed();
        self.rearrange();
        Ok(())
    }

    fn check_arrangement(
        &self,
        pair: Tag,
        method: SplitMethod,
        size: u32,
        key: Option<Tag>,
    ) -> Result<()> {
        let win = self.windows.get(&pair).ok_or(GlkError::UnknownTag(pair))?;
        if win.geometry().is_none() {
            return Err(GlkError::WrongWindowType(pair));
        }
        method.validate_size(size)?;
        if let Some(key) = key {
            let key_win = self.windows.get(&key).ok_or(GlkError::UnknownTag(key))?;
            if key_win.window_type() == WindowType::Pair {
                return Err(GlkError::InvalidSplit(format!("key window {key} is a pair")));
            }
            if !self.is_ancestor(pair, key) {
                return Err(GlkError::InvalidSplit(format!(
                    "key window {key} is not inside pair {pair}"
                )));
            }
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: Tag, mut tag: Tag) -> bool {
        while let Some(parent) = self.windows.get(&tag).and_then(|w| w.parent) {
            if parent == ancestor {
                return true;
            }
            tag = parent;
        }
        false
    }

    /// Split method, size and key window of a pair
    pub fn arrangement(&self, pair: Tag) -> Result<(SplitMethod, u32, Option<Tag>)> {
        let win = self.window(pair)?;
        let result = win
            .geometry()
            .map(|g| (g.method, g.size, g.key))
            .ok_or(GlkError::WrongWindowType(pair));
        self.report(result)
    }

    pub fn root(&self) -> Option<Tag> {
        self.root
    }

    pub fn parent(&self, tag: Tag) -> Result<Option<Tag>> {
        Ok(self.window(tag)?.parent)
    }

    pub fn sibling(&self, tag: Tag) -> Result<Option<Tag>> {
        let Some(parent) = self.window(tag)?.parent else {
            return Ok(None);
        };
        Ok(self
            .windows
            .get(&parent)
            .and_then(Window::children)
            .map(|(c1, c2)| if c1 == tag { c2 } else { c1 }))
    }

    /// Size in character cells
    pub fn window_size(&self, tag: Tag) -> Result<(u32, u32)> {
        Ok(self.window(tag)?.size_in_cells())
    }

    pub fn window_type(&self, tag: Tag) -> Result<WindowType> {
        Ok(self.window(tag)?.window_type())
    }

    pub fn window_rock(&self, tag: Tag) -> Result<u32> {
        Ok(self.window(tag)?.rock)
    }

    pub fn window_stream(&self, tag: Tag) -> Result<Option<Tag>> {
        Ok(self.window(tag)?.stream)
    }

    /// The window after `after` in tag order, with its rock
    pub fn window_iterate(&self, after: Option<Tag>) -> Option<(Tag, u32)> {
        let mut iter = match after {
            None => self.windows.range(..),
            Some(t) => self.windows.range((std::ops::Bound::Excluded(t), std::ops::Bound::Unbounded)),
        };
        iter.next().map(|(tag, win)| (*tag, win.rock))
    }

    pub fn set_echo_stream(&mut self, win: Tag, stream: Option<Tag>) -> Result<()> {
        if let Some(stream) = stream {
            let result = self.stream(stream)?.check_writable();
            self.report(result)?;
        }
        self.window_mut(win)?.echo_stream = stream;
        Ok(())
    }

    pub fn echo_stream(&self, win: Tag) -> Result<Option<Tag>> {
        Ok(self.window(win)?.echo_stream)
    }

    pub fn move_cursor(&mut self, win: Tag, x: u32, y: u32) -> Result<()> {
        let result = self.window_mut(win)?.move_cursor(x, y);
        self.report(result)
    }

    pub fn clear_window(&mut self, win: Tag) -> Result<()> {
        self.window_mut(win)?.clear();
        Ok(())
    }
}
