//! Transcript of buffer windows, rebuilt from snapshots
//!
//! Snapshots only carry the lines that changed since the previous one.
//! A [`Transcript`] keeps every line it has been shown, keyed by absolute
//! index, so re-shipped lines replace themselves. Cleared pages are moved
//! into history rather than dropped.

use std::collections::BTreeMap;

use crate::core::{ContentState, LibraryState, LineStatus, StyledLine, Tag};

#[derive(Debug, Default)]
struct Page {
    clear_count: u32,
    lines: BTreeMap<usize, StyledLine>,
    history: Vec<String>,
}

impl Page {
    fn render(lines: &BTreeMap<usize, StyledLine>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for line in lines.values() {
            match (line.status, out.last_mut()) {
                (LineStatus::Continue, Some(last)) => last.push_str(&line.concat()),
                _ => out.push(line.concat()),
            }
        }
        out
    }
}

/// Accumulated text of every buffer window
#[derive(Debug, Default)]
pub struct Transcript {
    pages: BTreeMap<Tag, Page>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a snapshot into the transcript
    pub fn apply(&mut self, state: &LibraryState) {
        for win in &state.windows {
            let ContentState::Buffer {
                clear_count, lines, ..
            } = &win.content
            else {
                continue;
            };
            let page = self.pages.entry(win.tag).or_default();
            if page.clear_count != *clear_count {
                let shown = Page::render(&page.lines);
                page.history.extend(shown);
                page.lines.clear();
                page.clear_count = *clear_count;
            }
            for line in lines {
                page.lines.insert(line.index, line.clone());
            }
        }
    }

    /// Lines of one window, history first
    pub fn lines(&self, win: Tag) -> Vec<String> {
        self.pages
            .get(&win)
            .map(|page| {
                let mut all = page.history.clone();
                all.extend(Page::render(&page.lines));
                all
            })
            .unwrap_or_default()
    }

    /// All windows as text, in tag order
    pub fn render(&self) -> String {
        let mut out = String::new();
        for tag in self.pages.keys() {
            for line in self.lines(*tag) {
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
    use crate::core::library::tests::library;
    use crate::core::{Division, SplitDir, SplitMethod, WindowType};

    #[test]
    fn test_lines_join_across_snapshots() {
        let mut lib = library();
        let win = lib
            .open_window(
                None,
                SplitMethod::new(SplitDir::Above, Division::Fixed),
                0,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        let stream = lib.window_stream(win).unwrap().unwrap();
        let mut transcript = Transcript::new();

        lib.put_string_stream(stream, "Hello").unwrap();
        transcript.apply(&lib.clone_state());
        lib.put_string_stream(stream, ", world\nNext").unwrap();
        transcript.apply(&lib.clone_state());

        assert_eq!(transcript.lines(win), vec!["Hello, world", "Next"]);
    }

    #[test]
    fn test_clear_keeps_history() {
        let mut lib = library();
        let win = lib
            .open_window(
                None,
                SplitMethod::new(SplitDir::Above, Division::Fixed),
                0,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        let stream = lib.window_stream(win).unwrap().unwrap();
        let mut transcript = Transcript::new();

        lib.put_string_stream(stream, "first page").unwrap();
        transcript.apply(&lib.clone_state());
        lib.clear_window(win).unwrap();
        lib.put_string_stream(stream, "second page").unwrap();
        transcript.apply(&lib.clone_state());

        lib.dirty_all_data();
        transcript.apply(&lib.clone_state());

        assert_eq!(transcript.lines(win), vec!["first page", "second page"]);
        assert_eq!(transcript.render(), "first page\nsecond page\n");
    }

    #[test]
    fn test_leading_blank_lines_survive() {
        let mut lib = library();
        let win = lib
            .open_window(
                None,
                SplitMethod::new(SplitDir::Above, Division::Fixed),
                0,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        let stream = lib.window_stream(win).unwrap().unwrap();
        let mut transcript = Transcript::new();

        lib.put_string_stream(stream, "\n\nTitle\n").unwrap();
        transcript.apply(&lib.clone_state());

        assert_eq!(transcript.lines(win), vec!["", "", "Title", ""]);
    }
}
