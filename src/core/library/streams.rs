//! Stream operations
//!
//! Output goes to a stream by tag or to the current stream. Window streams
//! append to their window and copy to the window's echo stream; memory and
//! file streams write to their own storage.

use serde::{Deserialize, Serialize};

use super::Library;
use crate::core::fileref::FileUsage;
use crate::core::stream::{
    code_to_char, FileMode, FileStream, MemoryData, SeekMode, Stream, StreamKind, StreamResult,
};
use crate::core::Tag;
use crate::error::{GlkError, Result};

/// Echo chains longer than this are cut off
const MAX_ECHO_DEPTH: usize = 8;

/// What closing a stream hands back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedStream {
    pub result: StreamResult,
    /// Final buffer of a memory stream
    pub memory: Option<MemoryData>,
}

impl Library {
    /// Open a memory stream over `data`; its length is the capacity
    pub fn stream_open_memory(&mut self, data: MemoryData, mode: FileMode, rock: u32) -> Result<Tag> {
        if mode == FileMode::WriteAppend {
            return Err(self.report_err(GlkError::InvalidOperation(
                "memory streams cannot be opened for append".into(),
            )));
        }
        let tag = self.next_tag();
        self.streams.insert(tag, Stream::memory(tag, data, mode, rock));
        tracing::debug!("opened memory stream {} ({:?})", tag, mode);
        Ok(tag)
    }

    /// Open the file named by a file reference
    pub fn stream_open_file(
        &mut self,
        fileref: Tag,
        mode: FileMode,
        rock: u32,
        unicode: bool,
    ) -> Result<Tag> {
        let fref = self.fileref(fileref)?;
        let path = fref.pathname();
        let text = fref.text_mode;
        let usage = fref.usage;

        if mode != FileMode::Read {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = FileStream::open(&path, mode, text).map_err(|e| {
            tracing::warn!("cannot open {} for {:?}: {}", path.display(), mode, e);
            e
        })?;

        let tag = self.next_tag();
        self.streams.insert(tag, Stream::file(tag, file, unicode, rock));
        tracing::debug!("opened file stream {} on {}", tag, path.display());

        if usage == FileUsage::Transcript || usage == FileUsage::InputRecord {
            tracing::info!("{} started: {}", usage.label(), path.display());
        }
        Ok(tag)
    }

    /// Close a memory or file stream.
    ///
    /// Window streams close with their window.
    pub fn stream_close(&mut self, tag: Tag) -> Result<ClosedStream> {
        let stream = self.stream(tag)?;
        if stream.window_tag().is_some() {
            return Err(self.report_err(GlkError::InvalidOperation(format!(
                "stream {tag} belongs to a window"
            ))));
        }

        let Some(mut stream) = self.streams.remove(&tag) else {
            return Err(GlkError::UnknownTag(tag));
        };
        self.drop_stream_refs(tag);
        if let Err(e) = stream.flush() {
            tracing::warn!("flushing stream {} on close: {}", tag, e);
        }

        let memory = match stream.kind {
            StreamKind::Memory(m) => Some(m.data),
            _ => None,
        };
        tracing::debug!("closed stream {}", tag);
        Ok(ClosedStream {
            result: StreamResult {
                read_count: stream.read_count,
                write_count: stream.write_count,
            },
            memory,
        })
    }

    /// Forget every reference to a stream that is going away
    pub(crate) fn drop_stream_refs(&mut self, tag: Tag) {
        if self.current_stream == Some(tag) {
            self.current_stream = None;
        }
        for win in self.windows.values_mut() {
            if win.echo_stream == Some(tag) {
                win.echo_stream = None;
            }
        }
    }

    pub fn set_current_stream(&mut self, tag: Option<Tag>) -> Result<()> {
        if let Some(tag) = tag {
            self.stream(tag)?;
        }
        self.current_stream = tag;
        Ok(())
    }

    pub fn current_stream(&self) -> Option<Tag> {
        self.current_stream
    }

    /// The stream after `after` in tag order, with its rock
    pub fn stream_iterate(&self, after: Option<Tag>) -> Option<(Tag, u32)> {
        let mut iter = match after {
            None => self.streams.range(..),
            Some(t) => self.streams.range((std::ops::Bound::Excluded(t), std::ops::Bound::Unbounded)),
        };
        iter.next().map(|(tag, s)| (*tag, s.rock))
    }

    /// Running counts of an open stream
    pub fn stream_result(&self, tag: Tag) -> Result<StreamResult> {
        Ok(self.stream(tag)?.result())
    }

    /// Write to the current stream; nothing happens if there is none
    pub fn put_string(&mut self, text: &str) {
        if let Some(tag) = self.current_stream {
            if let Err(e) = self.put_string_stream(tag, text) {
                tracing::debug!("write to current stream failed: {}", e);
            }
        }
    }

    pub fn put_char(&mut self, ch: u32) {
        let mut buf = [0u8; 4];
        let text = code_to_char(ch).encode_utf8(&mut buf);
        self.put_string(text);
    }

    pub fn put_char_stream(&mut self, tag: Tag, ch: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        let text = code_to_char(ch).encode_utf8(&mut buf);
        self.put_string_stream(tag, text)
    }

    pub fn put_string_stream(&mut self, tag: Tag, text: &str) -> Result<()> {
        let result = self.write_stream(tag, text, 0);
        self.report(result)
    }

    /// Write raw character codes (bytes for Latin-1 output)
    pub fn put_buffer_stream(&mut self, tag: Tag, codes: &[u32]) -> Result<()> {
        let text: String = codes.iter().map(|&c| code_to_char(c)).collect();
        self.put_string_stream(tag, &text)
    }

    /// Copy window output into an echo stream
    pub(crate) fn write_echo(&mut self, tag: Tag, text: &str) {
        self.echo_at_depth(tag, text, 1);
    }

    /// Echo failures are logged; the window output that caused them stands
    fn echo_at_depth(&mut self, tag: Tag, text: &str, depth: usize) {
        if let Err(e) = self.write_stream(tag, text, depth) {
            tracing::debug!("echo to stream {} failed: {}", tag, e);
        }
    }

    fn write_stream(&mut self, tag: Tag, text: &str, depth: usize) -> Result<()> {
        if depth > MAX_ECHO_DEPTH {
            tracing::warn!("echo chain through stream {} too deep, output dropped", tag);
            return Ok(());
        }
        let stream = self
            .streams
            .get_mut(&tag)
            .ok_or(GlkError::UnknownTag(tag))?;
        stream.check_writable()?;

        let Some(win) = stream.window_tag() else {
            return stream.put_chars(text.chars().map(u32::from));
        };

        let window = self.windows.get(&win).ok_or(GlkError::UnknownTag(win))?;
        if window.input.line_request() {
            return Err(GlkError::InvalidOperation(format!(
                "output to window {win} while it waits for line input"
            )));
        }

        stream.put_chars(text.chars().map(u32::from))?;
        let echo = match self.windows.get_mut(&win) {
            Some(window) => {
                window.put_str(text);
                window.echo_stream
            }
            None => None,
        };
        if let Some(echo) = echo.filter(|&echo| echo != tag) {
            self.echo_at_depth(echo, text, depth + 1);
        }
        Ok(())
    }

    /// Set the output style of the current stream
    pub fn set_style(&mut self, style: u32) {
        if let Some(tag) = self.current_stream {
            if let Err(e) = self.set_style_stream(tag, style) {
                tracing::debug!("set style on current stream failed: {}", e);
            }
        }
    }

    /// Set the output style of a stream; only window streams have styles
    pub fn set_style_stream(&mut self, tag: Tag, style: u32) -> Result<()> {
        let Some(win) = self.stream(tag)?.window_tag() else {
            return Ok(());
        };
        self.window_mut(win)?.style = style;
        Ok(())
    }

    /// Read one character; `None` at end of stream
    pub fn get_char_stream(&mut self, tag: Tag, unicode: bool) -> Result<Option<u32>> {
        let result = self.stream_mut(tag)?.get_char(unicode);
        self.report(result)
    }

    pub fn get_buffer_stream(&mut self, tag: Tag, len: usize, unicode: bool) -> Result<Vec<u32>> {
        let result = self.stream_mut(tag)?.get_buffer(len, unicode);
        self.report(result)
    }

    pub fn get_line_stream(&mut self, tag: Tag, len: usize, unicode: bool) -> Result<Vec<u32>> {
        let result = self.stream_mut(tag)?.get_line(len, unicode);
        self.report(result)
    }

    pub fn stream_set_position(&mut self, tag: Tag, pos: i64, mode: SeekMode) -> Result<()> {
        let result = self.stream_mut(tag)?.set_position(pos, mode);
        self.report(result)
    }

    pub fn stream_get_position(&self, tag: Tag) -> Result<u64> {
        Ok(self.stream(tag)?.position())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::geometry::{Division, SplitDir, SplitMethod};
    use crate::core::library::tests::library;
    use crate::core::library::Library;
    use crate::core::stream::{FileMode, MemoryData, SeekMode};
    use crate::core::{style, Tag, WindowType};
    use crate::error::GlkError;

    fn with_buffer() -> (Library, Tag, Tag) {
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
        lib.set_current_stream(Some(stream)).unwrap();
        (lib, win, stream)
    }

    fn codes(s: &str) -> Vec<u32> {
        s.chars().map(u32::from).collect()
    }

    #[test]
    fn test_window_stream_writes_styled_text() {
        let (mut lib, win, stream) = with_buffer();
        lib.put_string("You are in ");
        lib.set_style(style::EMPHASIZED);
        lib.put_string("a maze");
        lib.put_char('.' as u32);

        let buffer = lib.window(win).unwrap().buffer().unwrap();
        assert_eq!(buffer.lines()[0].concat(), "You are in a maze.");
        assert_eq!(buffer.lines()[0].spans[1].style, style::EMPHASIZED);
        assert_eq!(lib.stream_result(stream).unwrap().write_count, 18);
    }

    #[test]
    fn test_output_during_line_request_is_dropped() {
        let (mut lib, win, stream) = with_buffer();
        lib.request_line_event(win, false, 80, None).unwrap();
        let err = lib.put_string_stream(stream, "oops").unwrap_err();
        assert!(matches!(err, GlkError::InvalidOperation(_)));
        assert!(lib.window(win).unwrap().buffer().unwrap().lines().is_empty());
        assert_eq!(lib.stream_result(stream).unwrap().write_count, 0);
    }

    #[test]
    fn test_echo_stream_copies_output() {
        let (mut lib, win, _) = with_buffer();
        let mem = lib
            .stream_open_memory(MemoryData::Unicode(vec![0; 16]), FileMode::Write, 0)
            .unwrap();
        lib.set_echo_stream(win, Some(mem)).unwrap();
        lib.put_string("echo me");

        let closed = lib.stream_close(mem).unwrap();
        assert_eq!(closed.result.write_count, 7);
        assert_eq!(closed.memory.unwrap().to_text(7), "echo me");
        assert_eq!(lib.echo_stream(win).unwrap(), None);
    }

    #[test]
    fn test_read_only_echo_stream_rejected() {
        let (mut lib, win, _) = with_buffer();
        let input = lib
            .stream_open_memory(MemoryData::Bytes(b"abc".to_vec()), FileMode::Read, 0)
            .unwrap();
        assert!(matches!(
            lib.set_echo_stream(win, Some(input)),
            Err(GlkError::InvalidOperation(_))
        ));
        assert_eq!(lib.echo_stream(win).unwrap(), None);
    }

    #[test]
    fn test_failed_echo_keeps_window_output() {
        let (mut lib, w1, s1) = with_buffer();
        let w2 = lib
            .open_window(
                Some(w1),
                SplitMethod::new(SplitDir::Below, Division::Proportional),
                50,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        let s2 = lib.window_stream(w2).unwrap().unwrap();
        lib.set_echo_stream(w1, Some(s2)).unwrap();
        lib.request_line_event(w2, false, 80, None).unwrap();

        lib.put_string_stream(s1, "x").unwrap();
        assert_eq!(
            lib.window(w1).unwrap().buffer().unwrap().lines()[0].concat(),
            "x"
        );
        assert_eq!(lib.stream_result(s1).unwrap().write_count, 1);
        assert!(lib.window(w2).unwrap().buffer().unwrap().lines().is_empty());
        assert_eq!(lib.stream_result(s2).unwrap().write_count, 0);
    }

    #[test]
    fn test_echo_cycle_terminates() {
        let (mut lib, w1, s1) = with_buffer();
        let w2 = lib
            .open_window(
                Some(w1),
                SplitMethod::new(SplitDir::Below, Division::Proportional),
                50,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        let s2 = lib.window_stream(w2).unwrap().unwrap();
        lib.set_echo_stream(w1, Some(s2)).unwrap();
        lib.set_echo_stream(w2, Some(s1)).unwrap();

        lib.put_string("x");
        let count = |lib: &Library, w| {
            lib.window(w).unwrap().buffer().unwrap().lines()[0].concat().len()
        };
        assert!(count(&lib, w1) > 1);
        assert!(count(&lib, w2) > 1);
    }

    #[test]
    fn test_close_window_stream_rejected() {
        let (mut lib, _, stream) = with_buffer();
        assert!(matches!(
            lib.stream_close(stream),
            Err(GlkError::InvalidOperation(_))
        ));
        assert!(lib.stream(stream).is_ok());
    }

    #[test]
    fn test_close_current_stream_clears_current() {
        let (mut lib, _, _) = with_buffer();
        let mem = lib
            .stream_open_memory(MemoryData::Bytes(vec![0; 4]), FileMode::Write, 5)
            .unwrap();
        lib.set_current_stream(Some(mem)).unwrap();
        lib.put_string("abcdef");
        let closed = lib.stream_close(mem).unwrap();
        assert_eq!(closed.result.write_count, 6);
        assert_eq!(closed.memory, Some(MemoryData::Bytes(b"abcd".to_vec())));
        assert_eq!(lib.current_stream(), None);
    }

    #[test]
    fn test_memory_read_and_seek() {
        let (mut lib, _, _) = with_buffer();
        let mem = lib
            .stream_open_memory(MemoryData::Bytes(b"line one\nline two\n".to_vec()), FileMode::Read, 0)
            .unwrap();
        assert_eq!(lib.get_line_stream(mem, 100, false).unwrap(), codes("line one\n"));
        assert_eq!(lib.stream_get_position(mem).unwrap(), 9);
        lib.stream_set_position(mem, -4, SeekMode::End).unwrap();
        assert_eq!(lib.get_buffer_stream(mem, 10, false).unwrap(), codes("two\n"));
        assert_eq!(lib.get_char_stream(mem, false).unwrap(), None);
    }

    #[test]
    fn test_stream_iterate() {
        let (mut lib, _, window_stream) = with_buffer();
        let mem = lib
            .stream_open_memory(MemoryData::Bytes(vec![0; 4]), FileMode::Write, 9)
            .unwrap();
        assert_eq!(lib.stream_iterate(None).map(|(t, _)| t), Some(window_stream));
        assert_eq!(lib.stream_iterate(Some(window_stream)), Some((mem, 9)));
        assert_eq!(lib.stream_iterate(Some(mem)), None);
    }

    #[test]
    fn test_append_mode_memory_rejected() {
        let (mut lib, _, _) = with_buffer();
        assert!(lib
            .stream_open_memory(MemoryData::Bytes(vec![]), FileMode::WriteAppend, 0)
            .is_err());
    }
}
