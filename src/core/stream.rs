//! Streams
//!
//! A stream is a readable and/or writable channel with running counters.
//! Window streams forward writes to their window (routed by the library);
//! memory streams work over an owned fixed-capacity buffer; file streams
//! work over a file opened from a file reference.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Tag;
use crate::error::{GlkError, Result};

/// File access modes, numbered as in `glk.h`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    Write,
    Read,
    ReadWrite,
    WriteAppend,
}

impl FileMode {
    pub fn code(self) -> u32 {
        match self {
            FileMode::Write => 0x01,
            FileMode::Read => 0x02,
            FileMode::ReadWrite => 0x03,
            FileMode::WriteAppend => 0x05,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0x01 => Ok(FileMode::Write),
            0x02 => Ok(FileMode::Read),
            0x03 => Ok(FileMode::ReadWrite),
            0x05 => Ok(FileMode::WriteAppend),
            other => Err(GlkError::InvalidOperation(format!(
                "unknown file mode {other:#x}"
            ))),
        }
    }

    pub fn readable(self) -> bool {
        matches!(self, FileMode::Read | FileMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        self != FileMode::Read
    }
}

/// Seek origin for `set_position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekMode {
    Start,
    Current,
    End,
}

impl SeekMode {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(SeekMode::Start),
            1 => Ok(SeekMode::Current),
            2 => Ok(SeekMode::End),
            other => Err(GlkError::InvalidOperation(format!(
                "unknown seek mode {other}"
            ))),
        }
    }
}

/// Final or running character counts of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamResult {
    pub read_count: u32,
    pub write_count: u32,
}

/// Backing storage of a memory stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryData {
    Bytes(Vec<u8>),
    Unicode(Vec<u32>),
}

impl MemoryData {
    pub fn len(&self) -> usize {
        match self {
            MemoryData::Bytes(b) => b.len(),
            MemoryData::Unicode(u) => u.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contents as text (bytes read as Latin-1)
    pub fn to_text(&self, len: usize) -> String {
        match self {
            MemoryData::Bytes(b) => b.iter().take(len).map(|&c| char::from(c)).collect(),
            MemoryData::Unicode(u) => u.iter().take(len).map(|&c| code_to_char(c)).collect(),
        }
    }
}

/// Memory stream state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStream {
    pub data: MemoryData,
    pos: usize,
    /// End of valid data for reading and seeking
    eof: usize,
}

impl MemoryStream {
    pub fn new(data: MemoryData, mode: FileMode) -> Self {
        let eof = if mode == FileMode::Write {
            0
        } else {
            data.len()
        };
        Self { data, pos: 0, eof }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn eof(&self) -> usize {
        self.eof
    }

    fn put(&mut self, ch: u32) {
        if self.pos >= self.data.len() {
            return;
        }
        match &mut self.data {
            MemoryData::Bytes(b) => b[self.pos] = narrow(ch),
            MemoryData::Unicode(u) => u[self.pos] = ch,
        }
        self.pos += 1;
        self.eof = self.eof.max(self.pos);
    }

    fn get(&mut self) -> Option<u32> {
        if self.pos >= self.eof {
            return None;
        }
        let ch = match &self.data {
            MemoryData::Bytes(b) => u32::from(b[self.pos]),
            MemoryData::Unicode(u) => u[self.pos],
        };
        self.pos += 1;
        Some(ch)
    }

    fn seek(&mut self, pos: i64, mode: SeekMode) {
        let base = match mode {
            SeekMode::Start => 0,
            SeekMode::Current => self.pos as i64,
            SeekMode::End => self.eof as i64,
        };
        self.pos = (base + pos).clamp(0, self.eof as i64) as usize;
    }
}

/// File stream state; the handle is reopened after restore
#[derive(Debug, Serialize, Deserialize)]
pub struct FileStream {
    pub path: PathBuf,
    pub mode: FileMode,
    pub text: bool,
    /// Byte offset, refreshed before archiving
    pub offset: u64,
    #[serde(skip)]
    file: Option<File>,
}

impl Clone for FileStream {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            mode: self.mode,
            text: self.text,
            offset: self.byte_offset(),
            file: None,
        }
    }
}

impl FileStream {
    /// Open a file for the given mode
    pub fn open(path: &Path, mode: FileMode, text: bool) -> Result<Self> {
        let mut opts = OpenOptions::new();
        match mode {
            FileMode::Read => opts.read(true),
            FileMode::Write => opts.write(true).create(true).truncate(true),
            FileMode::ReadWrite => opts.read(true).write(true).create(true),
            FileMode::WriteAppend => opts.write(true).create(true),
        };
        let mut file = opts.open(path)?;
        if mode == FileMode::WriteAppend {
            file.seek(SeekFrom::End(0))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            mode,
            text,
            offset: 0,
            file: Some(file),
        })
    }

    /// Reopen after restore, at the archived offset, without truncating
    pub fn reopen(&mut self) -> Result<()> {
        let mut opts = OpenOptions::new();
        opts.read(self.mode.readable()).write(self.mode.writable());
        let mut file = opts.open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        self.file = Some(file);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Current byte offset in the file
    pub fn byte_offset(&self) -> u64 {
        match &self.file {
            Some(file) => {
                let mut handle: &File = file;
                handle.stream_position().unwrap_or(self.offset)
            }
            None => self.offset,
        }
    }

    pub fn sync_offset(&mut self) {
        self.offset = self.byte_offset();
    }

    fn handle(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| GlkError::InvalidOperation("file stream is not open".into()))
    }

    fn put(&mut self, ch: u32, unicode: bool) -> Result<()> {
        let text = self.text;
        let file = self.handle()?;
        if !unicode {
            file.write_all(&[narrow(ch)])?;
        } else if text {
            let mut buf = [0u8; 4];
            file.write_all(code_to_char(ch).encode_utf8(&mut buf).as_bytes())?;
        } else {
            file.write_all(&ch.to_be_bytes())?;
        }
        Ok(())
    }

    fn get(&mut self, unicode: bool) -> Result<Option<u32>> {
        let text = self.text;
        let file = self.handle()?;
        if !unicode {
            return Ok(read_byte(file)?.map(u32::from));
        }
        if !text {
            let mut buf = [0u8; 4];
            let mut got = 0;
            while got < 4 {
                let n = file.read(&mut buf[got..])?;
                if n == 0 {
                    return Ok(None);
                }
                got += n;
            }
            return Ok(Some(u32::from_be_bytes(buf)));
        }
        let Some(lead) = read_byte(file)? else {
            return Ok(None);
        };
        let extra = match lead {
            0x00..=0x7f => 0,
            0xc0..=0xdf => 1,
            0xe0..=0xef => 2,
            0xf0..=0xf7 => 3,
            _ => return Ok(Some(u32::from(char::REPLACEMENT_CHARACTER))),
        };
        let mut bytes = vec![lead];
        for _ in 0..extra {
            match read_byte(file)? {
                Some(b) => bytes.push(b),
                None => break,
            }
        }
        let ch = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Some(u32::from(ch)))
    }

    fn seek(&mut self, pos: i64, mode: SeekMode, unicode: bool) -> Result<()> {
        let unit = if unicode && !self.text { 4 } else { 1 };
        let target = match mode {
            SeekMode::Start => SeekFrom::Start((pos.max(0) * unit) as u64),
            SeekMode::Current => SeekFrom::Current(pos * unit),
            SeekMode::End => SeekFrom::End(pos * unit),
        };
        self.handle()?.seek(target)?;
        Ok(())
    }

    fn position(&self, unicode: bool) -> u64 {
        let unit = if unicode && !self.text { 4 } else { 1 };
        self.byte_offset() / unit
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(f) = self.file.as_mut() {
            f.flush()?;
        }
        Ok(())
    }
}

/// Variant-specific stream state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamKind {
    Window { win: Tag },
    Memory(MemoryStream),
    File(FileStream),
}

/// A stream owned by the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub tag: Tag,
    pub rock: u32,
    pub readable: bool,
    pub writable: bool,
    /// One-byte or four-byte characters; not meaningful for windows
    pub unicode: bool,
    pub read_count: u32,
    pub write_count: u32,
    pub kind: StreamKind,
}

impl Stream {
    pub fn window(tag: Tag, win: Tag) -> Self {
        Self {
            tag,
            rock: 0,
            readable: false,
            writable: true,
            unicode: true,
            read_count: 0,
            write_count: 0,
            kind: StreamKind::Window { win },
        }
    }

    pub fn memory(tag: Tag, data: MemoryData, mode: FileMode, rock: u32) -> Self {
        let unicode = matches!(data, MemoryData::Unicode(_));
        Self {
            tag,
            rock,
            readable: mode.readable(),
            writable: mode.writable(),
            unicode,
            read_count: 0,
            write_count: 0,
            kind: StreamKind::Memory(MemoryStream::new(data, mode)),
        }
    }

    pub fn file(tag: Tag, file: FileStream, unicode: bool, rock: u32) -> Self {
        Self {
            tag,
            rock,
            readable: file.mode.readable(),
            writable: file.mode.writable(),
            unicode,
            read_count: 0,
            write_count: 0,
            kind: StreamKind::File(file),
        }
    }

    /// Window this stream writes to, if it is a window stream
    pub fn window_tag(&self) -> Option<Tag> {
        match self.kind {
            StreamKind::Window { win } => Some(win),
            _ => None,
        }
    }

    pub fn result(&self) -> StreamResult {
        StreamResult {
            read_count: self.read_count,
            write_count: self.write_count,
        }
    }

    pub fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(GlkError::InvalidOperation(format!(
                "stream {} is not writable",
                self.tag
            )))
        }
    }

    pub fn check_readable(&self) -> Result<()> {
        if self.readable {
            Ok(())
        } else {
            Err(GlkError::InvalidOperation(format!(
                "stream {} is not readable",
                self.tag
            )))
        }
    }

    /// Write characters to a memory or file stream.
    ///
    /// Window streams are routed by the library; calling this on one only
    /// updates the count.
    pub fn put_chars(&mut self, chars: impl IntoIterator<Item = u32>) -> Result<()> {
        self.check_writable()?;
        let unicode = self.unicode;
        for ch in chars {
            self.write_count += 1;
            match &mut self.kind {
                StreamKind::Window { .. } => {}
                StreamKind::Memory(m) => m.put(ch),
                StreamKind::File(f) => f.put(ch, unicode)?,
            }
        }
        Ok(())
    }

    /// Read one character; `None` at end of stream
    pub fn get_char(&mut self, unicode: bool) -> Result<Option<u32>> {
        self.check_readable()?;
        let stream_unicode = self.unicode;
        let ch = match &mut self.kind {
            StreamKind::Window { .. } => None,
            StreamKind::Memory(m) => m.get(),
            StreamKind::File(f) => f.get(stream_unicode)?,
        };
        if ch.is_some() {
            self.read_count += 1;
        }
        Ok(ch.map(|c| if unicode { c } else { u32::from(narrow(c)) }))
    }

    /// Read up to `len` characters
    pub fn get_buffer(&mut self, len: usize, unicode: bool) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(len.min(4096));
        while out.len() < len {
            match self.get_char(unicode)? {
                Some(ch) => out.push(ch),
                None => break,
            }
        }
        Ok(out)
    }

    /// Read up to `len - 1` characters, stopping after a newline
    pub fn get_line(&mut self, len: usize, unicode: bool) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        while out.len() + 1 < len {
            match self.get_char(unicode)? {
                Some(ch) => {
                    out.push(ch);
                    if ch == u32::from(b'\n') {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(out)
    }

    pub fn set_position(&mut self, pos: i64, mode: SeekMode) -> Result<()> {
        let unicode = self.unicode;
        match &mut self.kind {
            StreamKind::Window { .. } => Ok(()),
            StreamKind::Memory(m) => {
                m.seek(pos, mode);
                Ok(())
            }
            StreamKind::File(f) => f.seek(pos, mode, unicode),
        }
    }

    pub fn position(&self) -> u64 {
        match &self.kind {
            StreamKind::Window { .. } => u64::from(self.write_count),
            StreamKind::Memory(m) => m.position() as u64,
            StreamKind::File(f) => f.position(self.unicode),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.kind {
            StreamKind::File(f) => f.flush(),
            _ => Ok(()),
        }
    }
}

/// Latin-1 narrowing used for byte streams
fn narrow(ch: u32) -> u8 {
    if ch <= 0xff {
        ch as u8
    } else {
        b'?'
    }
}

pub(crate) fn code_to_char(ch: u32) -> char {
    char::from_u32(ch).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Text from Glk character codes
pub fn codes_to_string(codes: &[u32]) -> String {
    codes.iter().map(|&c| code_to_char(c)).collect()
}

fn read_byte(file: &mut File) -> std::io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    match file.read(&mut b)? {
        0 => Ok(None),
        _ => Ok(Some(b[0])),
    }
}
