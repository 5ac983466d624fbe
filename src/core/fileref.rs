//! File references
//!
//! A file reference names a file in a usage-specific directory under the
//! configured base directory. Prompted references are answered by the
//! presentation side through a [`FileRefPrompt`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::stream::FileMode;
use super::Tag;

/// What a file is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileUsage {
    Data,
    SavedGame,
    Transcript,
    InputRecord,
}

/// Usage bits as used by `glk_fileref_create_*`
pub mod usage {
    pub const DATA: u32 = 0x00;
    pub const SAVED_GAME: u32 = 0x01;
    pub const TRANSCRIPT: u32 = 0x02;
    pub const INPUT_RECORD: u32 = 0x03;
    pub const TYPE_MASK: u32 = 0x0f;
    pub const TEXT_MODE: u32 = 0x100;
}

impl FileUsage {
    /// Decode usage bits into usage and text mode
    pub fn from_bits(bits: u32) -> (Self, bool) {
        let usage = match bits & usage::TYPE_MASK {
            usage::SAVED_GAME => FileUsage::SavedGame,
            usage::TRANSCRIPT => FileUsage::Transcript,
            usage::INPUT_RECORD => FileUsage::InputRecord,
            _ => FileUsage::Data,
        };
        (usage, bits & usage::TEXT_MODE != 0)
    }

    pub fn bits(self, text: bool) -> u32 {
        let base = match self {
            FileUsage::Data => usage::DATA,
            FileUsage::SavedGame => usage::SAVED_GAME,
            FileUsage::Transcript => usage::TRANSCRIPT,
            FileUsage::InputRecord => usage::INPUT_RECORD,
        };
        if text {
            base | usage::TEXT_MODE
        } else {
            base
        }
    }

    /// Suffix appended to names given by the program
    pub fn suffix(self) -> &'static str {
        match self {
            FileUsage::Data => ".glkdata",
            FileUsage::SavedGame => ".glksave",
            FileUsage::Transcript | FileUsage::InputRecord => ".txt",
        }
    }

    /// Directory (relative to the base) holding files of this usage
    pub fn sub_dir(self, game_id: &str) -> String {
        match self {
            FileUsage::Data => format!("GameData_{game_id}"),
            FileUsage::SavedGame => format!("SavedGames_{game_id}"),
            FileUsage::Transcript => "Transcripts".to_string(),
            FileUsage::InputRecord => "InputRecords".to_string(),
        }
    }

    /// Human-readable label for prompts
    pub fn label(self) -> &'static str {
        match self {
            FileUsage::Data => "data file",
            FileUsage::SavedGame => "saved game",
            FileUsage::Transcript => "transcript",
            FileUsage::InputRecord => "command record",
        }
    }
}

/// A file reference owned by the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub tag: Tag,
    pub rock: u32,
    pub filename: String,
    pub dirname: PathBuf,
    pub usage: FileUsage,
    pub text_mode: bool,
}

impl FileRef {
    pub fn pathname(&self) -> PathBuf {
        self.dirname.join(&self.filename)
    }

    pub fn exists(&self) -> bool {
        self.pathname().is_file()
    }
}

/// Reduce a program-supplied name to a safe file name.
///
/// Everything from the first `.` on is dropped, as are path separators and
/// characters that are unsafe in file names. An empty result becomes `null`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.split('.').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '<' | '>' | ':' | '|' | '?' | '*' | '"'))
        .filter(|c| !c.is_control())
        .collect();
    if cleaned.is_empty() {
        "null".to_string()
    } else {
        cleaned
    }
}

/// Directory for a usage under the base directory
pub fn usage_dir(base: &Path, usage: FileUsage, game_id: &str) -> PathBuf {
    base.join(usage.sub_dir(game_id))
}

/// A pending request for the presentation side to pick a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRefPrompt {
    pub usage: FileUsage,
    pub text_mode: bool,
    pub mode: FileMode,
    pub dirname: PathBuf,
    /// Filled in by the presentation side; `None` means canceled
    pub filename: Option<String>,
}

impl FileRefPrompt {
    pub fn new(usage: FileUsage, text_mode: bool, mode: FileMode, dirname: PathBuf) -> Self {
        Self {
            usage,
            text_mode,
            mode,
            dirname,
            filename: None,
        }
    }

    /// Answer the prompt with a chosen name
    pub fn answered(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}
