//! File reference operations

use std::path::PathBuf;

use super::Library;
use crate::core::fileref::{sanitize_filename, usage_dir, FileRef, FileRefPrompt, FileUsage};
use crate::core::stream::FileMode;
use crate::core::Tag;
use crate::error::{GlkError, Result};

impl Library {
    fn insert_fileref(
        &mut self,
        filename: String,
        dirname: PathBuf,
        usage: FileUsage,
        text_mode: bool,
        rock: u32,
    ) -> Tag {
        let tag = self.next_tag();
        tracing::debug!(
            "fileref {} -> {}",
            tag,
            dirname.join(&filename).display()
        );
        self.filerefs.insert(
            tag,
            FileRef {
                tag,
                rock,
                filename,
                dirname,
                usage,
                text_mode,
            },
        );
        tag
    }

    fn dir_for(&self, usage: FileUsage) -> PathBuf {
        let settings = self.settings();
        usage_dir(&settings.base_dir, usage, &settings.game_id)
    }

    /// A reference to a fresh file in the system temp directory
    pub fn fileref_create_temp(&mut self, usage_bits: u32, rock: u32) -> Result<Tag> {
        let (usage, text) = FileUsage::from_bits(usage_bits);
        let filename = format!(
            "glktmp_{}_{}{}",
            std::process::id(),
            self.tags.last() + 1,
            usage.suffix()
        );
        Ok(self.insert_fileref(filename, std::env::temp_dir(), usage, text, rock))
    }

    /// A reference to a program-named file in the usage directory
    pub fn fileref_create_by_name(&mut self, usage_bits: u32, name: &str, rock: u32) -> Result<Tag> {
        let (usage, text) = FileUsage::from_bits(usage_bits);
        let filename = format!("{}{}", sanitize_filename(name), usage.suffix());
        let dir = self.dir_for(usage);
        Ok(self.insert_fileref(filename, dir, usage, text, rock))
    }

    /// A reference to the same file as `source`, with a new usage
    pub fn fileref_create_from_fileref(
        &mut self,
        usage_bits: u32,
        source: Tag,
        rock: u32,
    ) -> Result<Tag> {
        let (usage, text) = FileUsage::from_bits(usage_bits);
        let src = self.fileref(source)?;
        let (filename, dirname) = (src.filename.clone(), src.dirname.clone());
        Ok(self.insert_fileref(filename, dirname, usage, text, rock))
    }

    /// Start a prompted file reference; the presentation side answers it
    pub fn begin_file_prompt(&mut self, usage_bits: u32, mode: FileMode) -> FileRefPrompt {
        let (usage, text) = FileUsage::from_bits(usage_bits);
        let prompt = FileRefPrompt::new(usage, text, mode, self.dir_for(usage));
        self.set_special_request(Some(prompt.clone()));
        tracing::debug!("prompting for {} ({:?})", usage.label(), mode);
        prompt
    }

    /// Finish a prompted file reference.
    ///
    /// A canceled prompt (no file name) yields `None`, as does asking to
    /// read a file that does not exist.
    pub fn finish_file_prompt(&mut self, answer: Option<String>, rock: u32) -> Option<Tag> {
        let prompt = self.special_request().cloned()?;
        self.set_special_request(None);
        let name = answer.filter(|n| !n.trim().is_empty())?;

        let filename = format!("{}{}", sanitize_filename(&name), prompt.usage.suffix());
        let path = prompt.dirname.join(&filename);
        if prompt.mode == FileMode::Read && !path.is_file() {
            tracing::info!("prompted file {} does not exist", path.display());
            return None;
        }
        Some(self.insert_fileref(filename, prompt.dirname, prompt.usage, prompt.text_mode, rock))
    }

    pub fn fileref_destroy(&mut self, tag: Tag) -> Result<()> {
        match self.filerefs.remove(&tag) {
            Some(_) => Ok(()),
            None => Err(self.report_err(GlkError::UnknownTag(tag))),
        }
    }

    /// Delete the file a reference names; a missing file is not an error
    pub fn fileref_delete_file(&mut self, tag: Tag) -> Result<()> {
        let path = self.fileref(tag)?.pathname();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn fileref_does_file_exist(&self, tag: Tag) -> Result<bool> {
        Ok(self.fileref(tag)?.exists())
    }

    /// The file reference after `after` in tag order, with its rock
    pub fn fileref_iterate(&self, after: Option<Tag>) -> Option<(Tag, u32)> {
        let mut iter = match after {
            None => self.filerefs.range(..),
            Some(t) => self.filerefs.range((std::ops::Bound::Excluded(t), std::ops::Bound::Unbounded)),
        };
        iter.next().map(|(tag, f)| (*tag, f.rock))
    }
}
