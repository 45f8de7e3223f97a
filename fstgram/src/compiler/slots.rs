//! Where slot values come from.
//!
//! A slot (`$color`) is a list of templates, one per line. Blank lines and
//! lines starting with `#` are skipped.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{
        Path,
        PathBuf,
    },
};

use super::Error;

/// The raw value file of a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotFile {
    /// Used in error messages, e.g. the path of the file.
    pub source_name: String,
    pub contents: String,
}

impl SlotFile {
    /// Value lines with their line numbers.
    pub fn values(&self) -> impl Iterator<Item = (usize, &str)> {
        self.contents
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
    }
}

pub trait SlotSource {
    fn load(&self, slot_name: &str) -> Result<SlotFile, Error>;
}

/// Reads `<dir>/<slot_name>`.
#[derive(Clone, Debug)]
pub struct DirectorySlotSource {
    dir: PathBuf,
}

impl DirectorySlotSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
        }
    }
}

impl SlotSource for DirectorySlotSource {
    fn load(&self, slot_name: &str) -> Result<SlotFile, Error> {
        let path = self.dir.join(slot_name);
        tracing::debug!(slot_name, path = %path.display(), "loading slot");

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                Ok(SlotFile {
                    source_name: path.display().to_string(),
                    contents,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::UnknownSlot(slot_name.to_owned())),
            Err(source) => {
                Err(Error::SlotRead {
                    slot_name: slot_name.to_owned(),
                    path,
                    source,
                })
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemorySlotSource {
    slots: HashMap<String, String>,
}

impl MemorySlotSource {
    pub fn insert(&mut self, slot_name: impl Into<String>, contents: impl Into<String>) {
        self.slots.insert(slot_name.into(), contents.into());
    }

    pub fn with(mut self, slot_name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(slot_name, contents);
        self
    }
}

impl SlotSource for MemorySlotSource {
    fn load(&self, slot_name: &str) -> Result<SlotFile, Error> {
        let contents = self
            .slots
            .get(slot_name)
            .ok_or_else(|| Error::UnknownSlot(slot_name.to_owned()))?;

        Ok(SlotFile {
            source_name: format!("${slot_name}"),
            contents: contents.clone(),
        })
    }
}

/// For grammars without slots. Every slot reference is an error.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSlots;

impl SlotSource for NoSlots {
    fn load(&self, slot_name: &str) -> Result<SlotFile, Error> {
        Err(Error::UnknownSlot(slot_name.to_owned()))
    }
}
