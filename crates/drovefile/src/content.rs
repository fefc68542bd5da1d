//! Payload sources for bodies and scripts.

use std::io;
use std::path::{Path, PathBuf};

/// Where a request body or script text comes from: nothing, inline
/// text from the drovefile, or a referenced file (`@path` form).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Content {
    #[default]
    None,
    String(String),
    File(PathBuf),
}

impl Content {
    pub fn is_none(&self) -> bool {
        matches!(self, Content::None)
    }

    /// Builds content from a raw block body. Empty text normalizes to
    /// `None`; a single `@path` line references a file.
    pub fn from_raw(raw: String) -> Content {
        if raw.is_empty() {
            return Content::None;
        }
        let trimmed = raw.trim();
        if let Some(path) = trimmed.strip_prefix('@') {
            if !path.is_empty() && !trimmed.contains('\n') {
                return Content::File(PathBuf::from(path));
            }
        }
        Content::String(raw)
    }

    /// Reads the content as text. File paths resolve relative to
    /// `base_dir`, the directory of the owning drovefile.
    pub fn text(&self, base_dir: &Path) -> io::Result<String> {
        match self {
            Content::None => Ok(String::new()),
            Content::String(s) => Ok(s.clone()),
            Content::File(path) => std::fs::read_to_string(resolve(base_dir, path)),
        }
    }

    /// Reads the content as bytes, `None` yielding no body at all.
    pub fn bytes(&self, base_dir: &Path) -> io::Result<Option<Vec<u8>>> {
        match self {
            Content::None => Ok(None),
            Content::String(s) => Ok(Some(s.clone().into_bytes())),
            Content::File(path) => std::fs::read(resolve(base_dir, path)).map(Some),
        }
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
