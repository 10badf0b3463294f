//! Local, viewable copies of the uploaded résumé and its rendered preview.
//!
//! Each copy is a temp file deleted as soon as it is superseded or the owning session
//! tears down.

use bytes::Bytes;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Resume,
    Image,
}

impl PreviewKind {
    fn suffix(self) -> &'static str {
        match self {
            PreviewKind::Resume => ".pdf",
            PreviewKind::Image => ".png",
        }
    }
}

#[derive(Default)]
pub struct PreviewFiles {
    resume: Option<NamedTempFile>,
    image: Option<NamedTempFile>,
}

impl PreviewFiles {
    /// Replaces the file for `kind`, dropping (and deleting) the previous one.
    pub fn replace(&mut self, kind: PreviewKind, file: NamedTempFile) -> PathBuf {
        let path = file.path().to_path_buf();
        let slot = match kind {
            PreviewKind::Resume => &mut self.resume,
            PreviewKind::Image => &mut self.image,
        };
        *slot = Some(file);
        path
    }

    pub fn clear(&mut self) {
        self.resume = None;
        self.image = None;
    }
}

#[cfg(test)]
impl PreviewFiles {
    pub fn path(&self, kind: PreviewKind) -> Option<&std::path::Path> {
        match kind {
            PreviewKind::Resume => self.resume.as_ref().map(|f| f.path()),
            PreviewKind::Image => self.image.as_ref().map(|f| f.path()),
        }
    }
}

/// Writes `bytes` to a fresh temp file. Blocking; call from `spawn_blocking`.
pub fn materialize(kind: PreviewKind, bytes: &Bytes) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("resumind-")
        .suffix(kind.suffix())
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}
