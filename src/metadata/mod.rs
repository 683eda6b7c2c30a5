//! Tag transfer from FLAC sources to encoded files.
//!
//! Uses the lofty crate for format-independent tag access: the source's
//! Vorbis Comments are read as a generic tag and saved onto the
//! destination, where lofty maps them to MP4 ilst atoms. Text tags, track
//! and disc numbering, and (optionally) embedded pictures all survive the
//! conversion.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::TagExt;

/// Errors from one tag-copy invocation.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("failed to read tags from {path:?}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to write tags to {path:?}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("tag copy task aborted: {0}")]
    TaskJoin(String),
}

/// The tag-copy collaborator, run immediately after a successful transcode
/// of the same item.
///
/// Implement this trait to substitute a mock in tests.
#[async_trait]
pub trait CopyTags: Send + Sync {
    async fn copy_tags(&self, source: &Path, destination: &Path) -> Result<(), TagError>;
}

/// lofty-backed tag copier.
#[derive(Debug, Clone)]
pub struct LoftyTagCopier {
    copy_artwork: bool,
}

impl LoftyTagCopier {
    pub fn new(copy_artwork: bool) -> Self {
        Self { copy_artwork }
    }

    fn copy_blocking(&self, source: &Path, destination: &Path) -> Result<(), TagError> {
        let tagged_file = Probe::open(source)
            .map_err(|e| TagError::Read {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?
            .read()
            .map_err(|e| TagError::Read {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        // Get the primary tag, or fall back to the first available tag
        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            tracing::debug!("no tags to copy from {:?}", source);
            return Ok(());
        };

        let mut tag = tag.clone();
        if !self.copy_artwork {
            while !tag.pictures().is_empty() {
                tag.remove_picture(0);
            }
        }

        // Saving a generic tag onto the destination lets lofty re-map it to
        // the destination format's native tag type.
        tag.save_to_path(destination, WriteOptions::default())
            .map_err(|e| TagError::Write {
                path: destination.to_path_buf(),
                message: e.to_string(),
            })?;

        tracing::debug!("copied tags: {:?} -> {:?}", source, destination);
        Ok(())
    }
}

#[async_trait]
impl CopyTags for LoftyTagCopier {
    async fn copy_tags(&self, source: &Path, destination: &Path) -> Result<(), TagError> {
        let copier = self.clone();
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || copier.copy_blocking(&source, &destination))
            .await
            .map_err(|e| TagError::TaskJoin(e.to_string()))?
    }
}
