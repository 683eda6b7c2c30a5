//! FLAC discovery and destination mapping.
//!
//! Walks the input root for FLAC files (case-insensitive extension match)
//! and pairs each with its destination path in the output tree, mirroring
//! the relative directory structure. Files whose destination already exists
//! are dropped here; the skip decision is made exactly once, at discovery
//! time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::Stream;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::pipeline::RunStats;

/// One source file awaiting conversion, paired with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Errors from destination path derivation.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("source {path:?} is not under input root {input_root:?}")]
    OutsideRoot { path: PathBuf, input_root: PathBuf },
}

/// Derive the destination path for `source` under `output_root`.
///
/// The destination mirrors the source's path relative to `input_root`, with
/// the extension replaced by `output_ext`. Fails if `source` is not under
/// `input_root`.
pub fn map_destination(
    source: &Path,
    input_root: &Path,
    output_root: &Path,
    output_ext: &str,
) -> Result<PathBuf, PathError> {
    let relative = source
        .strip_prefix(input_root)
        .map_err(|_| PathError::OutsideRoot {
            path: source.to_path_buf(),
            input_root: input_root.to_path_buf(),
        })?;

    let mut destination = output_root.join(relative);
    destination.set_extension(output_ext);
    Ok(destination)
}

/// What to walk and how to map it.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub output_ext: String,
    pub overwrite: bool,
}

/// Scans the input root recursively for FLAC files and yields work items.
///
/// Returns a Stream of [`WorkItem`]s. A missing or non-directory input root
/// is reported and yields an empty stream: it is a configuration problem,
/// not a crash. Skipped items (existing destination, overwrite disabled)
/// are counted into `stats` and not yielded.
pub fn discover(options: DiscoverOptions, stats: Arc<RunStats>) -> impl Stream<Item = WorkItem> {
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        if !options.input_root.exists() {
            tracing::error!("input directory does not exist: {:?}", options.input_root);
            return;
        }
        if !options.input_root.is_dir() {
            tracing::error!("input path is not a directory: {:?}", options.input_root);
            return;
        }

        for entry in WalkDir::new(&options.input_root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_flac = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("flac"));
            if !is_flac {
                continue;
            }

            let destination = match map_destination(
                path,
                &options.input_root,
                &options.output_root,
                &options.output_ext,
            ) {
                Ok(destination) => destination,
                Err(e) => {
                    tracing::warn!("dropping {:?}: {}", path, e);
                    continue;
                }
            };

            if destination.exists() && !options.overwrite {
                tracing::debug!("skipping existing file: {:?}", destination);
                stats.record_skipped();
                continue;
            }

            let item = WorkItem {
                source: path.to_path_buf(),
                destination,
            };
            // If the receiver is dropped, blocking_send fails and we stop scanning.
            if tx.blocking_send(item).is_err() {
                break;
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}
