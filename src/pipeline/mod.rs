//! Run orchestration: discovery, album sequencing, statistics.
//!
//! The pipeline walks the input tree, groups work by album directory, and
//! drives each album through its phases. Albums are processed one at a
//! time; only the transcode phase inside a single album runs in parallel.
//!
//! # Failure model
//!
//! Per-track failures are folded into [`RunStats`] and the run continues.
//! Only configuration problems, an unready encoding environment, and user
//! cancellation end a run early.

mod album;
pub mod pool;
mod stats;

pub use album::{AlbumGroup, AlbumProcessor, group_by_album};
pub use pool::TranscodeOutcome;
pub use stats::{RunStats, StatsSnapshot};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tracing::{info, warn};

use crate::artwork::{CoverFilePlacer, PlaceArtwork};
use crate::config::Config;
use crate::encoder::{FfmpegEncoder, Transcode};
use crate::error::{Error, Result};
use crate::loudness::{R128Tagger, TagLoudness};
use crate::metadata::{CopyTags, LoftyTagCopier};
use crate::scanner::{self, DiscoverOptions, WorkItem};

/// Cooperative cancellation flag shared between the signal handler and the
/// run. Setting it stops new work from being scheduled; in-flight work
/// finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The external collaborators one run is wired to.
pub struct Collaborators {
    pub transcoder: Box<dyn Transcode>,
    pub tag_copier: Box<dyn CopyTags>,
    pub artwork: Box<dyn PlaceArtwork>,
    pub loudness: Option<Box<dyn TagLoudness>>,
}

impl Collaborators {
    /// Wire up the real FFmpeg/lofty-backed collaborators.
    ///
    /// The loudness capability is resolved here, once: if it is absent the
    /// loudness phase is a no-op for the whole run.
    pub fn from_config(config: &Config) -> Self {
        let loudness = R128Tagger::detect(&config.paths.ffmpeg_bin, &config.loudness)
            .map(|tagger| Box::new(tagger) as Box<dyn TagLoudness>);

        Self {
            transcoder: Box::new(FfmpegEncoder::new(&config.paths, &config.encoding)),
            tag_copier: Box::new(LoftyTagCopier::new(config.artwork.copy_embedded)),
            artwork: Box::new(CoverFilePlacer::new(
                config.artwork.clone(),
                config.processing.overwrite_existing,
            )),
            loudness,
        }
    }
}

/// One complete conversion run.
pub struct Pipeline {
    config: Config,
    dry_run: bool,
    collaborators: Collaborators,
    stats: Arc<RunStats>,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(config: Config, dry_run: bool, cancel: CancelFlag) -> Self {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(config, dry_run, cancel, collaborators)
    }

    /// Construct with explicit collaborators (tests inject mocks here).
    pub fn with_collaborators(
        config: Config,
        dry_run: bool,
        cancel: CancelFlag,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            dry_run,
            collaborators,
            stats: Arc::new(RunStats::new()),
            cancel,
        }
    }

    /// Handle to the run's statistics, live during the run.
    pub fn stats(&self) -> Arc<RunStats> {
        self.stats.clone()
    }

    /// Execute the run and return the final statistics.
    pub async fn run(&self) -> Result<StatsSnapshot> {
        if !self.dry_run && !self.collaborators.transcoder.check_ready().await {
            return Err(Error::EnvironmentNotReady);
        }

        info!("scanning for FLAC files in: {:?}", self.config.paths.input_dir);
        let options = DiscoverOptions {
            input_root: self.config.paths.input_dir.clone(),
            output_root: self.config.paths.output_dir.clone(),
            output_ext: self.config.encoding.output_format.clone(),
            overwrite: self.config.processing.overwrite_existing,
        };
        let items: Vec<WorkItem> = scanner::discover(options, self.stats.clone())
            .collect()
            .await;

        if items.is_empty() {
            warn!("no FLAC files found to process");
            return Ok(self.stats.snapshot());
        }

        self.stats.set_total(items.len() as u64);
        info!("found {} file(s) to process", items.len());

        if self.dry_run {
            print_dry_run_report(&items);
            return Ok(self.stats.snapshot());
        }

        let albums = group_by_album(items);
        info!("organized into {} album(s)", albums.len());

        let processor = AlbumProcessor {
            transcoder: self.collaborators.transcoder.as_ref(),
            tag_copier: self.collaborators.tag_copier.as_ref(),
            artwork: self.collaborators.artwork.as_ref(),
            loudness: self.collaborators.loudness.as_deref(),
            workers: self.config.processing.workers,
            stats: self.stats.as_ref(),
            cancel: &self.cancel,
        };

        for album in albums {
            if self.cancel.is_set() {
                return Err(Error::Cancelled);
            }
            processor.process(album).await;
        }

        if self.cancel.is_set() {
            return Err(Error::Cancelled);
        }

        Ok(self.stats.snapshot())
    }
}

fn print_dry_run_report(items: &[WorkItem]) {
    println!();
    println!("DRY RUN - files that would be processed:");
    println!();
    for item in items {
        println!("  {}", item.source.display());
        println!("  -> {}", item.destination.display());
        println!();
    }
    println!("Total: {} file(s)", items.len());
}
