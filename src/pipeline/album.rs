//! Album grouping and the per-album phase sequence.
//!
//! A source directory is the unit of "album": it scopes the shared cover
//! file and the album-wide loudness computation. Each album moves through a
//! fixed phase order: parallel transcoding, then one artwork placement,
//! then one loudness-tagging pass over the files that were actually
//! produced. Artwork and loudness are best-effort and never abort the run.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::artwork::PlaceArtwork;
use crate::encoder::Transcode;
use crate::loudness::TagLoudness;
use crate::metadata::CopyTags;
use crate::pipeline::CancelFlag;
use crate::pipeline::pool::{self, TranscodeOutcome};
use crate::pipeline::stats::RunStats;
use crate::scanner::WorkItem;

/// All work items sharing one source directory.
#[derive(Debug, Clone)]
pub struct AlbumGroup {
    pub source_dir: PathBuf,
    pub items: Vec<WorkItem>,
}

/// Partition `items` into albums keyed by source parent directory.
///
/// Group order follows the first appearance of each directory; item order
/// within a group follows input order.
pub fn group_by_album(items: Vec<WorkItem>) -> Vec<AlbumGroup> {
    let mut groups: Vec<AlbumGroup> = Vec::new();
    let mut index: HashMap<PathBuf, usize> = HashMap::new();

    for item in items {
        let key = item
            .source
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();

        match index.get(&key) {
            Some(&at) => groups[at].items.push(item),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(AlbumGroup {
                    source_dir: key,
                    items: vec![item],
                });
            }
        }
    }
    groups
}

/// Drives one album through its phases.
pub struct AlbumProcessor<'a> {
    pub transcoder: &'a dyn Transcode,
    pub tag_copier: &'a dyn CopyTags,
    pub artwork: &'a dyn PlaceArtwork,
    pub loudness: Option<&'a dyn TagLoudness>,
    pub workers: usize,
    pub stats: &'a RunStats,
    pub cancel: &'a CancelFlag,
}

impl AlbumProcessor<'_> {
    /// Run the full phase sequence for one album.
    pub async fn process(&self, album: AlbumGroup) {
        info!(
            "processing album {:?} ({} track(s))",
            album.source_dir,
            album.items.len()
        );

        let outcomes =
            pool::run_pool(album.items, self.workers, |item| self.convert_one(item)).await;

        // Fold the joined outcomes sequentially: update statistics, collect
        // the destinations that actually exist now.
        let mut produced: Vec<PathBuf> = Vec::new();
        for outcome in &outcomes {
            if outcome.ok {
                self.stats.record_success();
                produced.push(outcome.item.destination.clone());
            } else {
                self.stats.record_failure();
                warn!(
                    "failed {:?}: {}",
                    outcome.item.source,
                    outcome.error_detail.as_deref().unwrap_or("unknown error")
                );
            }
        }

        // Cancellation stops new work: in-flight transcodes have joined by
        // now, but the album's remaining phases are never started and the
        // album does not count as processed.
        if self.cancel.is_set() {
            debug!("cancelled, leaving album {:?} unfinished", album.source_dir);
            return;
        }

        if produced.is_empty() {
            warn!("no tracks produced for album {:?}", album.source_dir);
            self.stats.record_album();
            return;
        }

        // Artwork and loudness operate on produced files, so they run only
        // after the pool has fully joined.
        let dest_dir = produced[0]
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        if let Err(e) = self.artwork.place(&album.source_dir, &dest_dir).await {
            warn!("cover placement failed for {:?}: {:#}", album.source_dir, e);
        }

        if let Some(loudness) = self.loudness {
            if let Err(e) = loudness.tag_album(&produced).await {
                warn!("loudness tagging failed for {:?}: {}", album.source_dir, e);
            }
        } else {
            debug!("loudness tagging unavailable, skipping");
        }

        self.stats.record_album();
    }

    /// One unit of work: transcode, then tag copy against the fresh
    /// destination. Declines items once cancellation is requested.
    async fn convert_one(&self, item: WorkItem) -> Option<TranscodeOutcome> {
        if self.cancel.is_set() {
            debug!("cancelled before start: {:?}", item.source);
            return None;
        }

        if let Err(e) = self
            .transcoder
            .transcode(&item.source, &item.destination)
            .await
        {
            return Some(TranscodeOutcome::failure(item, e.to_string()));
        }

        if let Err(e) = self
            .tag_copier
            .copy_tags(&item.source, &item.destination)
            .await
        {
            return Some(TranscodeOutcome::failure(item, e.to_string()));
        }

        info!("converted {:?}", item.source);
        Some(TranscodeOutcome::success(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mocks::{
        EventLog, MockArtwork, MockLoudness, MockTagCopier, MockTranscoder,
    };

    fn item(album: &str, name: &str) -> WorkItem {
        WorkItem {
            source: PathBuf::from(format!("/in/{album}/{name}.flac")),
            destination: PathBuf::from(format!("/out/{album}/{name}.m4a")),
        }
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let items = vec![
            item("b", "1"),
            item("a", "1"),
            item("b", "2"),
            item("a", "2"),
        ];
        let groups = group_by_album(items);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source_dir, PathBuf::from("/in/b"));
        assert_eq!(groups[1].source_dir, PathBuf::from("/in/a"));
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].items.len(), 2);
    }

    #[test]
    fn test_grouping_partitions_exactly() {
        let items = vec![
            item("a", "1"),
            item("a", "2"),
            item("b", "1"),
            item("c", "1"),
        ];
        let groups = group_by_album(items.clone());

        let regrouped: Vec<WorkItem> = groups.into_iter().flat_map(|g| g.items).collect();
        assert_eq!(regrouped.len(), items.len());
        for original in &items {
            assert_eq!(regrouped.iter().filter(|i| *i == original).count(), 1);
        }
    }

    #[test]
    fn test_grouping_items_share_parent() {
        let groups = group_by_album(vec![item("a", "1"), item("a", "2"), item("b", "1")]);
        for group in &groups {
            for i in &group.items {
                assert_eq!(i.source.parent().unwrap(), group.source_dir);
            }
        }
    }

    struct Fixture {
        log: EventLog,
        transcoder: MockTranscoder,
        tag_copier: MockTagCopier,
        artwork: MockArtwork,
        loudness: MockLoudness,
        stats: RunStats,
        cancel: CancelFlag,
    }

    impl Fixture {
        fn new(transcoder: MockTranscoder, log: EventLog) -> Self {
            Self {
                tag_copier: MockTagCopier { log: log.clone() },
                artwork: MockArtwork { log: log.clone() },
                loudness: MockLoudness { log: log.clone() },
                log,
                transcoder,
                stats: RunStats::new(),
                cancel: CancelFlag::new(),
            }
        }

        fn processor(&self) -> AlbumProcessor<'_> {
            AlbumProcessor {
                transcoder: &self.transcoder,
                tag_copier: &self.tag_copier,
                artwork: &self.artwork,
                loudness: Some(&self.loudness),
                workers: 2,
                stats: &self.stats,
                cancel: &self.cancel,
            }
        }
    }

    #[tokio::test]
    async fn test_all_failures_skip_artwork_and_loudness() {
        let log = EventLog::new();
        let fx = Fixture::new(MockTranscoder::all_failing(log.clone()), log);

        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1"), item("a", "2")],
        };
        fx.processor().process(album).await;

        assert_eq!(fx.log.count_with_prefix("artwork"), 0);
        assert_eq!(fx.log.count_with_prefix("loudness"), 0);

        let snapshot = fx.stats.snapshot();
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.successful, 0);
        assert_eq!(snapshot.albums_processed, 1);
    }

    #[tokio::test]
    async fn test_phases_run_in_order_after_all_transcodes() {
        let log = EventLog::new();
        let fx = Fixture::new(MockTranscoder::succeeding(log.clone()), log);

        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1"), item("a", "2"), item("a", "3")],
        };
        fx.processor().process(album).await;

        let events = fx.log.events();
        let artwork_at = events.iter().position(|e| e == "artwork").unwrap();
        let loudness_at = events.iter().position(|e| e.starts_with("loudness")).unwrap();
        let last_transcode = events
            .iter()
            .rposition(|e| e.starts_with("transcode"))
            .unwrap();

        assert!(last_transcode < artwork_at);
        assert!(artwork_at < loudness_at);
    }

    #[tokio::test]
    async fn test_loudness_sees_only_produced_files() {
        let log = EventLog::new();
        let fx = Fixture::new(
            MockTranscoder::failing_for(log.clone(), &["2.flac"]),
            log,
        );

        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1"), item("a", "2"), item("a", "3")],
        };
        fx.processor().process(album).await;

        // Two of three tracks survived; the loudness pass sees exactly those
        assert_eq!(fx.log.count_with_prefix("loudness:2"), 1);

        let snapshot = fx.stats.snapshot();
        assert_eq!(snapshot.successful, 2);
        assert_eq!(snapshot.failed, 1);
    }

    #[tokio::test]
    async fn test_tag_copy_never_runs_for_failed_transcode() {
        let log = EventLog::new();
        let fx = Fixture::new(
            MockTranscoder::failing_for(log.clone(), &["1.flac"]),
            log,
        );

        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1"), item("a", "2")],
        };
        fx.processor().process(album).await;

        assert_eq!(fx.log.count_with_prefix("copytags:2.flac"), 1);
        assert_eq!(fx.log.count_with_prefix("copytags:1.flac"), 0);
    }

    #[tokio::test]
    async fn test_missing_loudness_capability_is_a_noop() {
        let log = EventLog::new();
        let fx = Fixture::new(MockTranscoder::succeeding(log.clone()), log);

        let processor = AlbumProcessor {
            loudness: None,
            ..fx.processor()
        };
        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1")],
        };
        processor.process(album).await;

        assert_eq!(fx.log.count_with_prefix("loudness"), 0);
        assert_eq!(fx.log.count_with_prefix("artwork"), 1);
        assert_eq!(fx.stats.snapshot().albums_processed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_album_declines_remaining_items() {
        let log = EventLog::new();
        let fx = Fixture::new(MockTranscoder::succeeding(log.clone()), log);
        fx.cancel.set();

        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1"), item("a", "2")],
        };
        fx.processor().process(album).await;

        assert_eq!(fx.log.count_with_prefix("transcode"), 0);
        let snapshot = fx.stats.snapshot();
        assert_eq!(snapshot.successful, 0);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test]
    async fn test_cancelled_album_skips_phases_and_is_not_counted() {
        let log = EventLog::new();
        let fx = Fixture::new(MockTranscoder::succeeding(log.clone()), log);
        fx.cancel.set();

        let album = AlbumGroup {
            source_dir: PathBuf::from("/in/a"),
            items: vec![item("a", "1"), item("a", "2")],
        };
        fx.processor().process(album).await;

        assert_eq!(fx.log.count_with_prefix("artwork"), 0);
        assert_eq!(fx.log.count_with_prefix("loudness"), 0);
        assert_eq!(fx.stats.snapshot().albums_processed, 0);
    }
}
