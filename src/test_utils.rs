//! Test utilities and fixtures for flacpress tests.
//!
//! Provides temp library-tree builders and mock collaborator
//! implementations so pipeline tests never need a real FFmpeg or real
//! audio files.
//!
//! # Example
//!
//! ```ignore
//! use flacpress::test_utils::{temp_library, mocks::MockTranscoder};
//!
//! let library = temp_library(&[("Album", &["01.flac", "02.flac"])]);
//! // library.path() now holds Album/01.flac and Album/02.flac
//! ```

use tempfile::TempDir;

/// Build a temporary library tree: one subdirectory per album, containing
/// the given file names.
///
/// Returns the tempdir handle; keep it alive for the duration of the test.
pub fn temp_library(albums: &[(&str, &[&str])]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    for (album, files) in albums {
        let album_dir = dir.path().join(album);
        std::fs::create_dir_all(&album_dir).expect("Failed to create album directory");
        for file in *files {
            std::fs::write(album_dir.join(file), b"fake flac content")
                .expect("Failed to write file");
        }
    }
    dir
}

/// Mock collaborators for orchestration tests.
///
/// All mocks record what they did into a shared [`mocks::EventLog`], so
/// tests can assert on invocation counts and ordering across collaborators.
pub mod mocks {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::artwork::PlaceArtwork;
    use crate::encoder::{EncodeError, Transcode};
    use crate::loudness::{LoudnessError, TagLoudness};
    use crate::metadata::{CopyTags, TagError};

    /// Shared, ordered record of collaborator invocations.
    #[derive(Debug, Clone, Default)]
    pub struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, event: impl Into<String>) {
            self.0.lock().unwrap().push(event.into());
        }

        pub fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub fn count_with_prefix(&self, prefix: &str) -> usize {
            self.events().iter().filter(|e| e.starts_with(prefix)).count()
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Scripted transcoder: fails for sources whose file name matches.
    pub struct MockTranscoder {
        pub log: EventLog,
        pub fail_names: Vec<String>,
        pub ready: bool,
    }

    impl MockTranscoder {
        /// Every transcode succeeds.
        pub fn succeeding(log: EventLog) -> Self {
            Self {
                log,
                fail_names: Vec::new(),
                ready: true,
            }
        }

        /// Transcodes fail for the given file names only.
        pub fn failing_for(log: EventLog, names: &[&str]) -> Self {
            Self {
                log,
                fail_names: names.iter().map(|s| s.to_string()).collect(),
                ready: true,
            }
        }

        /// Every transcode fails.
        pub fn all_failing(log: EventLog) -> Self {
            Self {
                log,
                fail_names: vec!["*".to_string()],
                ready: true,
            }
        }
    }

    #[async_trait]
    impl Transcode for MockTranscoder {
        async fn transcode(&self, source: &Path, _destination: &Path) -> Result<(), EncodeError> {
            let name = file_name(source);
            self.log.push(format!("transcode:{name}"));

            let fails = self
                .fail_names
                .iter()
                .any(|f| f == "*" || f == &name);
            if fails {
                return Err(EncodeError::Failed {
                    path: source.to_path_buf(),
                    stderr: "mock encode failure".to_string(),
                });
            }
            Ok(())
        }

        async fn check_ready(&self) -> bool {
            self.ready
        }
    }

    /// Tag copier that records invocations and always succeeds.
    pub struct MockTagCopier {
        pub log: EventLog,
    }

    #[async_trait]
    impl CopyTags for MockTagCopier {
        async fn copy_tags(&self, source: &Path, _destination: &Path) -> Result<(), TagError> {
            self.log.push(format!("copytags:{}", file_name(source)));
            Ok(())
        }
    }

    /// Artwork placer that records invocations and always succeeds.
    pub struct MockArtwork {
        pub log: EventLog,
    }

    #[async_trait]
    impl PlaceArtwork for MockArtwork {
        async fn place(
            &self,
            _source_album_dir: &Path,
            _dest_album_dir: &Path,
        ) -> anyhow::Result<()> {
            self.log.push("artwork");
            Ok(())
        }
    }

    /// Loudness tagger that records how many files it was handed.
    pub struct MockLoudness {
        pub log: EventLog,
    }

    #[async_trait]
    impl TagLoudness for MockLoudness {
        async fn tag_album(&self, files: &[PathBuf]) -> Result<(), LoudnessError> {
            self.log.push(format!("loudness:{}", files.len()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_library_creates_tree() {
        let library = temp_library(&[("Album A", &["01.flac", "02.flac"]), ("Album B", &["01.flac"])]);

        assert!(library.path().join("Album A").join("01.flac").is_file());
        assert!(library.path().join("Album A").join("02.flac").is_file());
        assert!(library.path().join("Album B").join("01.flac").is_file());
    }

    #[test]
    fn test_event_log_counts_prefixes() {
        let log = mocks::EventLog::new();
        log.push("transcode:a.flac");
        log.push("transcode:b.flac");
        log.push("artwork");

        assert_eq!(log.count_with_prefix("transcode"), 2);
        assert_eq!(log.count_with_prefix("artwork"), 1);
        assert_eq!(log.count_with_prefix("loudness"), 0);
    }
}
