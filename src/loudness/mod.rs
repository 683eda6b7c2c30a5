//! Album loudness analysis and tag writing.
//!
//! Measures each produced track's integrated loudness (EBU R128) with
//! FFmpeg's `ebur128` filter, folds the album value from the per-track
//! energies, and writes ReplayGain 2.0 and iTunes SoundCheck tags relative
//! to the configured reference loudness. The whole phase is best-effort:
//! per-file analysis or write failures are logged and swallowed.

pub mod soundcheck;

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagExt};

use crate::config::LoudnessConfig;
use soundcheck::soundcheck_tag;

/// Errors surfaced from one album's loudness phase.
#[derive(Debug, thiserror::Error)]
pub enum LoudnessError {
    #[error("no tracks could be measured")]
    NothingMeasured,

    #[error("loudness task aborted: {0}")]
    TaskJoin(String),
}

/// The loudness collaborator, invoked once per album over all produced
/// files (album gain needs the whole album).
///
/// Implement this trait to substitute a mock in tests.
#[async_trait]
pub trait TagLoudness: Send + Sync {
    async fn tag_album(&self, files: &[PathBuf]) -> Result<(), LoudnessError>;
}

/// FFmpeg ebur128-backed loudness tagger.
#[derive(Debug, Clone)]
pub struct R128Tagger {
    ffmpeg_bin: String,
    reference_lufs: f64,
    write_replaygain: bool,
    write_soundcheck: bool,
}

impl R128Tagger {
    /// Resolve the loudness capability once at startup.
    ///
    /// Returns `None` when both outputs are disabled in configuration or
    /// the FFmpeg build does not provide the `ebur128` filter; the tagging
    /// phase then becomes a no-op for the whole run.
    pub fn detect(ffmpeg_bin: &str, config: &LoudnessConfig) -> Option<Self> {
        if !config.enable_replaygain && !config.enable_soundcheck {
            tracing::info!("loudness tagging disabled in configuration");
            return None;
        }

        let available = Command::new(ffmpeg_bin)
            .args(["-hide_banner", "-filters"])
            .output()
            .map(|output| {
                output.status.success()
                    && String::from_utf8_lossy(&output.stdout).contains("ebur128")
            })
            .unwrap_or(false);

        if !available {
            tracing::warn!("FFmpeg ebur128 filter not available, loudness tagging disabled");
            return None;
        }

        Some(Self {
            ffmpeg_bin: ffmpeg_bin.to_string(),
            reference_lufs: config.reference_loudness,
            write_replaygain: config.enable_replaygain,
            write_soundcheck: config.enable_soundcheck,
        })
    }

    /// Integrated loudness of one file in LUFS, or `None` on any failure.
    fn measure_blocking(&self, file: &Path) -> Option<f64> {
        let output = Command::new(&self.ffmpeg_bin)
            .args(["-hide_banner", "-nostats"])
            .arg("-i")
            .arg(file)
            .args(["-map", "a:0", "-filter:a", "ebur128", "-f", "null", "-"])
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("failed to run FFmpeg for {:?}: {}", file, e);
                return None;
            }
        };

        // ebur128 prints its summary on stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lufs = parse_integrated_lufs(&stderr);
        if lufs.is_none() {
            tracing::warn!("could not measure loudness of {:?}", file);
        }
        lufs
    }

    fn tag_blocking(&self, file: &Path, track_gain: f64, album_gain: f64) -> Result<(), String> {
        let mut tagged_file = Probe::open(file)
            .map_err(|e| e.to_string())?
            .read()
            .map_err(|e| e.to_string())?;

        let tag_type = tagged_file.primary_tag_type();
        let tag = if let Some(tag) = tagged_file.tag_mut(tag_type) {
            tag
        } else {
            tagged_file.insert_tag(Tag::new(tag_type));
            tagged_file.tag_mut(tag_type).expect("just inserted tag")
        };

        if self.write_replaygain {
            tag.insert_text(ItemKey::ReplayGainTrackGain, format!("{track_gain:.2} dB"));
            tag.insert_text(ItemKey::ReplayGainAlbumGain, format!("{album_gain:.2} dB"));
        }
        if self.write_soundcheck {
            tag.insert_text(
                ItemKey::Unknown("iTunNORM".to_string()),
                soundcheck_tag(track_gain),
            );
        }

        tag.save_to_path(file, WriteOptions::default())
            .map_err(|e| e.to_string())
    }

    fn tag_album_blocking(&self, files: &[PathBuf]) -> Result<(), LoudnessError> {
        tracing::info!("analyzing loudness for {} track(s)", files.len());

        let mut measured: Vec<(PathBuf, f64)> = Vec::new();
        for file in files {
            if let Some(lufs) = self.measure_blocking(file) {
                measured.push((file.clone(), lufs));
            }
        }
        if measured.is_empty() {
            return Err(LoudnessError::NothingMeasured);
        }

        let album_lufs = fold_album_loudness(measured.iter().map(|(_, lufs)| *lufs));
        let album_gain = self.reference_lufs - album_lufs;

        for (file, lufs) in &measured {
            let track_gain = self.reference_lufs - lufs;
            match self.tag_blocking(file, track_gain, album_gain) {
                Ok(()) => {
                    tracing::debug!("tagged {:?} (track gain {:.2} dB)", file, track_gain);
                }
                Err(e) => {
                    tracing::warn!("failed to write loudness tags to {:?}: {}", file, e);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TagLoudness for R128Tagger {
    async fn tag_album(&self, files: &[PathBuf]) -> Result<(), LoudnessError> {
        let tagger = self.clone();
        let files = files.to_vec();

        tokio::task::spawn_blocking(move || tagger.tag_album_blocking(&files))
            .await
            .map_err(|e| LoudnessError::TaskJoin(e.to_string()))?
    }
}

/// Extract the integrated loudness from an ebur128 stderr dump.
///
/// The filter logs running values mid-line during processing; the summary
/// block at the end carries an indented `I: <value> LUFS` line of its own,
/// so the last line-initial match wins.
fn parse_integrated_lufs(stderr: &str) -> Option<f64> {
    stderr.lines().rev().find_map(|line| {
        let rest = line.trim().strip_prefix("I:")?;
        let value = rest.trim().strip_suffix("LUFS")?.trim();
        value.parse::<f64>().ok()
    })
}

/// Fold per-track integrated loudness values into an album value by
/// averaging linear energies.
fn fold_album_loudness(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0f64, 0u32), |(sum, count), lufs| {
        (sum + 10f64.powf(lufs / 10.0), count + 1)
    });
    10.0 * (sum / f64::from(count.max(1))).log10()
}
