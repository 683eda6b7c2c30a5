//! TOML configuration for a conversion run.
//!
//! Loaded from the path given on the command line (default `config.toml`).
//! The `[paths]` section is required; every other section falls back to
//! defaults. Values are validated once at load time so the pipeline can
//! treat them as trusted.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Input/output roots and the FFmpeg binary
    pub paths: PathsConfig,

    /// Encoder settings
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Standalone cover file handling
    #[serde(default)]
    pub artwork: ArtworkConfig,

    /// Loudness analysis and tagging
    #[serde(default)]
    pub loudness: LoudnessConfig,

    /// Worker pool and run behavior
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Filesystem roots and external binaries
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Root of the lossless library to convert
    pub input_dir: PathBuf,

    /// Root of the mirrored lossy tree
    pub output_dir: PathBuf,

    /// FFmpeg binary (name on PATH or absolute path)
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

/// Encoder settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// libfdk_aac VBR quality (1 lowest - 5 highest)
    pub vbr_quality: u8,

    /// Output container: "m4a" or "mp4"
    pub output_format: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            vbr_quality: 5,
            output_format: "m4a".to_string(),
        }
    }
}

/// Standalone cover file handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtworkConfig {
    /// Whether to place a standalone cover file per album
    pub enabled: bool,

    /// Whether embedded pictures survive the tag copy
    pub copy_embedded: bool,

    /// Sidecar filenames checked in the source album directory, in order
    pub search_names: Vec<String>,

    /// Filename of the cover written into the destination album directory
    pub fallback_name: String,

    /// Longest edge of the placed cover in pixels (0 disables resizing)
    pub max_size: u32,

    /// JPEG quality of the placed cover (1-95)
    pub jpeg_quality: u8,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            copy_embedded: true,
            search_names: vec![
                "cover.jpg".to_string(),
                "folder.jpg".to_string(),
                "front.jpg".to_string(),
                "Cover.jpg".to_string(),
            ],
            fallback_name: "cover.jpg".to_string(),
            max_size: 2000,
            jpeg_quality: 95,
        }
    }
}

/// Loudness analysis and tagging
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Write ReplayGain 2.0 track/album gain tags
    pub enable_replaygain: bool,

    /// Write iTunes SoundCheck (iTunNORM) tags
    pub enable_soundcheck: bool,

    /// Reference loudness in LUFS for gain computation
    pub reference_loudness: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            enable_replaygain: true,
            enable_soundcheck: true,
            reference_loudness: -18.0,
        }
    }
}

/// Worker pool and run behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Parallel transcodes in flight per album
    pub workers: usize,

    /// Re-convert files whose destination already exists
    pub overwrite_existing: bool,

    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            overwrite_existing: false,
            log_level: "info".to_string(),
        }
    }
}

// ============================================================================
// Loading and validation
// ============================================================================

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=5).contains(&self.encoding.vbr_quality) {
            return Err(ConfigError::Invalid(
                "encoding.vbr_quality must be between 1 and 5".to_string(),
            ));
        }
        if !matches!(self.encoding.output_format.as_str(), "m4a" | "mp4") {
            return Err(ConfigError::Invalid(
                "encoding.output_format must be 'm4a' or 'mp4'".to_string(),
            ));
        }
        if self.processing.workers < 1 {
            return Err(ConfigError::Invalid(
                "processing.workers must be >= 1".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.processing.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "processing.log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if !(-30.0..=0.0).contains(&self.loudness.reference_loudness) {
            return Err(ConfigError::Invalid(
                "loudness.reference_loudness must be between -30.0 and 0.0 LUFS".to_string(),
            ));
        }
        if !(1..=95).contains(&self.artwork.jpeg_quality) {
            return Err(ConfigError::Invalid(
                "artwork.jpeg_quality must be between 1 and 95".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read configuration file {0:?}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================
