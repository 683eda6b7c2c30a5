//! FLAC→AAC encoding via an external FFmpeg binary.
//!
//! This module shells out to `ffmpeg` with the `libfdk_aac` codec. The
//! codec is not part of stock FFmpeg builds everywhere; readiness is probed
//! once per run via `ffmpeg -codecs` before any conversion starts.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;

use crate::config::{EncodingConfig, PathsConfig};

/// Errors from one encode invocation.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to create output directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("FFmpeg binary not found: {0}")]
    BinaryMissing(String),

    #[error("failed to run FFmpeg: {0}")]
    Spawn(std::io::Error),

    #[error("FFmpeg failed for {path:?}: {stderr}")]
    Failed { path: PathBuf, stderr: String },

    #[error("encode task aborted: {0}")]
    TaskJoin(String),
}

/// The transcode collaborator: converts one source file into the target
/// lossy format at the destination path.
///
/// Implement this trait to substitute a mock in tests.
#[async_trait]
pub trait Transcode: Send + Sync {
    /// Convert `source` into `destination`, creating parent directories as
    /// needed and overwriting any existing destination.
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<(), EncodeError>;

    /// Whether the encoding environment is usable. Queried once per run,
    /// before any album is processed.
    async fn check_ready(&self) -> bool;
}

/// FFmpeg-backed encoder using libfdk_aac at the configured VBR quality.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_bin: String,
    vbr_quality: u8,
}

impl FfmpegEncoder {
    pub fn new(paths: &PathsConfig, encoding: &EncodingConfig) -> Self {
        Self {
            ffmpeg_bin: paths.ffmpeg_bin.clone(),
            vbr_quality: encoding.vbr_quality,
        }
    }

    fn encode_blocking(&self, source: &Path, destination: &Path) -> Result<(), EncodeError> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EncodeError::CreateDir(parent.to_path_buf(), e))?;
        }

        // aac_low keeps VBR working with standard encoder parameters
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-i")
            .arg(source)
            .args(["-c:a", "libfdk_aac", "-profile:a", "aac_low"])
            .args(["-vbr", &self.vbr_quality.to_string()])
            .arg("-y")
            .arg(destination)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncodeError::BinaryMissing(self.ffmpeg_bin.clone())
                } else {
                    EncodeError::Spawn(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EncodeError::Failed {
                path: source.to_path_buf(),
                stderr,
            });
        }

        tracing::debug!("encoded {:?} -> {:?}", source, destination);
        Ok(())
    }

    fn probe_codecs_blocking(&self) -> bool {
        let output = match Command::new(&self.ffmpeg_bin).arg("-codecs").output() {
            Ok(output) => output,
            Err(_) => {
                tracing::error!("FFmpeg not found at: {}", self.ffmpeg_bin);
                return false;
            }
        };

        if !output.status.success() {
            tracing::error!("FFmpeg at {} is not runnable", self.ffmpeg_bin);
            return false;
        }

        let has_codec = String::from_utf8_lossy(&output.stdout).contains("libfdk_aac");
        if !has_codec {
            tracing::error!(
                "FFmpeg found but the libfdk_aac codec is not available; \
                 install an FFmpeg build with libfdk_aac support"
            );
        }
        has_codec
    }
}

#[async_trait]
impl Transcode for FfmpegEncoder {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<(), EncodeError> {
        let encoder = self.clone();
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || encoder.encode_blocking(&source, &destination))
            .await
            .map_err(|e| EncodeError::TaskJoin(e.to_string()))?
    }

    async fn check_ready(&self) -> bool {
        let encoder = self.clone();
        tokio::task::spawn_blocking(move || encoder.probe_codecs_blocking())
            .await
            .unwrap_or(false)
    }
}
