//! Standalone album cover placement.
//!
//! For each album, finds a cover image (a sidecar file in the source album
//! directory, or the embedded front cover of the first FLAC) and writes a
//! bounded-size JPEG into the destination album directory. Everything here
//! is best-effort: a failure is reported by the caller and never blocks the
//! rest of the album.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use lofty::file::TaggedFileExt;
use lofty::picture::PictureType;
use lofty::probe::Probe;

use crate::config::ArtworkConfig;

/// Supported sidecar image extensions
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// The artwork collaborator, invoked once per album after transcoding.
///
/// Implement this trait to substitute a mock in tests.
#[async_trait]
pub trait PlaceArtwork: Send + Sync {
    async fn place(&self, source_album_dir: &Path, dest_album_dir: &Path) -> Result<()>;
}

/// Where the cover bytes came from.
enum CoverSource {
    File(PathBuf),
    Embedded(Vec<u8>),
}

/// Sidecar/embedded cover placer backed by the image crate.
#[derive(Debug, Clone)]
pub struct CoverFilePlacer {
    config: ArtworkConfig,
    overwrite: bool,
}

impl CoverFilePlacer {
    pub fn new(config: ArtworkConfig, overwrite: bool) -> Self {
        Self { config, overwrite }
    }

    fn place_blocking(&self, source_dir: &Path, dest_dir: &Path) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let dest_path = dest_dir.join(&self.config.fallback_name);
        if dest_path.exists() && !self.overwrite {
            tracing::debug!("cover already exists: {:?}", dest_path);
            return Ok(());
        }

        let Some(cover) = self.find_cover(source_dir) else {
            tracing::debug!("no cover found for {:?}", source_dir);
            return Ok(());
        };

        fs::create_dir_all(dest_dir)
            .with_context(|| format!("failed to create directory: {:?}", dest_dir))?;
        self.write_cover(&cover, &dest_path)?;

        tracing::info!("placed cover: {:?}", dest_path);
        Ok(())
    }

    /// Locate cover bytes: configured sidecar names first, then any
    /// cover-like file stem, then the embedded picture of the first FLAC.
    fn find_cover(&self, dir: &Path) -> Option<CoverSource> {
        for name in &self.config.search_names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                tracing::debug!("found cover file: {:?}", candidate);
                return Some(CoverSource::File(candidate));
            }
        }

        // Case variations on case-sensitive filesystems
        let stems: Vec<String> = self
            .config
            .search_names
            .iter()
            .filter_map(|n| Path::new(n).file_stem())
            .filter_map(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .collect();

        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }

                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_lowercase());
                let ext = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_lowercase());

                if let (Some(stem), Some(ext)) = (stem, ext)
                    && stems.contains(&stem)
                    && IMAGE_EXTENSIONS.contains(&ext.as_str())
                {
                    tracing::debug!("found cover file: {:?}", path);
                    return Some(CoverSource::File(path));
                }
            }
        }

        extract_embedded_cover(dir).map(CoverSource::Embedded)
    }

    fn write_cover(&self, cover: &CoverSource, dest: &Path) -> Result<()> {
        let bytes = match cover {
            CoverSource::File(path) => {
                fs::read(path).with_context(|| format!("failed to read cover file {:?}", path))?
            }
            CoverSource::Embedded(data) => data.clone(),
        };

        if let Err(e) = self.reencode(&bytes, dest) {
            // Undecodable image: keep the original bytes
            tracing::warn!("failed to process cover image, copying as-is: {:#}", e);
            fs::write(dest, &bytes)
                .with_context(|| format!("failed to write cover to {:?}", dest))?;
        }
        Ok(())
    }

    /// Convert to RGB, bound the longest edge, re-encode as JPEG.
    fn reencode(&self, bytes: &[u8], dest: &Path) -> Result<()> {
        let mut img = image::load_from_memory(bytes).context("failed to decode cover image")?;

        let max = self.config.max_size;
        if max > 0 && (img.width() > max || img.height() > max) {
            img = img.thumbnail(max, max);
        }

        let rgb = image::DynamicImage::ImageRgb8(img.into_rgb8());
        let file =
            fs::File::create(dest).with_context(|| format!("failed to create {:?}", dest))?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.config.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .context("failed to encode cover as JPEG")?;
        Ok(())
    }
}

/// Pull the front cover (or first picture) out of the first FLAC in `dir`.
fn extract_embedded_cover(dir: &Path) -> Option<Vec<u8>> {
    let mut flacs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("flac"))
        })
        .collect();
    flacs.sort();

    let first = flacs.first()?;
    let tagged_file = Probe::open(first).ok()?.read().ok()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag())?;

    let pictures = tag.pictures();
    let cover = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())?;

    tracing::debug!("extracted embedded cover from {:?}", first);
    Some(cover.data().to_vec())
}

#[async_trait]
impl PlaceArtwork for CoverFilePlacer {
    async fn place(&self, source_album_dir: &Path, dest_album_dir: &Path) -> Result<()> {
        let placer = self.clone();
        let source_album_dir = source_album_dir.to_path_buf();
        let dest_album_dir = dest_album_dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            placer.place_blocking(&source_album_dir, &dest_album_dir)
        })
        .await
        .context("artwork task aborted")?
    }
}
