//! Still-image directory source.
//!
//! Replays the JPEG/PNG files of a local directory in file-name order as if
//! they were camera frames. Images are scaled to the sink size and mirrored
//! when requested, so downstream code sees the same frames a camera would give.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};

use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct ImageDirConfig {
    pub dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
    /// Start over after the last image instead of ending.
    pub looping: bool,
}

pub struct ImageDirSource {
    config: ImageDirConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
}

impl ImageDirSource {
    pub fn new(config: ImageDirConfig) -> Result<Self> {
        let files = list_images(&config.dir)?;
        if files.is_empty() {
            return Err(anyhow!("no jpg/png images in {}", config.dir.display()));
        }
        log::info!(
            "ImageDirSource: {} image(s) in {}",
            files.len(),
            config.dir.display()
        );
        Ok(Self {
            config,
            files,
            cursor: 0,
            frame_count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Next frame, or `None` once a non-looping source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.files.len() {
            if !self.config.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        self.cursor += 1;

        let decoded = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))?
            .into_rgb8();
        let mut rgb = if decoded.dimensions() == (self.config.width, self.config.height) {
            decoded
        } else {
            imageops::resize(
                &decoded,
                self.config.width,
                self.config.height,
                FilterType::Triangle,
            )
        };
        if self.config.mirror {
            imageops::flip_horizontal_in_place(&mut rgb);
        }

        self.frame_count += 1;
        let (width, height) = rgb.dimensions();
        Frame::new(self.frame_count, rgb.into_raw(), width, height).map(Some)
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read image dir {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
            .unwrap_or(false);
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
