//! Square thumbnail decoding.
//!
//! Images go through the `image` crate (first frame only for GIFs), videos
//! through an `ffmpeg` frame grab. The result is center-cropped to the cell
//! edge.

use std::io::Cursor;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use tracing::trace;

use super::Thumbnail;
use crate::models::{MediaKind, Uri};

/// Largest edge ever produced, whatever the cell size.
const MAX_EDGE: u32 = 1024;

/// Decodes `uri` into an `edge` x `edge` thumbnail.
pub fn decode_thumbnail(uri: &Uri, edge: u32) -> Result<Thumbnail> {
    let path = uri
        .to_file_path()
        .ok_or_else(|| anyhow!("Not a local file: {}", uri))?;
    if edge == 0 {
        bail!("Zero thumbnail edge for {:?}", path);
    }
    let edge = edge.min(MAX_EDGE);

    let img = if is_video_path(&path) {
        decode_video_frame(&path)?
    } else {
        open_image(&path)?
    };

    trace!(?path, edge, "Decoded thumbnail source");
    let square = img.resize_to_fill(edge, edge, FilterType::Triangle);
    let rgba = square.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Thumbnail::new(width, height, rgba.into_raw()))
}

/// Opens a still image. GIFs yield their first frame.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
        let frame = decoder
            .into_frames()
            .next()
            .ok_or_else(|| anyhow!("GIF has no frames: {:?}", path))?
            .context("Failed to decode GIF frame")?;
        return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(&bytes, fmt),
        None => image::load_from_memory(&bytes),
    }
    .with_context(|| format!("Failed to decode image: {:?}", path))
}

fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(MediaKind::from_extension)
        == Some(MediaKind::Video)
}

fn decode_video_frame(path: &Path) -> Result<DynamicImage> {
    // Many videos start on a black frame, so try one second in first.
    ffmpeg_extract_frame(path, "00:00:01.000")
        .or_else(|| ffmpeg_extract_frame(path, "00:00:00.000"))
        .ok_or_else(|| anyhow!("Failed to extract video frame: {:?}", path))
}

fn ffmpeg_extract_frame(path: &Path, timestamp: &str) -> Option<DynamicImage> {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-ss", timestamp, "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
        .output()
        .ok()?;

    if !output.status.success() || output.stdout.is_empty() {
        return None;
    }

    image::load_from_memory(&output.stdout).ok()
}
