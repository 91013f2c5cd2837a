//! Per-file metadata the index records: MIME type and video duration.
//!
//! Duration comes from `ffprobe` when it is installed, otherwise from the
//! `mvhd` box of MP4/MOV containers.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use tracing::trace;

use crate::models::mime_from_extension;

/// Bytes scanned for the movie header when `ffprobe` is unavailable.
const HEADER_SCAN_BYTES: u64 = 512 * 1024;

/// MIME type by extension, `None` for non-media files.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(mime_from_extension)
}

/// Video duration in milliseconds, if it can be determined.
pub fn probe_duration_ms(path: &Path) -> Option<u64> {
    ffprobe_duration_ms(path).or_else(|| mp4_duration_ms(path))
}

fn ffprobe_duration_ms(path: &Path) -> Option<u64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let secs: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    trace!(?path, secs, "ffprobe duration");
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
}

fn mp4_duration_ms(path: &Path) -> Option<u64> {
    let mut buffer = Vec::new();
    File::open(path)
        .ok()?
        .take(HEADER_SCAN_BYTES)
        .read_to_end(&mut buffer)
        .ok()?;
    parse_mvhd_duration_ms(&buffer)
}

/// Finds the `mvhd` box and converts its duration to milliseconds.
///
/// Layout after the box type: version (1), flags (3), then for version 0
/// creation/modification/timescale/duration as u32, for version 1 the
/// times and duration are u64.
fn parse_mvhd_duration_ms(buffer: &[u8]) -> Option<u64> {
    let i = buffer.windows(4).position(|w| w == b"mvhd")?;
    let be_u32 = |at: usize| -> Option<u64> {
        let bytes: [u8; 4] = buffer.get(at..at + 4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes) as u64)
    };

    let (timescale, duration) = match *buffer.get(i + 4)? {
        0 => (be_u32(i + 16)?, be_u32(i + 20)?),
        1 => {
            let bytes: [u8; 8] = buffer.get(i + 28..i + 36)?.try_into().ok()?;
            (be_u32(i + 24)?, u64::from_be_bytes(bytes))
        }
        _ => return None,
    };

    if timescale == 0 {
        return None;
    }
    Some(duration.saturating_mul(1000) / timescale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(b"mvhd");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&timescale.to_be_bytes());
        data.extend_from_slice(&duration.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(&PathBuf::from("a/b.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(&PathBuf::from("clip.mp4")), Some("video/mp4"));
        assert_eq!(mime_for_path(&PathBuf::from("notes.txt")), None);
        assert_eq!(mime_for_path(&PathBuf::from("README")), None);
    }

    #[test]
    fn test_mvhd_version0() {
        assert_eq!(parse_mvhd_duration_ms(&mvhd_v0(600, 3000)), Some(5000));
        assert_eq!(parse_mvhd_duration_ms(&mvhd_v0(0, 3000)), None);
    }

    #[test]
    fn test_mvhd_version1() {
        let mut data = b"mvhd".to_vec();
        data.extend_from_slice(&[1, 0, 0, 0]);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&90_500u64.to_be_bytes());
        assert_eq!(parse_mvhd_duration_ms(&data), Some(90_500));
    }

    #[test]
    fn test_missing_or_truncated_header() {
        assert_eq!(parse_mvhd_duration_ms(b"ftypisom"), None);
        let mut truncated = mvhd_v0(600, 3000);
        truncated.truncate(20);
        assert_eq!(parse_mvhd_duration_ms(&truncated), None);
    }
}
