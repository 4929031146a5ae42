//! Media Type Detector: classifies a local file from its first few KiB
//! without reading the whole thing.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use metamorph_models::MediaClass;

use crate::error::{MediaError, MediaResult};

const SNIFF_WINDOW: usize = 4096;
const SVG_PREFIX: &[u8] = b"<svg ";

/// Reads up to [`SNIFF_WINDOW`] bytes from the start of `path` and
/// classifies it. Leaves the file position wherever the read left it; callers
/// that need the whole file back at offset 0 should reopen it.
pub async fn detect(path: &Path) -> MediaResult<MediaClass> {
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; SNIFF_WINDOW];
    let n = file.read(&mut buf).await?;
    buf.truncate(n);
    classify(&buf)
}

/// Same classification logic over an in-memory buffer, split out so the
/// signature table can be unit tested against fixed byte literals.
pub fn classify(header: &[u8]) -> MediaResult<MediaClass> {
    if header.starts_with(SVG_PREFIX) {
        return Ok(MediaClass::StaticImage);
    }

    let Some(kind) = infer::get(header) else {
        return Err(MediaError::UnknownFileType);
    };

    let mime = kind.mime_type();
    if mime == "image/webp" {
        return Ok(if contains_webp_animation_chunk(header) {
            MediaClass::MotionImage
        } else {
            MediaClass::StaticImage
        });
    }
    if mime == "image/gif" {
        return Ok(MediaClass::MotionVideo);
    }
    if mime.starts_with("image/") {
        return Ok(MediaClass::StaticImage);
    }
    if mime.starts_with("video/") {
        return Ok(MediaClass::MotionVideo);
    }

    Err(MediaError::UnknownFileType)
}

/// A WebP RIFF container carries an `ANIM` chunk (global animation
/// parameters) and per-frame `ANMF` chunks when it's animated; either
/// fingerprint appearing in the sniffed window is sufficient.
fn contains_webp_animation_chunk(header: &[u8]) -> bool {
    header.windows(4).any(|w| w == b"ANIM" || w == b"ANMF")
}
