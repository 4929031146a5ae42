//! Motion-image frame extraction: decode an animated GIF/WebP into a
//! sequence of complete (delta-coalesced) PNG frames for the video encoder.

use std::path::{Path, PathBuf};

use image::{AnimationDecoder, ImageFormat};

use crate::error::{MediaError, MediaResult};

/// Decodes every frame of `input` and writes each as `frame-%04d.png` into
/// `scratch_dir`, in parallel. Returns the printf-style glob pattern the
/// video encoder should read. `image`'s animation decoders already
/// composite disposal/delta frames into full RGBA buffers, so no manual
/// coalescing is needed here.
pub async fn extract_frames(input: &Path, scratch_dir: &Path) -> MediaResult<PathBuf> {
    tokio::fs::create_dir_all(scratch_dir).await?;

    let input = input.to_path_buf();
    let dir = scratch_dir.to_path_buf();
    let count = tokio::task::spawn_blocking(move || decode_and_write(&input, &dir))
        .await
        .expect("frame extraction task panicked")?;

    if count == 0 {
        return Err(MediaError::encode_failed("animated input decoded to zero frames", None));
    }

    Ok(scratch_dir.join("frame-%04d.png"))
}

fn decode_and_write(input: &Path, dir: &Path) -> MediaResult<usize> {
    let reader = std::io::BufReader::new(std::fs::File::open(input)?);
    let format = image::ImageReader::open(input)?
        .with_guessed_format()?
        .format()
        .unwrap_or(ImageFormat::Gif);

    let frames: Vec<_> = match format {
        ImageFormat::Gif => {
            let decoder = image::codecs::gif::GifDecoder::new(reader)?;
            decoder.into_frames().collect_frames()?
        }
        ImageFormat::WebP => {
            let decoder = image::codecs::webp::WebPDecoder::new(reader)?;
            decoder.into_frames().collect_frames()?
        }
        _ => {
            return Err(MediaError::encode_failed(
                format!("{format:?} has no animation decoder"),
                None,
            ))
        }
    };

    std::thread::scope(|scope| -> MediaResult<()> {
        let mut handles = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            let path = dir.join(format!("frame-{:04}.png", index));
            let buffer = frame.buffer();
            handles.push(scope.spawn(move || buffer.save_with_format(&path, ImageFormat::Png)));
        }
        for handle in handles {
            handle.join().expect("frame write thread panicked")?;
        }
        Ok(())
    })?;

    Ok(frames.len())
}
