//! Static-image preprocessing: resize to fit inside a bounding box without
//! upscaling, then re-encode losslessly as PNG for the KTX encoder.

use std::path::Path;

use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::MediaResult;

const MAX_DIMENSION: u32 = 1024;

/// Loads `input`, resizes it to fit inside `MAX_DIMENSION` x `MAX_DIMENSION`
/// (preserving aspect ratio, never upscaling), and writes the result as a
/// lossless PNG to `output`.
pub async fn preprocess(input: &Path, output: &Path) -> MediaResult<()> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || preprocess_blocking(&input, &output))
        .await
        .expect("image preprocessing task panicked")
}

fn preprocess_blocking(input: &Path, output: &Path) -> MediaResult<()> {
    let img = image::open(input)?;
    let (width, height) = img.dimensions();

    let resized = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    resized.save_with_format(output, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::TempDir;

    fn write_test_png(path: &Path, width: u32, height: u32) {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |_, _| Rgba([10, 20, 30, 255]));
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn downscales_oversized_image_preserving_aspect() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        write_test_png(&input, 2048, 1024);

        preprocess(&input, &output).await.unwrap();

        let result = image::open(&output).unwrap();
        let (w, h) = result.dimensions();
        assert!(w <= MAX_DIMENSION && h <= MAX_DIMENSION);
        assert_eq!(w, 1024);
        assert_eq!(h, 512);
    }

    #[tokio::test]
    async fn never_upscales_small_image() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        write_test_png(&input, 64, 32);

        preprocess(&input, &output).await.unwrap();

        let result = image::open(&output).unwrap();
        let (w, h) = result.dimensions();
        assert_eq!((w, h), (64, 32));
    }

    #[tokio::test]
    async fn output_is_png() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        write_test_png(&input, 100, 100);

        preprocess(&input, &output).await.unwrap();
        assert_eq!(image::ImageReader::open(&output).unwrap().format(), Some(image::ImageFormat::Png));
    }
}
