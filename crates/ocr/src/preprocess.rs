use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use thiserror::Error;

/// Longest side handed to the recognizer; phone photos are routinely larger.
pub const MAX_SIDE: u32 = 2800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode a receipt photo (JPEG / PNG / WEBP / …), normalize it, and return
/// PNG bytes for the recognizer. The caller keeps the original for preview.
pub fn prepare_for_ocr(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img))
}

/// Downscale, grayscale, contrast stretch.
fn normalize(img: DynamicImage) -> DynamicImage {
    let img = if img.width() > MAX_SIDE || img.height() > MAX_SIDE {
        img.resize(MAX_SIDE, MAX_SIDE, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
