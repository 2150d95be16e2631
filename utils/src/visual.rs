use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// A raw captured picture, before downscaling and compression.
pub type Picture = RgbImage;

/// Lossy quality used for uplink stills. Stills ride the same channel as
/// live audio, so bandwidth wins over fidelity here.
pub const JPEG_QUALITY: u8 = 50;

/// Downscales a captured picture to half linear resolution and compresses it
/// to JPEG for uplink.
pub fn compress_still(picture: &Picture) -> anyhow::Result<Vec<u8>> {
    let width = (picture.width() / 2).max(1);
    let height = (picture.height() / 2).max(1);
    let resized =
        DynamicImage::ImageRgb8(picture.clone()).resize_exact(width, height, FilterType::Triangle);

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    resized
        .write_with_encoder(encoder)
        .map_err(|e| anyhow::anyhow!("jpeg encoding failed: {}", e))?;
    Ok(jpeg)
}

/// Base64 text framing for already-compressed image bytes.
pub fn encode(jpeg: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    #[test]
    fn still_is_halved_and_jpeg_encoded() {
        let jpeg = compress_still(&gradient(64, 48)).unwrap();
        // JPEG SOI marker.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn tiny_pictures_do_not_collapse_to_zero() {
        let jpeg = compress_still(&gradient(1, 1)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 1);
        assert_eq!(decoded.height(), 1);
    }
}
