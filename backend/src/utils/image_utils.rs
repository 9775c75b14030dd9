use std::io::Cursor;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, RgbImage};
use serde::Deserialize;
use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVariant {
    Hero,
    Gallery,
}

impl ImageVariant {
    pub fn max_width(&self) -> u32 {
        match self {
            ImageVariant::Hero => 1280,
            ImageVariant::Gallery => 800,
        }
    }

    /// JPEG quality, 1-100.
    pub fn quality(&self) -> u8 {
        match self {
            ImageVariant::Hero => 80,
            ImageVariant::Gallery => 60,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Size after fitting `width` under the variant ceiling. Height follows the
/// same scale factor; images already narrow enough are left alone.
pub fn target_dimensions(width: u32, height: u32, variant: ImageVariant) -> (u32, u32) {
    let max_width = variant.max_width();
    if width <= max_width {
        return (width, height);
    }
    let scale = max_width as f64 / width as f64;
    let scaled_height = ((height as f64) * scale).round().max(1.0) as u32;
    (max_width, scaled_height)
}

/// Transparent pixels end up on black, like drawing onto a black canvas.
fn flatten_on_black(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |channel: u8| ((channel as u16 * a as u16 + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Decodes an upload, downsizes it for `variant` and returns a `data:image/jpeg;base64,` URL
/// small enough to live inside the site config.
pub fn compress(bytes: &[u8], variant: ImageVariant) -> Result<String, ImageError> {
    let img = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let (width, height) = img.dimensions();
    let (target_width, target_height) = target_dimensions(width, height, variant);

    let resized = if (target_width, target_height) == (width, height) {
        img
    } else {
        img.resize_exact(target_width, target_height, FilterType::Triangle)
    };
    let rgb = flatten_on_black(&resized);

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut encoded), variant.quality())
        .encode(rgb.as_raw(), target_width, target_height, ColorType::Rgb8)
        .map_err(ImageError::Encode)?;

    tracing::info!(
        "Compressed {}x{} upload to {}x{} ({} -> {} bytes)",
        width, height, target_width, target_height, bytes.len(), encoded.len()
    );
    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(&encoded)
    ))
}
