use std::io::Cursor;

use image::{DynamicImage, ImageError, ImageFormat, codecs::jpeg::JpegEncoder};
use tracing::warn;

pub const DEFAULT_FORMAT: &str = "png";
pub const DEFAULT_QUALITY: i64 = 95;

/// Output settings applied when images are re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    default_format: String,
    format: Option<String>,
    quality: i64,
}

impl Engine {
    /// A quality of 0 selects [`DEFAULT_QUALITY`]. Any other value is kept as configured.
    pub fn new(format: &str, quality: i64) -> Self {
        let quality = if quality == 0 { DEFAULT_QUALITY } else { quality };
        if !(1..=100).contains(&quality) {
            warn!("Quality {} is outside 1..=100, encoders will clamp it", quality);
        }

        let format = Some(format.trim().to_lowercase()).filter(|f| !f.is_empty());
        if let Some(name) = &format {
            if parse_format(name).is_none() {
                warn!("Unknown output format {:?}, images will use {}", name, DEFAULT_FORMAT);
            }
        }

        Self {
            default_format: DEFAULT_FORMAT.to_string(),
            format,
            quality,
        }
    }

    pub fn quality(&self) -> i64 {
        self.quality
    }

    /// Quality handed to lossy encoders, which only accept 1..=100.
    pub fn encoder_quality(&self) -> u8 {
        u8::try_from(self.quality.clamp(1, 100)).unwrap_or(100)
    }

    /// Forced output format, if any.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn default_format(&self) -> &str {
        &self.default_format
    }

    /// Pick the output format: forced format first, then the requested one, then the default.
    pub fn output_format(&self, requested: Option<&str>) -> ImageFormat {
        self.format
            .as_deref()
            .or(requested)
            .and_then(parse_format)
            .unwrap_or(ImageFormat::Png)
    }

    pub fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
        let mut buf = Vec::new();

        if format == ImageFormat::Jpeg {
            // JPEG carries no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, self.encoder_quality()))?;
        } else {
            img.write_to(&mut Cursor::new(&mut buf), format)?;
        }

        Ok(buf)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new("", 0)
    }
}

fn parse_format(name: &str) -> Option<ImageFormat> {
    match ImageFormat::from_extension(name.trim().to_lowercase())? {
        f @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP) => Some(f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};

    #[test]
    fn zero_quality_uses_default() {
        assert_eq!(Engine::new("", 0).quality(), DEFAULT_QUALITY);
    }

    #[test]
    fn explicit_quality_is_kept() {
        assert_eq!(Engine::new("jpeg", 70).quality(), 70);
        assert_eq!(Engine::new("jpeg", 70), Engine::new("jpeg", 70));
    }

    #[test]
    fn out_of_range_quality_is_kept_and_clamped_for_encoders() {
        let high = Engine::new("", 250);
        assert_eq!(high.quality(), 250);
        assert_eq!(high.encoder_quality(), 100);

        let low = Engine::new("", -5);
        assert_eq!(low.quality(), -5);
        assert_eq!(low.encoder_quality(), 1);

        assert_eq!(Engine::new("", 70).encoder_quality(), 70);
    }

    #[test]
    fn out_of_range_quality_still_encodes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255])));
        let bytes = Engine::new("jpeg", 250).encode(&img, ImageFormat::Jpeg).unwrap();
        assert!(image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).is_ok());
    }

    #[test]
    fn output_format_precedence() {
        let free = Engine::new("", 0);
        assert_eq!(free.output_format(None), ImageFormat::Png);
        assert_eq!(free.output_format(Some("jpg")), ImageFormat::Jpeg);
        assert_eq!(free.output_format(Some("tiff")), ImageFormat::Png);

        let forced = Engine::new("WebP", 0);
        assert_eq!(forced.format(), Some("webp"));
        assert_eq!(forced.output_format(Some("jpg")), ImageFormat::WebP);
    }

    #[test]
    fn unknown_forced_format_degrades_to_default() {
        let engine = Engine::new("bmp", 0);
        assert_eq!(engine.output_format(Some("jpg")), ImageFormat::Png);
    }

    #[test]
    fn encode_round_trips_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 4, image::Rgba([200, 10, 10, 255])));
        let engine = Engine::new("", 80);

        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let bytes = engine.encode(&img, format).unwrap();
            let decoded = image::load_from_memory_with_format(&bytes, format).unwrap();
            assert_eq!(decoded.dimensions(), (8, 4));
        }
    }
}
