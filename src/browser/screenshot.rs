use crate::error::{BrowserError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use std::io::Cursor;

/// Width screenshots are scaled down to before being sent to a proposer
pub const DEFAULT_IMAGE_WIDTH: u32 = 768;

/// A decoded page screenshot
#[derive(Debug, Clone)]
pub struct Screenshot {
    image: RgbImage,
}

impl Screenshot {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Decode PNG bytes as returned by `Page.captureScreenshot`
    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| BrowserError::ScreenshotFailed(format!("Failed to decode screenshot: {}", e)))?;
        Ok(Self::new(image.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Scale to `max_width` keeping the aspect ratio. Smaller images are left as they are.
    pub fn resized(&self, max_width: u32) -> RgbImage {
        if self.width() <= max_width || self.width() == 0 {
            return self.image.clone();
        }
        let height = ((self.height() as u64 * max_width as u64) / self.width() as u64).max(1) as u32;
        image::imageops::resize(&self.image, max_width, height, FilterType::Triangle)
    }

    /// Encode as a `data:image/png;base64,...` URL, scaled to `max_width`
    pub fn to_data_url(&self, max_width: u32) -> Result<String> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(self.resized(max_width))
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| BrowserError::ScreenshotFailed(format!("Failed to encode screenshot: {}", e)))?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> Screenshot {
        Screenshot::new(RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])))
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let resized = blank(1536, 1000).resized(768);
        assert_eq!(resized.width(), 768);
        assert_eq!(resized.height(), 500);
    }

    #[test]
    fn test_small_images_untouched() {
        let resized = blank(400, 300).resized(768);
        assert_eq!((resized.width(), resized.height()), (400, 300));
    }

    #[test]
    fn test_data_url_decodes_back() {
        let url = blank(100, 50).to_data_url(DEFAULT_IMAGE_WIDTH).unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();

        let decoded = Screenshot::from_png(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn test_invalid_png() {
        assert!(matches!(
            Screenshot::from_png(b"not a png"),
            Err(BrowserError::ScreenshotFailed(_))
        ));
    }
}
