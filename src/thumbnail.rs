//! Proof-of-detection thumbnails.
//!
//! `ThumbnailRenderer` turns an annotated frame into the small bitmap that
//! sits next to a detection in the log. The transform is pure: identical
//! frames render identical thumbnails. Steps, in order:
//! 1. Downscale into a 150x100 box, keeping aspect ratio, never upscaling.
//! 2. Boost colour saturation by 1.5.
//! 3. Paste onto a 4-pixel dark green border.
//! 4. Darken every third row (y = 0, 3, 6, ...) to a third of each channel.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::ThumbnailError;
use crate::frame::Frame;

pub const MAX_THUMBNAIL_WIDTH: u32 = 150;
pub const MAX_THUMBNAIL_HEIGHT: u32 = 100;
pub const SATURATION_FACTOR: f32 = 1.5;
pub const BORDER_PX: u32 = 4;
pub const BORDER_COLOR: Rgb<u8> = Rgb([0, 40, 0]);
pub const SCANLINE_PERIOD: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thumbnail {
    image: RgbImage,
    label: String,
}

impl Thumbnail {
    /// Caption shown next to the bitmap.
    pub fn label(&self) -> &str {
        &self.label
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
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThumbnailRenderer;

impl ThumbnailRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &Frame, label: &str) -> Result<Thumbnail, ThumbnailError> {
        if frame.is_empty() {
            return Err(ThumbnailError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let mut scaled = downscale(frame.image());
        saturate(&mut scaled, SATURATION_FACTOR);
        let mut bordered = RgbImage::from_pixel(
            scaled.width() + BORDER_PX * 2,
            scaled.height() + BORDER_PX * 2,
            BORDER_COLOR,
        );
        imageops::replace(&mut bordered, &scaled, BORDER_PX as i64, BORDER_PX as i64);
        scanlines(&mut bordered);

        Ok(Thumbnail {
            image: bordered,
            label: label.to_string(),
        })
    }
}

/// Fit inside the bounding box, preserving aspect ratio. Never upscales.
pub(crate) fn thumbnail_size(width: u32, height: u32) -> (u32, u32) {
    if width <= MAX_THUMBNAIL_WIDTH && height <= MAX_THUMBNAIL_HEIGHT {
        return (width, height);
    }
    let scale = f64::min(
        MAX_THUMBNAIL_WIDTH as f64 / width as f64,
        MAX_THUMBNAIL_HEIGHT as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, MAX_THUMBNAIL_WIDTH);
    let h = ((height as f64 * scale).round() as u32).clamp(1, MAX_THUMBNAIL_HEIGHT);
    (w, h)
}

fn downscale(image: &RgbImage) -> RgbImage {
    let (w, h) = thumbnail_size(image.width(), image.height());
    if (w, h) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, w, h, FilterType::Triangle)
}

/// Move each pixel away from its luma grey by `factor`.
fn saturate(image: &mut RgbImage, factor: f32) {
    for pixel in image.pixels_mut() {
        let [r, g, b] = pixel.0;
        let grey = (r as f32 * 299.0 + g as f32 * 587.0 + b as f32 * 114.0) / 1000.0;
        let boost = |c: u8| (grey + (c as f32 - grey) * factor).round().clamp(0.0, 255.0) as u8;
        pixel.0 = [boost(r), boost(g), boost(b)];
    }
}

fn scanlines(image: &mut RgbImage) {
    for (_, y, pixel) in image.enumerate_pixels_mut() {
        if y % SCANLINE_PERIOD == 0 {
            let [r, g, b] = pixel.0;
            pixel.0 = [r / 3, g / 3, b / 3];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        Frame::new(image, 1)
    }

    #[test]
    fn size_fits_box_and_keeps_aspect() {
        assert_eq!(thumbnail_size(640, 480), (133, 100));
        assert_eq!(thumbnail_size(1920, 1080), (150, 84));
        assert_eq!(thumbnail_size(120, 90), (120, 90));
        assert_eq!(thumbnail_size(3000, 10), (150, 1));
    }

    #[test]
    fn output_includes_border() -> anyhow::Result<()> {
        let thumb = ThumbnailRenderer::new().render(&gradient(640, 480), "12:00:00 — Knife")?;
        assert_eq!(thumb.width(), 133 + 8);
        assert_eq!(thumb.height(), 100 + 8);
        // Row 1 is not a scanline, so the border colour is untouched there.
        assert_eq!(thumb.image().get_pixel(0, 1), &BORDER_COLOR);
        // Row 0 is a scanline: (0, 40, 0) / 3.
        assert_eq!(thumb.image().get_pixel(0, 0), &Rgb([0, 13, 0]));
        Ok(())
    }

    #[test]
    fn render_is_deterministic() -> anyhow::Result<()> {
        let renderer = ThumbnailRenderer::new();
        let frame = gradient(300, 200);
        let first = renderer.render(&frame, "09:15:02 — Pistol")?;
        let second = renderer.render(&frame, "09:15:02 — Pistol")?;
        assert_eq!(first, second);
        assert_eq!(first.label(), "09:15:02 — Pistol");
        Ok(())
    }

    #[test]
    fn grey_pixels_are_not_saturated() -> anyhow::Result<()> {
        let frame = Frame::new(RgbImage::from_pixel(10, 10, Rgb([90, 90, 90])), 1);
        let thumb = ThumbnailRenderer::new().render(&frame, "grey")?;
        // Inside the border on a non-scanline row.
        assert_eq!(thumb.image().get_pixel(5, 5), &Rgb([90, 90, 90]));
        // Inside the border on a scanline row.
        assert_eq!(thumb.image().get_pixel(5, 6), &Rgb([30, 30, 30]));
        Ok(())
    }

    #[test]
    fn saturation_pushes_channels_apart() {
        let mut image = RgbImage::from_pixel(1, 1, Rgb([200, 100, 100]));
        saturate(&mut image, SATURATION_FACTOR);
        let [r, g, b] = image.get_pixel(0, 0).0;
        assert!(r > 200);
        assert!(g < 100);
        assert_eq!(g, b);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = Frame::new(RgbImage::new(0, 12), 1);
        assert!(matches!(
            ThumbnailRenderer::new().render(&frame, "empty"),
            Err(ThumbnailError::EmptyFrame { width: 0, height: 12 })
        ));
    }
}
