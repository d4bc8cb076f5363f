//! Still images for single-shot detection.

use std::path::Path;

use crate::error::IngestError;
use crate::frame::Frame;

/// Decode a `.jpg/.jpeg/.png` file into a frame.
pub fn load_image(path: &Path) -> Result<Frame, IngestError> {
    let decoded = image::open(path).map_err(|err| IngestError::open(path.display().to_string(), err))?;
    Ok(Frame::new(decoded.into_rgb8(), 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn loads_png_as_rgb_frame() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("target.png");
        RgbImage::from_pixel(5, 3, Rgb([10, 20, 30])).save(&path)?;

        let frame = load_image(&path)?;
        assert_eq!((frame.width(), frame.height()), (5, 3));
        assert_eq!(frame.image().get_pixel(4, 2), &Rgb([10, 20, 30]));
        Ok(())
    }

    #[test]
    fn unreadable_image_is_open_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg")?;
        assert!(matches!(load_image(&path), Err(IngestError::Open { .. })));
        Ok(())
    }
}
