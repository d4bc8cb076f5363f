//! Box outlines on annotated frames.

use image::{Rgb, RgbImage};

use crate::detect::result::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 65]);
const BOX_THICKNESS: u32 = 2;

/// Draw a rectangle outline for every detection, clipped to the image.
pub(crate) fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        draw_outline(image, detection);
    }
}

fn draw_outline(image: &mut RgbImage, detection: &Detection) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(width - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(height - 1);

    let bbox = detection.bbox;
    let x0 = clamp_x(bbox.x);
    let y0 = clamp_y(bbox.y);
    let x1 = clamp_x(bbox.x + bbox.w);
    let y1 = clamp_y(bbox.y + bbox.h);

    for t in 0..BOX_THICKNESS {
        for x in x0..=x1 {
            image.put_pixel(x, (y0 + t).min(y1), BOX_COLOR);
            image.put_pixel(x, y1.saturating_sub(t).max(y0), BOX_COLOR);
        }
        for y in y0..=y1 {
            image.put_pixel((x0 + t).min(x1), y, BOX_COLOR);
            image.put_pixel(x1.saturating_sub(t).max(x0), y, BOX_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    #[test]
    fn outline_is_clipped_to_image() {
        let mut image = RgbImage::new(6, 6);
        let detection = Detection::new(
            0,
            50.0,
            BoundingBox { x: -4.0, y: 2.0, w: 40.0, h: 2.0 },
        );
        draw_detections(&mut image, &[detection]);

        assert_eq!(image.get_pixel(0, 2), &BOX_COLOR);
        assert_eq!(image.get_pixel(5, 4), &BOX_COLOR);
        assert_eq!(image.get_pixel(2, 0), &Rgb([0, 0, 0]));
    }
}
