//! Synthetic `stub://` clips shared by the file and camera sources.
//!
//! `stub://name` is unbounded; `stub://name#N` ends after N frames.

use crate::error::IngestError;
use crate::frame::Frame;

pub(crate) const STUB_SCHEME: &str = "stub://";

pub(crate) struct SyntheticClip {
    limit: Option<u64>,
    width: u32,
    height: u32,
    frame_count: u64,
    /// Simulated scene state, bumped every 50 frames.
    scene_state: u8,
}

impl SyntheticClip {
    pub(crate) fn new(limit: Option<u64>, width: u32, height: u32) -> Self {
        Self {
            limit,
            width,
            height,
            frame_count: 0,
            scene_state: 0,
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        let frame = Frame::from_rgb(pixels, self.width, self.height, self.frame_count)?;
        Ok(Some(frame))
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

/// Split `stub://name#N` into its optional frame limit.
///
/// Returns `Ok(None)` when `path` is not a stub path at all.
pub(crate) fn parse_stub(path: &str) -> Result<Option<Option<u64>>, IngestError> {
    let Some(rest) = path.strip_prefix(STUB_SCHEME) else {
        return Ok(None);
    };
    match rest.split_once('#') {
        None => Ok(Some(None)),
        Some((_, count)) => {
            let limit = count.parse::<u64>().map_err(|_| {
                IngestError::Unsupported(format!("invalid stub frame count in {}", path))
            })?;
            Ok(Some(Some(limit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stub_reads_frame_limit() {
        assert_eq!(parse_stub("clip.mp4").unwrap(), None);
        assert_eq!(parse_stub("stub://front").unwrap(), Some(None));
        assert_eq!(parse_stub("stub://front#3").unwrap(), Some(Some(3)));
        assert!(parse_stub("stub://front#three").is_err());
    }

    #[test]
    fn bounded_clip_ends_after_limit() -> anyhow::Result<()> {
        let mut clip = SyntheticClip::new(Some(2), 4, 2);
        let first = clip.next_frame()?.expect("first frame");
        let second = clip.next_frame()?.expect("second frame");
        assert_eq!(first.index(), 1);
        assert_eq!(second.index(), 2);
        assert_ne!(first.pixels(), second.pixels());
        assert!(clip.next_frame()?.is_none());
        assert!(clip.next_frame()?.is_none());
        Ok(())
    }
}
