//! Local file frame source using FFmpeg.
//!
//! Decodes the best video track of a local file in-memory and converts every
//! frame to RGB24. End of file flushes the decoder before reporting end of
//! stream.

use ffmpeg_next as ffmpeg;

use crate::error::IngestError;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self, IngestError> {
        ffmpeg::init().map_err(|err| IngestError::open(path, format!("initialize ffmpeg: {err}")))?;
        let input = ffmpeg::format::input(&path)
            .map_err(|err| IngestError::open(path, format!("ffmpeg input: {err}")))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| IngestError::open(path, "file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|err| IngestError::open(path, format!("decoder parameters: {err}")))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|err| IngestError::open(path, format!("open video decoder: {err}")))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|err| IngestError::open(path, format!("create scaler: {err}")))?;

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(|err| IngestError::read(&self.path, format!("send packet: {err}")))?,
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|err| IngestError::read(&self.path, format!("flush decoder: {err}")))?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == index)
            .map(|(_, packet)| packet)
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame, IngestError> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|err| IngestError::read(&self.path, format!("scale frame to RGB: {err}")))?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)
            .ok_or_else(|| IngestError::read(&self.path, "ffmpeg frame row is out of bounds"))?;
        self.frame_count += 1;
        Ok(Frame::from_rgb(pixels, width, height, self.frame_count)?)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Option<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Some((data.get(..row_bytes * height as usize)?.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(data.get(start..start + row_bytes)?);
    }
    Some((pixels, width, height))
}
