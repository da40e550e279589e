use crate::error::{Result, StreamError};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::time::SystemTime;

/// 8-bit monochrome image retrieved from the camera
#[derive(Debug, Clone, PartialEq)]
pub struct MonoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Row-major Mono8 pixels, `width * height` bytes
    pub pixels: Vec<u8>,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
}

impl MonoFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            timestamp: SystemTime::now(),
        }
    }

    /// Uniform frame of the given value with these dimensions
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    /// Maximum-brightness frame with the same dimensions as `self`
    pub fn white_like(&self) -> Self {
        Self::filled(self.width, self.height, u8::MAX)
    }

    /// Check the pixel buffer against the declared dimensions
    pub fn validate_size(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats::compute(&self.pixels)
    }
}

/// Brightness aggregates over one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub max: u8,
    /// Mean intensity rounded to three decimals
    pub mean: f64,
}

impl FrameStats {
    pub fn compute(pixels: &[u8]) -> Self {
        if pixels.is_empty() {
            return Self::default();
        }

        let mut max = 0u8;
        let mut sum = 0u64;
        for &p in pixels {
            max = max.max(p);
            sum += p as u64;
        }

        let mean = sum as f64 / pixels.len() as f64;
        Self {
            max,
            mean: (mean * 1000.0).round() / 1000.0,
        }
    }
}

/// JPEG-encoded frame ready for delivery to stream consumers
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Capture sequence number
    pub sequence: u64,
    pub jpeg: Bytes,
}

impl EncodedFrame {
    /// Multipart chunk for a `multipart/x-mixed-replace; boundary=frame` body
    pub fn multipart_chunk(&self) -> Bytes {
        const HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

        let mut chunk = Vec::with_capacity(HEADER.len() + self.jpeg.len() + 2);
        chunk.extend_from_slice(HEADER);
        chunk.extend_from_slice(&self.jpeg);
        chunk.extend_from_slice(b"\r\n");
        Bytes::from(chunk)
    }
}

/// Encode a Mono8 frame as baseline JPEG
pub fn encode_jpeg(frame: &MonoFrame, quality: u8) -> Result<Bytes> {
    if !frame.validate_size() {
        return Err(StreamError::Encoding {
            details: format!(
                "{} bytes for a {}x{} frame",
                frame.pixels.len(),
                frame.width,
                frame.height
            ),
        }
        .into());
    }

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode(&frame.pixels, frame.width, frame.height, ColorType::L8)
        .map_err(|e| StreamError::Encoding {
            details: e.to_string(),
        })?;

    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_max_and_mean() {
        let stats = FrameStats::compute(&[0, 10, 20, 250]);
        assert_eq!(stats.max, 250);
        assert_eq!(stats.mean, 70.0);
    }

    #[test]
    fn test_stats_mean_rounded_to_three_decimals() {
        let stats = FrameStats::compute(&[1, 2, 2]);
        assert_eq!(stats.mean, 1.667);
    }

    #[test]
    fn test_stats_empty_frame() {
        assert_eq!(FrameStats::compute(&[]), FrameStats::default());
    }

    #[test]
    fn test_white_like_keeps_dimensions() {
        let frame = MonoFrame::filled(8, 4, 17);
        let white = frame.white_like();

        assert_eq!((white.width, white.height), (8, 4));
        assert!(white.pixels.iter().all(|&p| p == 255));
    }

    #[test]
    fn test_encode_jpeg_markers() {
        let frame = MonoFrame::filled(16, 16, 128);
        let jpeg = encode_jpeg(&frame, 90).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let frame = MonoFrame::new(16, 16, vec![0; 10]);
        assert!(encode_jpeg(&frame, 90).is_err());
    }

    #[test]
    fn test_multipart_chunk_layout() {
        let frame = EncodedFrame {
            sequence: 1,
            jpeg: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
        };
        let chunk = frame.multipart_chunk();

        let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(chunk.as_ref(), expected.as_slice());
    }
}
