//! Frame decoding.
//!
//! The session treats the codec as opaque: reassembled bytes in, a pixel
//! buffer or an error out.

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty frame buffer")]
    Empty,
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Channel layout of a [`DecodedFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// A rectangular pixel buffer, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl DecodedFrame {
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.channels()
    }
}

pub trait FrameCodec: Send + Sync {
    fn decode(&self, buf: &[u8]) -> Result<DecodedFrame, DecodeError>;
}

/// JPEG decoder for the frame server's compressed frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl FrameCodec for JpegCodec {
    fn decode(&self, buf: &[u8]) -> Result<DecodedFrame, DecodeError> {
        if buf.is_empty() {
            return Err(DecodeError::Empty);
        }
        let image = image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?;
        let (width, height) = (image.width(), image.height());
        let (layout, data) = match image {
            DynamicImage::ImageLuma8(gray) => (PixelLayout::Gray8, gray.into_raw()),
            other => (PixelLayout::Rgb8, other.into_rgb8().into_raw()),
        };
        Ok(DecodedFrame {
            width,
            height,
            layout,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{GrayImage, RgbImage};

    fn encode_rgb(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 80)
            .encode_image(&img)
            .unwrap();
        out
    }

    #[test]
    fn decodes_rgb_jpeg() {
        let jpeg = encode_rgb(32, 16);
        let frame = JpegCodec.decode(&jpeg).unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.layout, PixelLayout::Rgb8);
        assert_eq!(frame.data.len(), 32 * 16 * 3);
        assert_eq!(frame.stride(), 96);
    }

    #[test]
    fn grayscale_jpeg_stays_single_channel() {
        let img = GrayImage::from_fn(8, 8, |x, _| image::Luma([(x * 30) as u8]));
        let mut out = Vec::new();
        JpegEncoder::new(&mut out).encode_image(&img).unwrap();

        let frame = JpegCodec.decode(&out).unwrap();
        assert_eq!(frame.layout, PixelLayout::Gray8);
        assert_eq!(frame.data.len(), 64);
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(JpegCodec.decode(&[]), Err(DecodeError::Empty)));
        assert!(matches!(
            JpegCodec.decode(b"definitely not a jpeg"),
            Err(DecodeError::Image(_))
        ));
    }
}
