//! Concrete `ImageOps` implementation.
//!
//! Spec treats image primitives as an external dependency; on this
//! platform the natural "external library" is the `image`/`imageproc`
//! ecosystem, so this module ships a real implementation rather than a
//! stub — every sub-detector and scorer in `application::services` is
//! written against this crate's actual numerical output, not a mock.

mod dct;

use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::domain::ports::{ImageOps, ImageOpsError, JpegEncoder, JpegEncodingError};
use crate::domain::value_objects::{BoundingBox, Image};

/// BGR channel order throughout this crate's color frames, matching the
/// convention the screen-attack color detectors already assume.
const CHANNEL_B: u8 = 0;
const CHANNEL_G: u8 = 1;
const CHANNEL_R: u8 = 2;

pub struct DefaultImageOps;

impl DefaultImageOps {
    pub fn new() -> Self {
        Self
    }

    fn require_grayscale(image: &Image) -> Result<(), ImageOpsError> {
        if image.channels() != 1 {
            return Err(ImageOpsError::InvalidDimensions(format!(
                "expected a single-channel image, got {} channels",
                image.channels()
            )));
        }
        Ok(())
    }

    fn to_gray_image(image: &Image) -> Result<GrayImage, ImageOpsError> {
        Self::require_grayscale(image)?;
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(ImageOpsError::InvalidDimensions("zero-sized image".to_string()));
        }
        let mut buffer = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = image.sample(x, y, 0).clamp(0.0, 255.0) as u8;
                buffer.put_pixel(x, y, Luma([v]));
            }
        }
        Ok(buffer)
    }
}

impl Default for DefaultImageOps {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageOps for DefaultImageOps {
    fn to_grayscale(&self, image: &Image) -> Result<Image, ImageOpsError> {
        if image.is_grayscale() {
            return Ok(image.to_owned_copy());
        }
        if image.channels() != 3 {
            return Err(ImageOpsError::InvalidDimensions(format!(
                "cannot convert {}-channel image to grayscale",
                image.channels()
            )));
        }
        let (w, h) = (image.width(), image.height());
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let b = image.sample(x, y, CHANNEL_B);
                let g = image.sample(x, y, CHANNEL_G);
                let r = image.sample(x, y, CHANNEL_R);
                let luma = 0.114 * b + 0.587 * g + 0.299 * r;
                data.push(luma.clamp(0.0, 255.0) as u8);
            }
        }
        Ok(Image::new_u8(w, h, 1, data))
    }

    fn resize(&self, image: &Image, width: u32, height: u32) -> Result<Image, ImageOpsError> {
        if width == 0 || height == 0 {
            return Err(ImageOpsError::InvalidDimensions("target resize dimensions must be nonzero".to_string()));
        }
        let (src_w, src_h) = (image.width(), image.height());
        if src_w == 0 || src_h == 0 {
            return Err(ImageOpsError::InvalidDimensions("source image has zero dimension".to_string()));
        }
        let channels = image.channels();
        let is_f32 = image.as_f32().is_some();

        let mut f32_data = Vec::with_capacity((width * height * channels as u32) as usize);
        let mut u8_data = Vec::with_capacity((width * height * channels as u32) as usize);

        for y in 0..height {
            let src_y = (y as f32 + 0.5) * src_h as f32 / height as f32 - 0.5;
            for x in 0..width {
                let src_x = (x as f32 + 0.5) * src_w as f32 / width as f32 - 0.5;
                for c in 0..channels {
                    let value = bilinear_sample(image, src_x, src_y, c, src_w, src_h);
                    if is_f32 {
                        f32_data.push(value);
                    } else {
                        u8_data.push(value.round().clamp(0.0, 255.0) as u8);
                    }
                }
            }
        }

        Ok(if is_f32 {
            Image::new_f32(width, height, channels, f32_data)
        } else {
            Image::new_u8(width, height, channels, u8_data)
        })
    }

    fn crop(&self, image: &Image, roi: BoundingBox) -> Result<Image, ImageOpsError> {
        let clipped = roi.clip_to(image.width() as i32, image.height() as i32);
        if clipped.width() <= 0 || clipped.height() <= 0 {
            return Err(ImageOpsError::RegionOutOfBounds(roi));
        }
        let (x0, y0) = (clipped.x() as u32, clipped.y() as u32);
        let (w, h) = (clipped.width() as u32, clipped.height() as u32);
        let channels = image.channels();
        let is_f32 = image.as_f32().is_some();

        let mut f32_data = Vec::with_capacity((w * h * channels as u32) as usize);
        let mut u8_data = Vec::with_capacity((w * h * channels as u32) as usize);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                for c in 0..channels {
                    let value = image.sample(x, y, c);
                    if is_f32 {
                        f32_data.push(value);
                    } else {
                        u8_data.push(value.clamp(0.0, 255.0) as u8);
                    }
                }
            }
        }

        Ok(if is_f32 { Image::new_f32(w, h, channels, f32_data) } else { Image::new_u8(w, h, channels, u8_data) })
    }

    fn sobel_magnitude(&self, image: &Image) -> Result<Image, ImageOpsError> {
        let gray = Self::to_gray_image(image)?;
        let gx = horizontal_sobel(&gray);
        let gy = vertical_sobel(&gray);
        let (w, h) = (gray.width(), gray.height());
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let dx = gx.get_pixel(x, y).0[0] as f32;
                let dy = gy.get_pixel(x, y).0[0] as f32;
                data.push((dx * dx + dy * dy).sqrt());
            }
        }
        Ok(Image::new_f32(w, h, 1, data))
    }

    fn sobel_angles(&self, image: &Image) -> Result<Image, ImageOpsError> {
        let gray = Self::to_gray_image(image)?;
        let gx = horizontal_sobel(&gray);
        let gy = vertical_sobel(&gray);
        let (w, h) = (gray.width(), gray.height());
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let dx = gx.get_pixel(x, y).0[0] as f32;
                let dy = gy.get_pixel(x, y).0[0] as f32;
                data.push(dy.atan2(dx));
            }
        }
        Ok(Image::new_f32(w, h, 1, data))
    }

    fn canny_edges(&self, image: &Image, low_threshold: f32, high_threshold: f32) -> Result<Image, ImageOpsError> {
        let gray = Self::to_gray_image(image)?;
        let edges = canny(&gray, low_threshold, high_threshold);
        let (w, h) = (edges.width(), edges.height());
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                data.push(edges.get_pixel(x, y).0[0]);
            }
        }
        Ok(Image::new_u8(w, h, 1, data))
    }

    fn dct_spectrum(&self, image: &Image) -> Result<Vec<f32>, ImageOpsError> {
        Self::require_grayscale(image)?;
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(ImageOpsError::InvalidDimensions("zero-sized image".to_string()));
        }
        let mut samples = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                samples.push(image.sample(x, y, 0));
            }
        }
        Ok(dct::dct2_magnitude(&samples, w as usize, h as usize))
    }

    fn laplacian_variance(&self, image: &Image) -> Result<f32, ImageOpsError> {
        Self::require_grayscale(image)?;
        let (w, h) = (image.width(), image.height());
        if w < 3 || h < 3 {
            return Err(ImageOpsError::InvalidDimensions("laplacian requires at least a 3x3 image".to_string()));
        }
        let mut responses = Vec::with_capacity(((w - 2) * (h - 2)) as usize);
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let center = image.sample(x, y, 0);
                let up = image.sample(x, y - 1, 0);
                let down = image.sample(x, y + 1, 0);
                let left = image.sample(x - 1, y, 0);
                let right = image.sample(x + 1, y, 0);
                responses.push(up + down + left + right - 4.0 * center);
            }
        }
        let mean = responses.iter().sum::<f32>() / responses.len() as f32;
        let variance = responses.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / responses.len() as f32;
        Ok(variance)
    }

    fn mean_intensity(&self, image: &Image) -> Result<f32, ImageOpsError> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(ImageOpsError::InvalidDimensions("zero-sized image".to_string()));
        }
        let channels = image.channels();
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for y in 0..h {
            for x in 0..w {
                for c in 0..channels {
                    sum += image.sample(x, y, c);
                    count += 1;
                }
            }
        }
        Ok(sum / count as f32)
    }
}

fn bilinear_sample(image: &Image, x: f32, y: f32, c: u8, src_w: u32, src_h: u32) -> f32 {
    let x = x.clamp(0.0, (src_w - 1) as f32);
    let y = y.clamp(0.0, (src_h - 1) as f32);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src_w - 1);
    let y1 = (y0 + 1).min(src_h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = image.sample(x0, y0, c) * (1.0 - fx) + image.sample(x1, y0, c) * fx;
    let bottom = image.sample(x0, y1, c) * (1.0 - fx) + image.sample(x1, y1, c) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// JPEG encoder backing `bestFrameImage`/`bestFaceImage` evidence capture.
pub struct DefaultJpegEncoder;

impl DefaultJpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultJpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegEncoder for DefaultJpegEncoder {
    fn encode(&self, image: &Image, quality: u8) -> Result<Vec<u8>, JpegEncodingError> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(JpegEncodingError::Failed("zero-sized image".to_string()));
        }

        let dynamic = if image.channels() == 1 {
            let mut buffer = GrayImage::new(w, h);
            for y in 0..h {
                for x in 0..w {
                    buffer.put_pixel(x, y, Luma([image.sample(x, y, 0).clamp(0.0, 255.0) as u8]));
                }
            }
            image::DynamicImage::ImageLuma8(buffer)
        } else {
            let mut buffer = image::RgbImage::new(w, h);
            for y in 0..h {
                for x in 0..w {
                    let b = image.sample(x, y, CHANNEL_B).clamp(0.0, 255.0) as u8;
                    let g = image.sample(x, y, CHANNEL_G).clamp(0.0, 255.0) as u8;
                    let r = image.sample(x, y, CHANNEL_R).clamp(0.0, 255.0) as u8;
                    buffer.put_pixel(x, y, image::Rgb([r, g, b]));
                }
            }
            image::DynamicImage::ImageRgb8(buffer)
        };

        let mut bytes: Vec<u8> = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder
            .encode_image(&dynamic)
            .map_err(|err| JpegEncodingError::Failed(err.to_string()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_conversion_is_identity_for_single_channel() {
        let ops = DefaultImageOps::new();
        let image = Image::new_u8(2, 2, 1, vec![10, 20, 30, 40]);
        let gray = ops.to_grayscale(&image).unwrap();
        assert_eq!(gray.sample(1, 1, 0), 40.0);
    }

    #[test]
    fn resize_preserves_uniform_value() {
        let ops = DefaultImageOps::new();
        let image = Image::new_u8(8, 8, 1, vec![77u8; 64]);
        let resized = ops.resize(&image, 4, 4).unwrap();
        assert_eq!(resized.width(), 4);
        assert!((resized.sample(2, 2, 0) - 77.0).abs() < 1.0);
    }

    #[test]
    fn crop_out_of_bounds_roi_errors() {
        let ops = DefaultImageOps::new();
        let image = Image::new_u8(4, 4, 1, vec![1u8; 16]);
        let result = ops.crop(&image, BoundingBox::new(100, 100, 10, 10));
        assert!(result.is_err());
    }

    #[test]
    fn mean_intensity_of_flat_image_equals_its_value() {
        let ops = DefaultImageOps::new();
        let image = Image::new_u8(4, 4, 1, vec![90u8; 16]);
        assert!((ops.mean_intensity(&image).unwrap() - 90.0).abs() < 0.01);
    }

    #[test]
    fn laplacian_variance_of_flat_image_is_zero() {
        let ops = DefaultImageOps::new();
        let image = Image::new_u8(5, 5, 1, vec![128u8; 25]);
        assert!(ops.laplacian_variance(&image).unwrap().abs() < 1e-6);
    }

    #[test]
    fn jpeg_roundtrip_produces_nonempty_buffer() {
        let encoder = DefaultJpegEncoder::new();
        let image = Image::new_u8(16, 16, 1, vec![128u8; 256]);
        let bytes = encoder.encode(&image, 80).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }
}
