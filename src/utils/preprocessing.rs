//! Image preprocessing for model inference

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Padding color for the letterbox canvas
const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Scale and centering offsets from original image to model canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl LetterboxTransform {
    /// Fit `original` (width, height) inside `canvas` (width, height), centered
    #[must_use]
    pub fn fit(original: (u32, u32), canvas: (u32, u32)) -> Self {
        let (orig_width, orig_height) = original;
        let (canvas_width, canvas_height) = canvas;

        let scale = (canvas_width as f32 / orig_width.max(1) as f32)
            .min(canvas_height as f32 / orig_height.max(1) as f32);

        let scaled_width = ((orig_width as f32 * scale).round() as u32).clamp(1, canvas_width.max(1));
        let scaled_height =
            ((orig_height as f32 * scale).round() as u32).clamp(1, canvas_height.max(1));

        Self {
            scale,
            offset_x: canvas_width.saturating_sub(scaled_width) / 2,
            offset_y: canvas_height.saturating_sub(scaled_height) / 2,
            scaled_width,
            scaled_height,
        }
    }

    /// Map an original-image pixel (sampled at its center) to canvas coordinates
    #[must_use]
    pub fn to_canvas(&self, x: u32, y: u32) -> (u32, u32) {
        let scaled_x = (((x as f32 + 0.5) * self.scale) as u32).min(self.scaled_width - 1);
        let scaled_y = (((y as f32 + 0.5) * self.scale) as u32).min(self.scaled_height - 1);
        (scaled_x + self.offset_x, scaled_y + self.offset_y)
    }
}

/// Image preprocessing utilities
#[derive(Debug)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into a normalized NCHW tensor
    ///
    /// Converts to RGB, resizes preserving aspect ratio, centers the result
    /// on a white canvas of the model's target size and normalizes each
    /// channel as `(v / 255 - mean) / std`.
    ///
    /// # Errors
    /// - Zero-sized image or target size
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_height, target_width] = preprocessing_config.target_size;
        if target_height == 0 || target_width == 0 {
            return Err(BgRemovalError::invalid_config("Model target size must be non-zero"));
        }

        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Err(BgRemovalError::decode("Image has zero width or height"));
        }

        let transform =
            LetterboxTransform::fit((orig_width, orig_height), (target_width, target_height));

        let resized = image::imageops::resize(
            &rgb_image,
            transform.scaled_width,
            transform.scaled_height,
            image::imageops::FilterType::Triangle,
        );

        let mut canvas =
            ImageBuffer::from_pixel(target_width, target_height, image::Rgb(PADDING_COLOR));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(transform.offset_x),
            i64::from(transform.offset_y),
        );

        Ok(Self::canvas_to_tensor(&canvas, preprocessing_config))
    }

    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions match the canvas
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn test_config(size: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [size, size],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn test_tensor_shape() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(100, 100, Rgb([255, 0, 0])));
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &test_config(64)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);

        // Fully covered canvas: red is (1 - 0.5), green (0 - 0.5)
        assert!((tensor[[0, 0, 32, 32]] - 0.5).abs() < 1e-6);
        assert!((tensor[[0, 1, 32, 32]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_wide_image_is_padded_vertically() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(200, 100, Rgb([0, 0, 0])));
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &test_config(64)).unwrap();

        // Top rows are white padding, middle rows are the black image
        assert!((tensor[[0, 0, 0, 32]] - 0.5).abs() < 1e-6);
        assert!((tensor[[0, 0, 32, 32]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_transform() {
        let transform = LetterboxTransform::fit((200, 100), (64, 64));
        assert_eq!(transform.scaled_width, 64);
        assert_eq!(transform.scaled_height, 32);
        assert_eq!(transform.offset_x, 0);
        assert_eq!(transform.offset_y, 16);
        assert_eq!(transform.to_canvas(0, 0), (0, 16));
        assert_eq!(transform.to_canvas(100, 50), (32, 32));
    }

    #[test]
    fn test_zero_target_size_rejected() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb([0, 0, 0])));
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &test_config(0)).is_err());
    }
}
