//! Image file input/output

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, RgbaImage};
use std::path::Path;

/// Service for reading uploads and writing results
#[derive(Debug)]
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is first guessed from the extension; if that fails the
    /// file content is sniffed instead, so a PNG stored under a `.jpg`
    /// suffix still decodes.
    ///
    /// # Errors
    /// - `Io` if the file cannot be read
    /// - `Decode` if neither detection method yields an image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(image::ImageError::IoError(io_err)) => {
                Err(BgRemovalError::file_io_error("read image file", path_ref, &io_err))
            },
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    BgRemovalError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data)
                    .map_err(|content_err| BgRemovalError::image_load_error(path_ref, &content_err))
            },
        }
    }

    /// Encode an RGBA image as PNG, whatever the path's extension
    ///
    /// # Errors
    /// - `Encode` on encoder or write failure
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        image
            .save_with_format(path_ref, image::ImageFormat::Png)
            .map_err(|e| {
                BgRemovalError::encode(format!("Failed to save PNG to {}: {e}", path_ref.display()))
            })
    }
}
