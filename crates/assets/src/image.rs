use flyby_render::ImageData;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{}: file not found", .0.display())]
    NotFound(PathBuf),
    #[error("decode failed: {0}")]
    Image(#[from] ::image::ImageError),
}

/// Turns an image file into RGBA8 pixels ready for upload.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<ImageData, DecodeError>;
}

/// Decodes any format the `image` crate knows. Rows are flipped so the first
/// row in memory is the bottom of the picture, matching OBJ texture
/// coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileDecoder;

impl ImageDecoder for ImageFileDecoder {
    fn decode(&self, path: &Path) -> Result<ImageData, DecodeError> {
        if !path.is_file() {
            return Err(DecodeError::NotFound(path.to_path_buf()));
        }
        let rgba = ::image::open(path)?.flipv().to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(ImageData {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}
