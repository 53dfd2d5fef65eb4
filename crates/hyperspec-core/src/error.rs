use thiserror::Error;

#[derive(Error, Debug)]
pub enum HyperspecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid crop database: {0}")]
    InvalidCropDb(#[from] serde_json::Error),

    #[error("Invalid cube file: {0}")]
    InvalidCube(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid crop: {0}")]
    InvalidCrop(String),

    #[error("Capture ID {0} not found in crops file")]
    UnknownCapture(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Homography estimation failed: {0}")]
    Homography(String),
}

pub type Result<T> = std::result::Result<T, HyperspecError>;
