use thiserror::Error;

#[derive(Debug, Error)]
pub enum TexBuilderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Manifest encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid maximum canvas size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Nothing to pack")]
    Empty,
    #[error("Signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, TexBuilderError>;
