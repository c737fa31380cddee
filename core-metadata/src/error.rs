use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to extract replay gain: {0}")]
    ExtractionFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        match self {
            MetadataError::FileNotFound(_) => true,
            MetadataError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            MetadataError::ExtractionFailed(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
