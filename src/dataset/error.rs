use crate::modifications::ModificationError;
use crate::pepxml::SerializationError;
use crate::results::ParseError;

/// Errors that abort the conversion of one dataset
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The hit table could not be read
    #[error("Hit table error: {0}")]
    ParseError(#[from] ParseError),

    /// The modification catalog could not be resolved
    #[error("Modification error: {0}")]
    ModificationError(#[from] ModificationError),

    /// The output document could not be written
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),

    /// A companion file the dataset needs is absent
    #[error("Missing required file {}: {reason}", .file.display())]
    MissingRequiredAuxiliary {
        /// Expected location
        file: std::path::PathBuf,
        /// Why it is needed
        reason: String,
    },

    /// Invalid or malformed dataset path
    #[error("Invalid dataset path: {0}")]
    InvalidPath(String),
}
