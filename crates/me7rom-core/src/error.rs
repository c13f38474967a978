use strum::IntoStaticStr;
use thiserror::Error;

#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Error {
    #[error("{what} has the wrong size: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        what: String,
        expected: String,
        actual: usize,
    },

    #[error("Offset {offset:#x} (+{len} bytes) is outside the image ({image_len:#x} bytes)")]
    OutOfRange {
        offset: usize,
        len: usize,
        image_len: usize,
    },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    pub fn is_size_mismatch(&self) -> bool {
        matches!(self, Error::SizeMismatch { .. })
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::OutOfRange { .. })
    }

    /// Short machine-readable name, e.g. `size_mismatch`
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_out_of_range_message() {
        let err = Error::OutOfRange {
            offset: 0x7FFFE,
            len: 4,
            image_len: 0x80000,
        };
        assert!(err.is_out_of_range());
        assert_eq!(
            err.to_string(),
            "Offset 0x7fffe (+4 bytes) is outside the image (0x80000 bytes)"
        );
    }
}
