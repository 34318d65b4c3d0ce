//! Error types for s-zip

use std::io;

/// Result type for s-zip operations
pub type Result<T> = std::result::Result<T, SZipError>;

/// Error types that can occur while decrypting or encrypting a ZipCrypto archive
#[derive(Debug)]
pub enum SZipError {
    /// I/O error from the underlying source or sink
    Io(io::Error),
    /// Decrypter input: local file header flag bit 0 (encrypted) was clear
    NotEncrypted,
    /// Encrypter input: local file header flag bit 0 (encrypted) was already set
    AlreadyEncrypted,
    /// Local file header flag bit 6 (strong encryption) is set; unsupported
    StrongEncryptionUnsupported,
    /// Unrecognized signature at a record boundary, zero-length file name, or
    /// truncated input before a state completed
    MalformedArchive(String),
    /// Strict mode: the 12th recovered header byte did not match the stored
    /// CRC low byte
    PasswordCheckFailed,
}

impl std::fmt::Display for SZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SZipError::Io(e) => write!(f, "I/O error: {}", e),
            SZipError::NotEncrypted => {
                write!(f, "local file header is not marked as encrypted")
            }
            SZipError::AlreadyEncrypted => {
                write!(f, "local file header is already marked as encrypted")
            }
            SZipError::StrongEncryptionUnsupported => {
                write!(f, "strong encryption (flag bit 6) is not supported")
            }
            SZipError::MalformedArchive(msg) => write!(f, "malformed archive: {}", msg),
            SZipError::PasswordCheckFailed => write!(f, "password check failed"),
        }
    }
}

impl std::error::Error for SZipError {}

impl From<io::Error> for SZipError {
    fn from(err: io::Error) -> Self {
        SZipError::Io(err)
    }
}

impl From<SZipError> for io::Error {
    fn from(err: SZipError) -> Self {
        match err {
            SZipError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
