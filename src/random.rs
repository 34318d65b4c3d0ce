//! Cryptographically secure randomness for encryption-header filler bytes

use std::io;

use crate::error::{Result, SZipError};

/// Fill `buf` with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf)
        .map_err(|e| SZipError::Io(io::Error::new(io::ErrorKind::Other, e)))
}
