//! # s-zip: streaming ZipCrypto transcoder
//!
//! `s-zip` converts between plain ZIP archives and ZipCrypto-encrypted ZIP
//! archives as a single pass over a byte stream, in either direction, without
//! ever seeking or holding a whole archive in memory. It does not compress,
//! decompress, or otherwise interpret file contents — it only rewrites the
//! record framing (flags, sizes, offsets) and en/decrypts payload bytes.
//!
//! ## Features
//!
//! - **Streaming decrypt**: [`DecryptingReader`] wraps any [`std::io::Read`]
//!   and yields the equivalent plain ZIP byte-for-byte.
//! - **Streaming encrypt**: [`EncryptingWriter`] wraps any [`std::io::Write`]
//!   and accepts a plain ZIP, writing the ZipCrypto-encrypted equivalent.
//! - **Low memory**: entries with known sizes are transformed in fixed-size
//!   chunks; only entries whose sizes are deferred to a trailing data
//!   descriptor are buffered, and even then in bounded 64 KiB rows.
//! - **No seeking**: works over pipes, sockets, or any other forward-only
//!   transport on both ends.
//!
//! ## Quick Start
//!
//! ### Decrypting a ZipCrypto archive
//!
//! ```no_run
//! use s_zip::DecryptingReader;
//! use std::io::{Read, Write};
//!
//! let input = std::fs::File::open("secret.zip")?;
//! let mut reader = DecryptingReader::new(input, b"password");
//!
//! let mut output = std::fs::File::create("plain.zip")?;
//! std::io::copy(&mut reader, &mut output)?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ### Encrypting a plain archive
//!
//! ```no_run
//! use s_zip::EncryptingWriter;
//! use std::io::Write;
//!
//! let input = std::fs::read("plain.zip")?;
//! let output = std::fs::File::create("secret.zip")?;
//! let mut writer = EncryptingWriter::new(output, b"password");
//! writer.write_all(&input)?;
//! writer.finish()?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod buffer;
pub mod encryption;
pub mod error;
pub mod random;
pub mod reader;
pub mod signature;
pub mod writer;

pub use encryption::{ZipCryptoKeys, ENCRYPTION_HEADER_LEN};
pub use error::{Result, SZipError};
pub use reader::DecryptingReader;
pub use signature::Signature;
pub use writer::EncryptingWriter;
