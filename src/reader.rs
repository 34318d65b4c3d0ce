//! Streaming ZipCrypto decrypter
//!
//! [`DecryptingReader`] wraps any [`Read`] byte source carrying a
//! ZipCrypto-protected ZIP archive and presents a [`Read`] of the equivalent
//! plain archive: local file headers have their encryption flag cleared and
//! compressed-size fields shrunk by 12 bytes, and payloads are decrypted and
//! have their 12-byte encryption header stripped. Everything else — central
//! directory, end of central directory, file names, extra fields — passes
//! through byte for byte.
//!
//! The reader never seeks; it only ever reads forward from the source.

use std::collections::VecDeque;
use std::io::{self, Read};

use crate::encryption::{ZipCryptoKeys, ENCRYPTION_HEADER_LEN};
use crate::error::{Result, SZipError};
use crate::signature::{Signature, SignatureScanner};

const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DEFERRED_SIZES: u16 = 0x0008;
const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;

const PAYLOAD_CHUNK: usize = 8192;

/// Streaming decrypter for a ZipCrypto-protected ZIP archive.
pub struct DecryptingReader<R: Read> {
    source: R,
    password_keys: ZipCryptoKeys,
    strict: bool,
    state: State,
    pending: VecDeque<u8>,
}

enum State {
    ScanSignature,
    Lfh(LfhState),
    /// Decrypting a payload of known length.
    PayloadKnown { keys: ZipCryptoKeys, remaining: u64 },
    /// Decrypting a payload whose length is only known via a trailing data
    /// descriptor; `window` holds up to 4 not-yet-classified raw bytes, and
    /// `scanner` watches them for the data-descriptor signature.
    PayloadUnknown {
        keys: ZipCryptoKeys,
        window: VecDeque<u8>,
        scanner: SignatureScanner,
    },
    /// Inside the data descriptor that terminates a deferred-size payload.
    DataDescriptor(DdState),
    /// Everything after the first non-LFH signature: passed through verbatim.
    Tail,
    Done,
}

enum LfhState {
    AfterSignature,
    AfterVersionNeeded,
    AfterFlags { deferred: bool },
    AfterCompMethod { deferred: bool },
    AfterModTime { deferred: bool },
    AfterModDate { deferred: bool },
    AfterCrc { deferred: bool },
    AfterCompSize { deferred: bool, crc_low_byte: u8 },
    AfterUncompSize {
        deferred: bool,
        compressed_size: u32,
        crc_low_byte: Option<u8>,
    },
    SkipNameExtra {
        deferred: bool,
        compressed_size: u32,
        crc_low_byte: Option<u8>,
        remaining: usize,
    },
}

enum DdState {
    AfterSignature,
    AfterCrc,
    AfterCompSize,
}

impl<R: Read> DecryptingReader<R> {
    /// Create a non-strict decrypter (password-check mismatches are ignored,
    /// matching the "advisory" default described by spec §7/§9).
    pub fn new(source: R, password: &[u8]) -> Self {
        Self::from_password_keys(source, ZipCryptoKeys::from_password(password), false)
    }

    /// Create a decrypter that fails with [`SZipError::PasswordCheckFailed`]
    /// when the encryption header's check byte doesn't match the entry's CRC.
    pub fn new_strict(source: R, password: &[u8]) -> Self {
        Self::from_password_keys(source, ZipCryptoKeys::from_password(password), true)
    }

    /// Build a decrypter from already-derived password keys. Pairs with
    /// [`ZipCryptoKeys::from_password_zeroizing`] for callers who don't want
    /// the cleartext password retained anywhere past key derivation.
    pub fn from_password_keys(source: R, password_keys: ZipCryptoKeys, strict: bool) -> Self {
        Self {
            source,
            password_keys,
            strict,
            state: State::ScanSignature,
            pending: VecDeque::new(),
        }
    }

    /// Consume `self`, returning the wrapped source.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read exactly `n` bytes from the source. `Ok(None)` means the source
    /// was already at EOF (zero bytes available); any other shortfall is a
    /// [`SZipError::MalformedArchive`].
    fn read_n(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; n];
        let mut total = 0usize;
        while total < n {
            let read = self.source.read(&mut buf[total..])?;
            if read == 0 {
                break;
            }
            total += read;
        }
        if total == 0 {
            return Ok(None);
        }
        if total < n {
            return Err(SZipError::MalformedArchive(format!(
                "truncated input: expected {} bytes, got {}",
                n, total
            )));
        }
        Ok(Some(buf))
    }

    fn read_exact_req(&mut self, n: usize) -> Result<Vec<u8>> {
        self.read_n(n)?.ok_or_else(|| {
            SZipError::MalformedArchive("truncated input: expected more bytes, got EOF".into())
        })
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    /// Run the state machine forward until at least one output byte is
    /// pending, or the archive is fully consumed.
    fn advance(&mut self) -> Result<()> {
        while self.pending.is_empty() {
            match std::mem::replace(&mut self.state, State::Done) {
                State::ScanSignature => self.step_scan_signature()?,
                State::Lfh(lfh) => self.step_lfh(lfh)?,
                State::PayloadKnown { keys, remaining } => {
                    self.step_payload_known(keys, remaining)?
                }
                State::PayloadUnknown { keys, window, scanner } => {
                    self.step_payload_unknown(keys, window, scanner)?
                }
                State::DataDescriptor(dd) => self.step_data_descriptor(dd)?,
                State::Tail => {
                    let chunk = self.read_n(PAYLOAD_CHUNK)?;
                    match chunk {
                        Some(bytes) => {
                            self.emit(&bytes);
                            self.state = State::Tail;
                        }
                        None => self.state = State::Done,
                    }
                }
                State::Done => {
                    self.state = State::Done;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn step_scan_signature(&mut self) -> Result<()> {
        match self.read_n(4)? {
            None => {
                self.state = State::Done;
            }
            Some(bytes) => {
                let window = [bytes[0], bytes[1], bytes[2], bytes[3]];
                self.emit(&bytes);
                if crate::signature::classify(window) == Some(Signature::LocalFileHeader) {
                    self.state = State::Lfh(LfhState::AfterSignature);
                } else {
                    self.state = State::Tail;
                }
            }
        }
        Ok(())
    }

    fn step_lfh(&mut self, lfh: LfhState) -> Result<()> {
        match lfh {
            LfhState::AfterSignature => {
                let bytes = self.read_exact_req(2)?; // version needed
                self.emit(&bytes);
                self.state = State::Lfh(LfhState::AfterVersionNeeded);
            }
            LfhState::AfterVersionNeeded => {
                let bytes = self.read_exact_req(2)?;
                let flags = u16::from_le_bytes([bytes[0], bytes[1]]);
                if flags & FLAG_ENCRYPTED == 0 {
                    return Err(SZipError::NotEncrypted);
                }
                if flags & FLAG_STRONG_ENCRYPTION != 0 {
                    return Err(SZipError::StrongEncryptionUnsupported);
                }
                let deferred = flags & FLAG_DEFERRED_SIZES != 0;
                let out_flags = flags & !FLAG_ENCRYPTED;
                self.emit(&out_flags.to_le_bytes());
                self.state = State::Lfh(LfhState::AfterFlags { deferred });
            }
            LfhState::AfterFlags { deferred } => {
                let bytes = self.read_exact_req(2)?; // compression method
                self.emit(&bytes);
                self.state = State::Lfh(LfhState::AfterCompMethod { deferred });
            }
            LfhState::AfterCompMethod { deferred } => {
                let bytes = self.read_exact_req(2)?; // mod time
                self.emit(&bytes);
                self.state = State::Lfh(LfhState::AfterModTime { deferred });
            }
            LfhState::AfterModTime { deferred } => {
                let bytes = self.read_exact_req(2)?; // mod date
                self.emit(&bytes);
                self.state = State::Lfh(LfhState::AfterModDate { deferred });
            }
            LfhState::AfterModDate { deferred } => {
                if deferred {
                    // CRC/compressed/uncompressed size are zero placeholders; pass through.
                    let placeholders = self.read_exact_req(12)?;
                    self.emit(&placeholders);
                    self.state = State::Lfh(LfhState::AfterUncompSize {
                        deferred: true,
                        compressed_size: 0,
                        crc_low_byte: None,
                    });
                } else {
                    self.state = State::Lfh(LfhState::AfterCrc { deferred: false });
                }
            }
            LfhState::AfterCrc { deferred } => {
                let bytes = self.read_exact_req(4)?;
                self.emit(&bytes);
                self.state = State::Lfh(LfhState::AfterCompSize {
                    deferred,
                    crc_low_byte: bytes[0],
                });
            }
            LfhState::AfterCompSize { deferred, crc_low_byte } => {
                let bytes = self.read_exact_req(4)?;
                let compressed_size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let rewritten = compressed_size.wrapping_sub(ENCRYPTION_HEADER_LEN as u32);
                self.emit(&rewritten.to_le_bytes());
                self.state = State::Lfh(LfhState::AfterUncompSize {
                    deferred,
                    compressed_size,
                    crc_low_byte: Some(crc_low_byte),
                });
            }
            LfhState::AfterUncompSize {
                deferred,
                compressed_size,
                crc_low_byte,
            } => {
                if !deferred {
                    let bytes = self.read_exact_req(4)?; // uncompressed size
                    self.emit(&bytes);
                }
                let fn_bytes = self.read_exact_req(2)?;
                let fn_len = u16::from_le_bytes([fn_bytes[0], fn_bytes[1]]) as usize;
                self.emit(&fn_bytes);
                let extra_bytes = self.read_exact_req(2)?;
                let extra_len = u16::from_le_bytes([extra_bytes[0], extra_bytes[1]]) as usize;
                self.emit(&extra_bytes);
                self.state = State::Lfh(LfhState::SkipNameExtra {
                    deferred,
                    compressed_size,
                    crc_low_byte,
                    remaining: fn_len + extra_len,
                });
            }
            LfhState::SkipNameExtra {
                deferred,
                compressed_size,
                crc_low_byte,
                remaining,
            } => {
                if remaining > 0 {
                    let bytes = self.read_exact_req(remaining)?;
                    self.emit(&bytes);
                }
                // HEADER: reseed working keys, decrypt the 12-byte encryption header.
                let mut keys = self.password_keys;
                let raw_header = self.read_exact_req(ENCRYPTION_HEADER_LEN)?;
                let mut recovered_last = 0u8;
                for &b in &raw_header {
                    recovered_last = keys.decrypt_byte(b);
                }
                if self.strict {
                    if let Some(expected) = crc_low_byte {
                        if recovered_last != expected {
                            return Err(SZipError::PasswordCheckFailed);
                        }
                    }
                }
                if deferred {
                    self.state = State::PayloadUnknown {
                        keys,
                        window: VecDeque::new(),
                        scanner: SignatureScanner::new(&[Signature::DataDescriptor]),
                    };
                } else {
                    let remaining_payload =
                        (compressed_size as u64).saturating_sub(ENCRYPTION_HEADER_LEN as u64);
                    self.state = State::PayloadKnown {
                        keys,
                        remaining: remaining_payload,
                    };
                }
            }
        }
        Ok(())
    }

    fn step_payload_known(&mut self, mut keys: ZipCryptoKeys, remaining: u64) -> Result<()> {
        if remaining == 0 {
            self.state = State::ScanSignature;
            return Ok(());
        }
        let chunk_len = PAYLOAD_CHUNK.min(remaining as usize);
        let mut bytes = self.read_exact_req(chunk_len)?;
        for b in bytes.iter_mut() {
            *b = keys.decrypt_byte(*b);
        }
        self.emit(&bytes);
        self.state = State::PayloadKnown {
            keys,
            remaining: remaining - chunk_len as u64,
        };
        Ok(())
    }

    fn step_payload_unknown(
        &mut self,
        mut keys: ZipCryptoKeys,
        mut window: VecDeque<u8>,
        mut scanner: SignatureScanner,
    ) -> Result<()> {
        let raw = self.read_n(1)?.ok_or_else(|| {
            SZipError::MalformedArchive(
                "truncated input: deferred-size payload never reached its data descriptor".into(),
            )
        })?;
        window.push_back(raw[0]);
        let matched = scanner.push(raw[0]);
        if window.len() > 4 {
            let evicted = window.pop_front().expect("window non-empty");
            self.emit(&[keys.decrypt_byte(evicted)]);
        }
        if matched == Some(Signature::DataDescriptor) {
            self.state = State::DataDescriptor(DdState::AfterSignature);
            return Ok(());
        }
        self.state = State::PayloadUnknown { keys, window, scanner };
        Ok(())
    }

    fn step_data_descriptor(&mut self, dd: DdState) -> Result<()> {
        match dd {
            DdState::AfterSignature => {
                let bytes = self.read_exact_req(4)?; // CRC
                self.emit(&bytes);
                self.state = State::DataDescriptor(DdState::AfterCrc);
            }
            DdState::AfterCrc => {
                let bytes = self.read_exact_req(4)?; // compressed size
                let compressed_size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let rewritten = compressed_size.wrapping_sub(ENCRYPTION_HEADER_LEN as u32);
                self.emit(&rewritten.to_le_bytes());
                self.state = State::DataDescriptor(DdState::AfterCompSize);
            }
            DdState::AfterCompSize => {
                let bytes = self.read_exact_req(4)?; // uncompressed size
                self.emit(&bytes);
                self.state = State::ScanSignature;
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.advance().map_err(io::Error::from)?;
        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().expect("checked len");
        }
        Ok(n)
    }
}
