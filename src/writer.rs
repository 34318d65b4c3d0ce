//! Streaming ZipCrypto encrypter
//!
//! [`EncryptingWriter`] is a push-based state machine: the caller feeds a
//! plain ZIP archive through [`std::io::Write`] in arbitrarily sized chunks,
//! and the machine rewrites each record on the fly, writing the encrypted
//! archive to the wrapped sink as soon as enough of a field has arrived to
//! decide what to do with it. Nothing is ever seeked, on the input or the
//! output side.

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::buffer::ChunkedBuffer;
use crate::encryption::{make_encryption_header, ZipCryptoKeys, ENCRYPTION_HEADER_LEN};
use crate::error::{Result, SZipError};
use crate::signature::{self, Signature, SignatureScanner};

const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DEFERRED_SIZES: u16 = 0x0008;
const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;

#[derive(Debug, Default, Clone)]
struct LfhFields {
    deferred: bool,
    crc: u32,
    csize: u32,
    usize_: u32,
    fn_len: u16,
    extra_len: u16,
    name_extra: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum LfhPhase {
    VersionNeeded,
    Flags,
    CompMethod,
    ModTime,
    ModDate,
    SizePlaceholders,
    Crc,
    CompSize,
    UncompSize,
    FnLen,
    ExtraLen,
    NameExtra { needed: usize },
}

#[derive(Debug, Default, Clone, Copy)]
struct CfhFields {
    fn_len: u16,
    extra_len: u16,
    comment_len: u16,
}

#[derive(Debug, Clone, Copy)]
enum CfhPhase {
    VersionMadeBy,
    VersionNeeded,
    Flags,
    CompMethod,
    ModTime,
    ModDate,
    Crc,
    CompSize,
    UncompSize,
    FnLen,
    ExtraLen,
    CommentLen,
    DiskInternalExternal,
    LocalHeaderOffset,
    NameExtraComment { needed: usize },
}

#[derive(Debug, Clone, Copy)]
enum EcdPhase {
    DiskNumber,
    DiskWithCd,
    EntriesOnDisk,
    TotalEntries,
    CdSize,
    CdOffset,
    CommentLen,
}

enum Phase {
    ScanSignature,
    Lfh(LfhPhase, LfhFields),
    PayloadKnown {
        keys: ZipCryptoKeys,
        remaining: u64,
    },
    DeferredBuffer {
        fields: LfhFields,
        buffer: ChunkedBuffer,
        window: VecDeque<u8>,
        scanner: SignatureScanner,
    },
    Cfh(CfhPhase, CfhFields),
    Ecd(EcdPhase),
    Tail,
}

/// Rewrites a plain ZIP archive, written through it in any chunking, into a
/// ZipCrypto-encrypted ZIP archive written to the wrapped sink.
///
/// Every local and central file header is rewritten in place (general-purpose
/// flag bit 0 set, bit 3 cleared, sizes grown by 12 bytes for the prepended
/// encryption header); central-directory offsets are patched to account for
/// the growth. Files whose sizes are only known from a trailing data
/// descriptor (bit 3 set on input) are buffered until that descriptor is
/// found, since their header fields cannot be rewritten until then and this
/// writer never seeks backward over output already written.
pub struct EncryptingWriter<W: Write> {
    sink: W,
    password_keys: ZipCryptoKeys,
    phase: Phase,
    scratch: Vec<u8>,
    bytes_written: u64,
    local_header_offsets: Vec<u32>,
    crc_and_size: Vec<(u32, u32, u32)>,
    central_directory_offset: Option<u32>,
    cfh_index: usize,
}

impl<W: Write> EncryptingWriter<W> {
    pub fn new(sink: W, password: &[u8]) -> Self {
        Self::from_password_keys(sink, ZipCryptoKeys::from_password(password))
    }

    pub fn from_password_keys(sink: W, password_keys: ZipCryptoKeys) -> Self {
        Self {
            sink,
            password_keys,
            phase: Phase::ScanSignature,
            scratch: Vec::new(),
            bytes_written: 0,
            local_header_offsets: Vec::new(),
            crc_and_size: Vec::new(),
            central_directory_offset: None,
            cfh_index: 0,
        }
    }

    /// Consumes the writer, returning the wrapped sink. Fails if the input
    /// stream stopped before a complete archive (an end-of-central-directory
    /// record) was seen.
    pub fn finish(self) -> Result<W> {
        match self.phase {
            Phase::Tail => Ok(self.sink),
            Phase::ScanSignature if self.bytes_written == 0 => Ok(self.sink),
            _ => Err(SZipError::MalformedArchive(
                "archive ended before its end-of-central-directory record".into(),
            )),
        }
    }

    fn write_through(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn accumulate(&mut self, byte: u8, needed: usize) -> Option<Vec<u8>> {
        self.scratch.push(byte);
        if self.scratch.len() >= needed {
            Some(std::mem::take(&mut self.scratch))
        } else {
            None
        }
    }

    fn begin_lfh(&mut self) -> Result<Phase> {
        let offset = self.bytes_written as u32;
        self.write_through(&Signature::LocalFileHeader.bytes())?;
        self.local_header_offsets.push(offset);
        Ok(Phase::Lfh(LfhPhase::VersionNeeded, LfhFields::default()))
    }

    fn begin_cfh(&mut self) -> Result<Phase> {
        if self.central_directory_offset.is_none() {
            self.central_directory_offset = Some(self.bytes_written as u32);
        }
        self.write_through(&Signature::CentralFileHeader.bytes())?;
        Ok(Phase::Cfh(CfhPhase::VersionMadeBy, CfhFields::default()))
    }

    fn begin_ecd(&mut self) -> Result<Phase> {
        self.write_through(&Signature::EndOfCentralDirectory.bytes())?;
        Ok(Phase::Ecd(EcdPhase::DiskNumber))
    }

    fn step_one_byte(&mut self, byte: u8) -> Result<()> {
        let phase = std::mem::replace(&mut self.phase, Phase::Tail);
        self.phase = match phase {
            Phase::ScanSignature => self.handle_scan_signature_byte(byte)?,
            Phase::Lfh(lphase, fields) => self.handle_lfh_byte(lphase, fields, byte)?,
            Phase::Cfh(cphase, fields) => self.handle_cfh_byte(cphase, fields, byte)?,
            Phase::Ecd(ephase) => self.handle_ecd_byte(ephase, byte)?,
            other => other,
        };
        Ok(())
    }

    fn handle_scan_signature_byte(&mut self, byte: u8) -> Result<Phase> {
        let Some(b) = self.accumulate(byte, 4) else {
            return Ok(Phase::ScanSignature);
        };
        let window = [b[0], b[1], b[2], b[3]];
        match signature::classify(window) {
            Some(Signature::LocalFileHeader) => self.begin_lfh(),
            Some(Signature::CentralFileHeader) => self.begin_cfh(),
            Some(Signature::EndOfCentralDirectory) => self.begin_ecd(),
            _ => Err(SZipError::MalformedArchive(format!(
                "unrecognized record signature {:02x?}",
                window
            ))),
        }
    }

    fn handle_lfh_byte(&mut self, phase: LfhPhase, mut fields: LfhFields, byte: u8) -> Result<Phase> {
        match phase {
            LfhPhase::VersionNeeded => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Lfh(LfhPhase::Flags, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::VersionNeeded, fields)),
            },
            LfhPhase::Flags => match self.accumulate(byte, 2) {
                Some(b) => {
                    let flags = u16::from_le_bytes([b[0], b[1]]);
                    if flags & FLAG_ENCRYPTED != 0 {
                        return Err(SZipError::AlreadyEncrypted);
                    }
                    if flags & FLAG_STRONG_ENCRYPTION != 0 {
                        return Err(SZipError::StrongEncryptionUnsupported);
                    }
                    fields.deferred = flags & FLAG_DEFERRED_SIZES != 0;
                    let out_flags = (flags & !FLAG_DEFERRED_SIZES) | FLAG_ENCRYPTED;
                    self.write_through(&out_flags.to_le_bytes())?;
                    Ok(Phase::Lfh(LfhPhase::CompMethod, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::Flags, fields)),
            },
            LfhPhase::CompMethod => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Lfh(LfhPhase::ModTime, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::CompMethod, fields)),
            },
            LfhPhase::ModTime => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Lfh(LfhPhase::ModDate, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::ModTime, fields)),
            },
            LfhPhase::ModDate => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    if fields.deferred {
                        Ok(Phase::Lfh(LfhPhase::SizePlaceholders, fields))
                    } else {
                        Ok(Phase::Lfh(LfhPhase::Crc, fields))
                    }
                }
                None => Ok(Phase::Lfh(LfhPhase::ModDate, fields)),
            },
            // Deferred files carry zeroed crc/csize/usize placeholders here;
            // the real values only become known from the trailing data
            // descriptor, so nothing from this point can be written yet.
            LfhPhase::SizePlaceholders => match self.accumulate(byte, 12) {
                Some(_) => Ok(Phase::Lfh(LfhPhase::FnLen, fields)),
                None => Ok(Phase::Lfh(LfhPhase::SizePlaceholders, fields)),
            },
            LfhPhase::Crc => match self.accumulate(byte, 4) {
                Some(b) => {
                    fields.crc = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                    self.write_through(&b)?;
                    Ok(Phase::Lfh(LfhPhase::CompSize, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::Crc, fields)),
            },
            LfhPhase::CompSize => match self.accumulate(byte, 4) {
                Some(b) => {
                    let original = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                    fields.csize = original;
                    let rewritten = original.wrapping_add(ENCRYPTION_HEADER_LEN as u32);
                    self.write_through(&rewritten.to_le_bytes())?;
                    Ok(Phase::Lfh(LfhPhase::UncompSize, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::CompSize, fields)),
            },
            LfhPhase::UncompSize => match self.accumulate(byte, 4) {
                Some(b) => {
                    fields.usize_ = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                    self.write_through(&b)?;
                    let rewritten_csize = fields.csize.wrapping_add(ENCRYPTION_HEADER_LEN as u32);
                    self.crc_and_size.push((fields.crc, rewritten_csize, fields.usize_));
                    Ok(Phase::Lfh(LfhPhase::FnLen, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::UncompSize, fields)),
            },
            LfhPhase::FnLen => match self.accumulate(byte, 2) {
                Some(b) => {
                    let fn_len = u16::from_le_bytes([b[0], b[1]]);
                    if fn_len == 0 {
                        return Err(SZipError::MalformedArchive("zero-length file name".into()));
                    }
                    fields.fn_len = fn_len;
                    if !fields.deferred {
                        self.write_through(&b)?;
                    }
                    Ok(Phase::Lfh(LfhPhase::ExtraLen, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::FnLen, fields)),
            },
            LfhPhase::ExtraLen => match self.accumulate(byte, 2) {
                Some(b) => {
                    fields.extra_len = u16::from_le_bytes([b[0], b[1]]);
                    if !fields.deferred {
                        self.write_through(&b)?;
                    }
                    let needed = fields.fn_len as usize + fields.extra_len as usize;
                    Ok(Phase::Lfh(LfhPhase::NameExtra { needed }, fields))
                }
                None => Ok(Phase::Lfh(LfhPhase::ExtraLen, fields)),
            },
            LfhPhase::NameExtra { needed } => match self.accumulate(byte, needed.max(1)) {
                Some(b) => {
                    if fields.deferred {
                        fields.name_extra = b;
                        Ok(Phase::DeferredBuffer {
                            fields,
                            buffer: ChunkedBuffer::new(),
                            window: VecDeque::new(),
                            scanner: SignatureScanner::new(&[
                                Signature::LocalFileHeader,
                                Signature::CentralFileHeader,
                            ]),
                        })
                    } else {
                        self.write_through(&b)?;
                        self.begin_payload(fields)
                    }
                }
                None => Ok(Phase::Lfh(LfhPhase::NameExtra { needed }, fields)),
            },
        }
    }

    fn begin_payload(&mut self, fields: LfhFields) -> Result<Phase> {
        let mut keys = self.password_keys;
        let mut header = [0u8; ENCRYPTION_HEADER_LEN];
        make_encryption_header(&mut keys, fields.crc, &mut header)?;
        self.write_through(&header)?;
        Ok(Phase::PayloadKnown {
            keys,
            remaining: fields.csize as u64,
        })
    }

    fn consume_payload_known(&mut self, rest: &mut &[u8]) -> Result<()> {
        let (mut keys, remaining) = match std::mem::replace(&mut self.phase, Phase::Tail) {
            Phase::PayloadKnown { keys, remaining } => (keys, remaining),
            other => {
                self.phase = other;
                return Ok(());
            }
        };

        let take = (rest.len() as u64).min(remaining) as usize;
        let mut chunk = rest[..take].to_vec();
        for b in chunk.iter_mut() {
            *b = keys.encrypt_byte(*b);
        }
        self.write_through(&chunk)?;
        *rest = &rest[take..];

        let remaining_after = remaining - take as u64;
        self.phase = if remaining_after == 0 {
            Phase::ScanSignature
        } else {
            Phase::PayloadKnown {
                keys,
                remaining: remaining_after,
            }
        };
        Ok(())
    }

    fn consume_deferred_buffer_byte(&mut self, byte: u8) -> Result<()> {
        let (fields, mut buffer, mut window, mut scanner) =
            match std::mem::replace(&mut self.phase, Phase::Tail) {
                Phase::DeferredBuffer { fields, buffer, window, scanner } => {
                    (fields, buffer, window, scanner)
                }
                other => {
                    self.phase = other;
                    return Ok(());
                }
            };

        window.push_back(byte);
        let matched = scanner.push(byte);
        if window.len() > 4 {
            let evicted = window.pop_front().expect("window over capacity has an element");
            buffer.push(evicted);
        }

        if let Some(sig @ (Signature::LocalFileHeader | Signature::CentralFileHeader)) = matched {
            self.phase = self.resolve_deferred_boundary(fields, buffer, sig)?;
            return Ok(());
        }

        self.phase = Phase::DeferredBuffer { fields, buffer, window, scanner };
        Ok(())
    }

    fn resolve_deferred_boundary(
        &mut self,
        fields: LfhFields,
        buffer: ChunkedBuffer,
        matched: Signature,
    ) -> Result<Phase> {
        let data = buffer.into_vec();
        if data.len() < 12 {
            return Err(SZipError::MalformedArchive(
                "deferred-size entry ended before its data descriptor".into(),
            ));
        }
        let split = data.len() - 12;
        let (payload, dd) = data.split_at(split);

        // The 12-byte crc/csize/usize trailer is conventionally introduced by
        // an optional 4-byte data-descriptor signature (spec.md §3's DD,
        // "introduces it"). When present it sits just before the trailer, not
        // inside the file's real payload, so exclude it here the same way
        // `DecryptingReader::step_payload_unknown` recognizes it explicitly
        // rather than decrypting/re-encrypting it as content.
        let dd_sig = Signature::DataDescriptor.bytes();
        let payload = if payload.len() >= 4 && &payload[payload.len() - 4..] == &dd_sig[..] {
            &payload[..payload.len() - 4]
        } else {
            payload
        };

        let crc = u32::from_le_bytes([dd[0], dd[1], dd[2], dd[3]]);
        let csize_original = u32::from_le_bytes([dd[4], dd[5], dd[6], dd[7]]);
        let usize_ = u32::from_le_bytes([dd[8], dd[9], dd[10], dd[11]]);
        let new_csize = csize_original.wrapping_add(ENCRYPTION_HEADER_LEN as u32);

        self.write_through(&crc.to_le_bytes())?;
        self.write_through(&new_csize.to_le_bytes())?;
        self.write_through(&usize_.to_le_bytes())?;
        self.write_through(&fields.fn_len.to_le_bytes())?;
        self.write_through(&fields.extra_len.to_le_bytes())?;
        self.write_through(&fields.name_extra)?;

        let mut keys = self.password_keys;
        let mut header = [0u8; ENCRYPTION_HEADER_LEN];
        make_encryption_header(&mut keys, crc, &mut header)?;
        self.write_through(&header)?;

        let mut encrypted_payload = payload.to_vec();
        for b in encrypted_payload.iter_mut() {
            *b = keys.encrypt_byte(*b);
        }
        self.write_through(&encrypted_payload)?;

        self.crc_and_size.push((crc, new_csize, usize_));

        match matched {
            Signature::LocalFileHeader => self.begin_lfh(),
            Signature::CentralFileHeader => self.begin_cfh(),
            _ => unreachable!("deferred-buffer scanner only watches LFH and CFH signatures"),
        }
    }

    fn handle_cfh_byte(&mut self, phase: CfhPhase, mut fields: CfhFields, byte: u8) -> Result<Phase> {
        match phase {
            CfhPhase::VersionMadeBy => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::VersionNeeded, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::VersionMadeBy, fields)),
            },
            CfhPhase::VersionNeeded => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::Flags, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::VersionNeeded, fields)),
            },
            CfhPhase::Flags => match self.accumulate(byte, 2) {
                Some(b) => {
                    let flags = u16::from_le_bytes([b[0], b[1]]);
                    let out_flags = (flags & !FLAG_DEFERRED_SIZES) | FLAG_ENCRYPTED;
                    self.write_through(&out_flags.to_le_bytes())?;
                    Ok(Phase::Cfh(CfhPhase::CompMethod, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::Flags, fields)),
            },
            CfhPhase::CompMethod => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::ModTime, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::CompMethod, fields)),
            },
            CfhPhase::ModTime => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::ModDate, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::ModTime, fields)),
            },
            CfhPhase::ModDate => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::Crc, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::ModDate, fields)),
            },
            CfhPhase::Crc => match self.accumulate(byte, 4) {
                Some(_) => {
                    let (crc, _, _) = self.crc_and_size_entry()?;
                    self.write_through(&crc.to_le_bytes())?;
                    Ok(Phase::Cfh(CfhPhase::CompSize, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::Crc, fields)),
            },
            CfhPhase::CompSize => match self.accumulate(byte, 4) {
                Some(_) => {
                    let (_, csize, _) = self.crc_and_size_entry()?;
                    self.write_through(&csize.to_le_bytes())?;
                    Ok(Phase::Cfh(CfhPhase::UncompSize, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::CompSize, fields)),
            },
            CfhPhase::UncompSize => match self.accumulate(byte, 4) {
                Some(_) => {
                    let (_, _, usize_) = self.crc_and_size_entry()?;
                    self.write_through(&usize_.to_le_bytes())?;
                    Ok(Phase::Cfh(CfhPhase::FnLen, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::UncompSize, fields)),
            },
            CfhPhase::FnLen => match self.accumulate(byte, 2) {
                Some(b) => {
                    fields.fn_len = u16::from_le_bytes([b[0], b[1]]);
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::ExtraLen, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::FnLen, fields)),
            },
            CfhPhase::ExtraLen => match self.accumulate(byte, 2) {
                Some(b) => {
                    fields.extra_len = u16::from_le_bytes([b[0], b[1]]);
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::CommentLen, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::ExtraLen, fields)),
            },
            CfhPhase::CommentLen => match self.accumulate(byte, 2) {
                Some(b) => {
                    fields.comment_len = u16::from_le_bytes([b[0], b[1]]);
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::DiskInternalExternal, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::CommentLen, fields)),
            },
            CfhPhase::DiskInternalExternal => match self.accumulate(byte, 8) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Cfh(CfhPhase::LocalHeaderOffset, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::DiskInternalExternal, fields)),
            },
            CfhPhase::LocalHeaderOffset => match self.accumulate(byte, 4) {
                Some(_) => {
                    let offset = *self
                        .local_header_offsets
                        .get(self.cfh_index)
                        .ok_or_else(|| {
                            SZipError::MalformedArchive(
                                "more central directory records than local file headers".into(),
                            )
                        })?;
                    self.write_through(&offset.to_le_bytes())?;
                    let needed =
                        fields.fn_len as usize + fields.extra_len as usize + fields.comment_len as usize;
                    Ok(Phase::Cfh(CfhPhase::NameExtraComment { needed }, fields))
                }
                None => Ok(Phase::Cfh(CfhPhase::LocalHeaderOffset, fields)),
            },
            CfhPhase::NameExtraComment { needed } => match self.accumulate(byte, needed.max(1)) {
                Some(b) => {
                    self.write_through(&b)?;
                    self.cfh_index += 1;
                    Ok(Phase::ScanSignature)
                }
                None => Ok(Phase::Cfh(CfhPhase::NameExtraComment { needed }, fields)),
            },
        }
    }

    fn crc_and_size_entry(&self) -> Result<(u32, u32, u32)> {
        self.crc_and_size.get(self.cfh_index).copied().ok_or_else(|| {
            SZipError::MalformedArchive("more central directory records than local file headers".into())
        })
    }

    fn handle_ecd_byte(&mut self, phase: EcdPhase, byte: u8) -> Result<Phase> {
        match phase {
            EcdPhase::DiskNumber => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Ecd(EcdPhase::DiskWithCd))
                }
                None => Ok(Phase::Ecd(EcdPhase::DiskNumber)),
            },
            EcdPhase::DiskWithCd => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Ecd(EcdPhase::EntriesOnDisk))
                }
                None => Ok(Phase::Ecd(EcdPhase::DiskWithCd)),
            },
            EcdPhase::EntriesOnDisk => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Ecd(EcdPhase::TotalEntries))
                }
                None => Ok(Phase::Ecd(EcdPhase::EntriesOnDisk)),
            },
            EcdPhase::TotalEntries => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Ecd(EcdPhase::CdSize))
                }
                None => Ok(Phase::Ecd(EcdPhase::TotalEntries)),
            },
            EcdPhase::CdSize => match self.accumulate(byte, 4) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Ecd(EcdPhase::CdOffset))
                }
                None => Ok(Phase::Ecd(EcdPhase::CdSize)),
            },
            EcdPhase::CdOffset => match self.accumulate(byte, 4) {
                Some(_) => {
                    let offset = self.central_directory_offset.unwrap_or(0);
                    self.write_through(&offset.to_le_bytes())?;
                    Ok(Phase::Ecd(EcdPhase::CommentLen))
                }
                None => Ok(Phase::Ecd(EcdPhase::CdOffset)),
            },
            EcdPhase::CommentLen => match self.accumulate(byte, 2) {
                Some(b) => {
                    self.write_through(&b)?;
                    Ok(Phase::Tail)
                }
                None => Ok(Phase::Ecd(EcdPhase::CommentLen)),
            },
        }
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let total = buf.len();
        let mut rest = buf;
        while !rest.is_empty() {
            match self.phase {
                Phase::PayloadKnown { .. } => {
                    self.consume_payload_known(&mut rest).map_err(io::Error::from)?;
                }
                Phase::Tail => {
                    self.sink.write_all(rest)?;
                    self.bytes_written += rest.len() as u64;
                    rest = &[];
                }
                Phase::DeferredBuffer { .. } => {
                    self.consume_deferred_buffer_byte(rest[0]).map_err(io::Error::from)?;
                    rest = &rest[1..];
                }
                _ => {
                    self.step_one_byte(rest[0]).map_err(io::Error::from)?;
                    rest = &rest[1..];
                }
            }
        }
        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W: Write> Drop for EncryptingWriter<W> {
    fn drop(&mut self) {
        let _ = self.sink.flush();
    }
}
