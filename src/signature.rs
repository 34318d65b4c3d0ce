//! ZIP record-boundary recognition
//!
//! The four 4-byte little-endian magic numbers that mark the start of every
//! record type this crate understands, plus helpers for matching them in a
//! streaming, never-seek context.

/// A recognized ZIP record boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    LocalFileHeader,
    CentralFileHeader,
    EndOfCentralDirectory,
    DataDescriptor,
}

impl Signature {
    /// The raw little-endian bytes for this signature.
    pub const fn bytes(self) -> [u8; 4] {
        match self {
            Signature::LocalFileHeader => [0x50, 0x4B, 0x03, 0x04],
            Signature::CentralFileHeader => [0x50, 0x4B, 0x01, 0x02],
            Signature::EndOfCentralDirectory => [0x50, 0x4B, 0x05, 0x06],
            Signature::DataDescriptor => [0x50, 0x4B, 0x07, 0x08],
        }
    }

    const ALL: [Signature; 4] = [
        Signature::LocalFileHeader,
        Signature::CentralFileHeader,
        Signature::EndOfCentralDirectory,
        Signature::DataDescriptor,
    ];
}

/// Classify an exact 4-byte window against the known signature set. Never
/// accepts a partial/prefix match — the window must equal a full signature.
pub fn classify(window: [u8; 4]) -> Option<Signature> {
    Signature::ALL.iter().copied().find(|s| s.bytes() == window)
}

/// Incrementally scans a byte stream for the next occurrence of any signature
/// in a caller-supplied candidate set, without ever looking behind the
/// current byte. Used by the encrypter's deferred-size path to find the next
/// record boundary (the next LFH or CFH) while buffering an unknown-length
/// payload.
#[derive(Debug)]
pub struct SignatureScanner {
    candidates: Vec<Signature>,
    window: [u8; 4],
    filled: usize,
}

impl SignatureScanner {
    pub fn new(candidates: &[Signature]) -> Self {
        Self {
            candidates: candidates.to_vec(),
            window: [0; 4],
            filled: 0,
        }
    }

    /// Feed one more byte. Returns `Some(signature)` the instant the trailing
    /// 4 bytes (including this one) equal one of the candidates.
    pub fn push(&mut self, byte: u8) -> Option<Signature> {
        self.window.copy_within(1..4, 0);
        self.window[3] = byte;
        self.filled = (self.filled + 1).min(4);

        if self.filled < 4 {
            return None;
        }

        self.candidates
            .iter()
            .copied()
            .find(|s| s.bytes() == self.window)
    }
}
