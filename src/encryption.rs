//! ZipCrypto ("traditional") stream cipher support for ZIP files
//!
//! Implements the classical PKWARE stream cipher described in APPNOTE.TXT
//! section 6.1: a three-word key state, updated one plaintext byte at a time,
//! that derives a single keystream byte from the high word of the last key.
//!
//! ## Security notes
//! - ZipCrypto is cryptographically weak (known-plaintext attacks recover the
//!   key from as little as 12 bytes of known output) and is implemented here
//!   only for interoperability with existing ZipCrypto-protected archives.
//! - The 12-byte encryption header prepended to every payload carries 10
//!   bytes of random filler plus a 2-byte password-verification value.

use crate::error::Result;

const KEY0_INIT: u32 = 0x1234_5678;
const KEY1_INIT: u32 = 0x2345_6789;
const KEY2_INIT: u32 = 0x3456_7890;

/// Length in bytes of the encryption header prepended to every ZipCrypto payload
pub const ENCRYPTION_HEADER_LEN: usize = 12;

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_crc_table();

fn crc32_step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// The three-word ZipCrypto key state.
///
/// `update` must be fed the *plaintext* byte on both encryption and
/// decryption — on decryption that means the recovered plaintext, not the
/// ciphertext that was just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipCryptoKeys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl ZipCryptoKeys {
    /// Keys in their un-keyed initial state, before any password bytes are fed in.
    pub fn initial() -> Self {
        Self {
            k0: KEY0_INIT,
            k1: KEY1_INIT,
            k2: KEY2_INIT,
        }
    }

    /// Derive working keys from a password (low 8 bits of each byte participate).
    pub fn from_password(password: &[u8]) -> Self {
        let mut keys = Self::initial();
        for &b in password {
            keys.update(b);
        }
        keys
    }

    /// Derive keys from a password buffer, then zero the buffer so the caller's
    /// copy no longer holds the cleartext password.
    pub fn from_password_zeroizing(password: &mut [u8]) -> Self {
        let keys = Self::from_password(password);
        for b in password.iter_mut() {
            *b = 0;
        }
        keys
    }

    /// Advance the key state by one plaintext byte.
    pub fn update(&mut self, plain_byte: u8) {
        self.k0 = crc32_step(self.k0, plain_byte);
        self.k1 = self.k1.wrapping_add(self.k0 & 0xFF);
        self.k1 = self.k1.wrapping_mul(134_775_813).wrapping_add(1);
        self.k2 = crc32_step(self.k2, ((self.k1 >> 24) & 0xFF) as u8);
    }

    /// Current keystream byte, derived from `k2`.
    pub fn keystream_byte(&self) -> u8 {
        let t = (self.k2 | 2) & 0xFFFF;
        ((t.wrapping_mul(t ^ 1)) >> 8) as u8
    }

    /// Encrypt one plaintext byte, advancing the key state with the plaintext.
    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.keystream_byte();
        self.update(plain);
        cipher
    }

    /// Decrypt one ciphertext byte, advancing the key state with the recovered plaintext.
    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.keystream_byte();
        self.update(plain);
        plain
    }
}

/// Fill `header` (exactly [`ENCRYPTION_HEADER_LEN`] bytes) with a fresh
/// ZipCrypto encryption header for a file whose CRC-32 is `crc`, and encrypt
/// it in place under `keys`. The caller writes the resulting bytes as-is;
/// `keys` ends up advanced by 12 plaintext-equivalent updates, ready for the
/// payload bytes that follow.
pub fn make_encryption_header(keys: &mut ZipCryptoKeys, crc: u32, header: &mut [u8; 12]) -> Result<()> {
    crate::random::fill_random(&mut header[..10])?;
    header[10] = ((crc >> 16) & 0xFF) as u8;
    header[11] = ((crc >> 24) & 0xFF) as u8;
    for b in header.iter_mut() {
        *b = keys.encrypt_byte(*b);
    }
    Ok(())
}
