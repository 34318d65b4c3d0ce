//! Row-chunked byte buffer for the encrypter's deferred-size payload path
//!
//! Stores appended bytes in fixed 64 KiB rows instead of a single `Vec<u8>`
//! that grows via amortized doubling, so peak allocation for a buffered file
//! grows in bounded increments.

/// Row size in bytes, matching the "rows of 65,536 bytes" storage described
/// for the encrypter's deferred-size buffering path.
pub const ROW_SIZE: usize = 65_536;

#[derive(Debug, Default)]
pub struct ChunkedBuffer {
    rows: Vec<Vec<u8>>,
    len: usize,
}

impl ChunkedBuffer {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            len: 0,
        }
    }

    pub fn push(&mut self, byte: u8) {
        if self.rows.last().map(|r| r.len()).unwrap_or(ROW_SIZE) == ROW_SIZE {
            self.rows.push(Vec::with_capacity(ROW_SIZE));
        }
        self.rows.last_mut().expect("row just ensured").push(byte);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flatten into a single contiguous buffer, consuming `self`.
    pub fn into_vec(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for row in self.rows {
            out.extend(row);
        }
        out
    }
}
