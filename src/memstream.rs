//! Random-access view over a decrypted in-memory buffer.

use std::path::Path;

use crate::crypto;
use crate::error::{PlayerError, Result};

/// Origin for a relative seek, mirroring `std::io::SeekFrom` without pulling in
/// the file-backed semantics that type implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Begin,
    Current,
    End,
}

/// A password-decrypted byte buffer with a read cursor. The buffer is zeroed on
/// drop so plaintext media data does not linger in process memory.
pub struct MemStream {
    buffer: Vec<u8>,
    pos: usize,
    last_read_count: usize,
    valid: bool,
}

impl MemStream {
    /// Reads `path`, derives the key from `password`, decrypts, and zeroes
    /// `password` in place regardless of outcome. A missing/unreadable file or a
    /// decrypt that yields nothing produces an invalid (but constructible)
    /// stream rather than an error, matching the source's `valid_` flag.
    pub fn open(path: &Path, password: &mut Vec<u8>) -> Result<Self> {
        let encrypted = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                crypto::secure_clear(password);
                if e.kind() == std::io::ErrorKind::NotFound {
                    return Err(PlayerError::FileNotFound(path.to_path_buf()));
                }
                return Err(PlayerError::Io(e));
            }
        };

        let key = crypto::sha256(password);
        crypto::secure_clear(password);

        let decrypted = crypto::decrypt(&encrypted, &key);
        match decrypted {
            Some(buffer) if !buffer.is_empty() => Ok(Self {
                buffer,
                pos: 0,
                last_read_count: 0,
                valid: true,
            }),
            _ => Ok(Self {
                buffer: Vec::new(),
                pos: 0,
                last_read_count: 0,
                valid: false,
            }),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn gcount(&self) -> usize {
        self.last_read_count
    }

    /// Absolute seek. Fails (leaving `pos` unchanged) if `pos > size()`.
    pub fn seek_abs(&mut self, pos: usize) -> bool {
        if pos > self.buffer.len() {
            return false;
        }
        self.pos = pos;
        true
    }

    /// Relative seek. Fails (leaving `pos` unchanged) if the resulting position
    /// would be negative or past the end of the buffer.
    pub fn seek_rel(&mut self, offset: i64, from: SeekFrom) -> bool {
        let base: i64 = match from {
            SeekFrom::Begin => 0,
            SeekFrom::Current => self.pos as i64,
            SeekFrom::End => self.buffer.len() as i64,
        };
        let new_pos = base + offset;
        if new_pos < 0 || new_pos as usize > self.buffer.len() {
            return false;
        }
        self.pos = new_pos as usize;
        true
    }

    /// Advances the cursor by `n` bytes, clamped to `size()`.
    pub fn ignore(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buffer.len());
    }

    /// Reads exactly `dst.len()` bytes at the current cursor. On failure,
    /// `pos` and `dst` are left untouched and `gcount()` reports 0.
    pub fn read(&mut self, dst: &mut [u8]) -> bool {
        let n = dst.len();
        if self.pos + n > self.buffer.len() {
            self.last_read_count = 0;
            return false;
        }
        dst.copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        self.last_read_count = n;
        true
    }

    /// Reads `n` bytes at the current cursor into a freshly allocated vector.
    pub fn read_vec(&mut self, n: usize) -> Option<Vec<u8>> {
        let mut out = vec![0u8; n];
        if self.read(&mut out) {
            Some(out)
        } else {
            None
        }
    }

    /// Reads exactly `dst.len()` bytes starting at `offset`, without disturbing
    /// the stream's own cursor. Used by the sample readers, which seek+read
    /// under a lock shared across worker threads.
    pub fn read_at(&mut self, offset: usize, dst: &mut [u8]) -> bool {
        let saved = self.pos;
        if !self.seek_abs(offset) {
            return false;
        }
        let ok = self.read(dst);
        if !ok {
            self.pos = saved;
        }
        ok
    }
}

#[cfg(test)]
impl MemStream {
    /// Builds a valid stream directly over plaintext bytes, skipping the
    /// encrypt/decrypt round trip. Used by parser tests that construct
    /// synthetic MP4 fixtures in memory.
    pub fn from_plaintext_for_tests(buffer: Vec<u8>) -> Self {
        Self {
            buffer,
            pos: 0,
            last_read_count: 0,
            valid: true,
        }
    }
}

impl Drop for MemStream {
    fn drop(&mut self) {
        crypto::secure_clear(&mut self.buffer);
    }
}
