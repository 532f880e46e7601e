//! A positionable byte reader used by every decoder in this crate.
//!
//! The cursor wraps anything that is `Read + Seek` (an open block file, or an
//! in-memory buffer) and is passed by `&mut` through each nested decode step.
//! Reads never return short data: a read that runs past the end of the stream
//! fails with [`DecodeError::Truncated`] and leaves the position where it was
//! before the read started.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use snafu::prelude::*;

use crate::error::{Io, LengthTooLarge, Result, Truncated};

/// Upper bound on the up-front allocation for a length-prefixed read, so that a
/// corrupt length cannot make us reserve gigabytes before the data runs out.
const MAX_PREALLOC: usize = 64 * 1024;

#[derive(Debug)]
pub struct Cursor<R> {
    inner: R,
}

impl<'a> Cursor<io::Cursor<&'a [u8]>> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Cursor::new(io::Cursor::new(bytes))
    }
}

impl Cursor<io::Cursor<Vec<u8>>> {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Cursor::new(io::Cursor::new(bytes))
    }
}

impl<R: Read + Seek> Cursor<R> {
    pub fn new(inner: R) -> Self {
        Cursor { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Absolute position from the start of the underlying stream.
    pub fn position(&mut self) -> Result<u64> {
        self.inner.stream_position().context(Io)
    }

    pub fn seek_to(&mut self, position: u64) -> Result<u64> {
        self.inner.seek(SeekFrom::Start(position)).context(Io)
    }

    pub fn seek_relative(&mut self, offset: i64) -> Result<u64> {
        self.inner.seek(SeekFrom::Current(offset)).context(Io)
    }

    /// Total length of the underlying stream. The position is left unchanged.
    pub fn stream_len(&mut self) -> Result<u64> {
        let position = self.position()?;
        let len = self.inner.seek(SeekFrom::End(0)).context(Io)?;
        self.seek_to(position)?;
        Ok(len)
    }

    /// Runs `decode` and, if it fails, puts the cursor back where it was when
    /// `decode` started. The closure receives that start position.
    pub fn restore_on_error<T>(
        &mut self,
        decode: impl FnOnce(&mut Self, u64) -> Result<T>,
    ) -> Result<T> {
        let start = self.position()?;
        decode(self, start).inspect_err(|_| {
            if let Err(restore_err) = self.seek_to(start) {
                tracing::warn!(start, error = %restore_err, "Failed to restore cursor position");
            }
        })
    }

    fn fixed<T>(&mut self, width: u64, read: impl FnOnce(&mut R) -> io::Result<T>) -> Result<T> {
        let position = self.position()?;
        match read(&mut self.inner) {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.seek_to(position)?;
                Truncated {
                    needed: width,
                    position,
                }
                .fail()
            }
            Err(e) => {
                self.seek_to(position)?;
                Err(e).context(Io)
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.fixed(1, |r| r.read_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.fixed(2, |r| r.read_u16::<LittleEndian>())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.fixed(2, |r| r.read_i16::<LittleEndian>())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.fixed(4, |r| r.read_u32::<LittleEndian>())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.fixed(4, |r| r.read_i32::<LittleEndian>())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.fixed(8, |r| r.read_u64::<LittleEndian>())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.fixed(8, |r| r.read_i64::<LittleEndian>())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.fixed(N as u64, |r| {
            let mut buf = [0u8; N];
            r.read_exact(&mut buf)?;
            Ok(buf)
        })
    }

    /// Reads exactly `len` opaque bytes.
    pub fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        let position = self.position()?;
        let capacity = usize::try_from(len)
            .ok()
            .context(LengthTooLarge {
                length: len,
                position,
            })?
            .min(MAX_PREALLOC);

        let mut buf = Vec::with_capacity(capacity);
        if let Err(e) = (&mut self.inner).take(len).read_to_end(&mut buf) {
            self.seek_to(position)?;
            return Err(e).context(Io);
        }

        if (buf.len() as u64) < len {
            self.seek_to(position)?;
            return Truncated {
                needed: len,
                position,
            }
            .fail();
        }
        Ok(buf)
    }

    /// Returns the next `n` bytes without consuming them.
    pub fn peek(&mut self, n: usize) -> Result<Vec<u8>> {
        let position = self.position()?;
        let bytes = self.read_bytes(n as u64)?;
        self.seek_to(position)?;
        Ok(bytes)
    }
}
