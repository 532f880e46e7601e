//! The two variable-length integer encodings found on a node's disk.
//!
//! [`CompactSize`] is the prefix-tagged encoding used inside block and
//! transaction bytes. [`ContinuationVarint`] is the base-128 encoding used by
//! the block index database. They are not interchangeable: the same bytes
//! decode to different values under each scheme.

use std::io::{Read, Seek};

use snafu::prelude::*;

use crate::cursor::Cursor;
use crate::error::{Result, VarintOverflow};

pub struct CompactSize;

impl CompactSize {
    pub fn decode<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<u64> {
        cursor.restore_on_error(|cursor, _| {
            let prefix = cursor.read_u8()?;
            Ok(match prefix {
                0xff => cursor.read_u64()?,
                0xfe => cursor.read_u32()? as u64,
                0xfd => cursor.read_u16()? as u64,
                _ => prefix as u64,
            })
        })
    }

    /// Appends the shortest encoding of `value`.
    pub fn encode(value: u64, out: &mut Vec<u8>) {
        match value {
            0..=0xfc => out.push(value as u8),
            0xfd..=0xffff => {
                out.push(0xfd);
                out.extend_from_slice(&(value as u16).to_le_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                out.push(0xfe);
                out.extend_from_slice(&(value as u32).to_le_bytes());
            }
            _ => {
                out.push(0xff);
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    pub fn encoded_len(value: u64) -> usize {
        match value {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }
}

/// Base-128 big-endian varint where every continuation byte also adds one,
/// which makes each value's encoding unique.
pub struct ContinuationVarint;

impl ContinuationVarint {
    pub fn decode<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<u64> {
        cursor.restore_on_error(|cursor, position| {
            let mut n: u64 = 0;
            loop {
                let byte = cursor.read_u8()?;
                ensure!(n <= u64::MAX >> 7, VarintOverflow { position });
                n = (n << 7) | (byte & 0x7f) as u64;
                if byte & 0x80 == 0 {
                    return Ok(n);
                }
                n = n.checked_add(1).context(VarintOverflow { position })?;
            }
        })
    }

    pub fn encode(mut value: u64, out: &mut Vec<u8>) {
        let mut tmp = [0u8; 10];
        let mut len = 0;
        loop {
            tmp[len] = (value & 0x7f) as u8 | if len > 0 { 0x80 } else { 0x00 };
            if value <= 0x7f {
                break;
            }
            value = (value >> 7) - 1;
            len += 1;
        }
        out.extend(tmp[..=len].iter().rev());
    }
}
