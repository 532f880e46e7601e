use std::fmt;
use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::cursor::Cursor;
use crate::error::Result;
use crate::hash::{double_sha256, Hash256};

pub const HEADER_SIZE: usize = 80;

/*
Block Header (80 bytes)
Field Name          Bytes   Byte Range
Version             4       0-3
Previous Block      32      4-35
Merkle Root         32      36-67
Timestamp           4       68-71
Bits                4       72-75
Nonce               4       76-79
*/
#[derive(Clone)]
pub struct BlockHeader {
    version: i32,
    prev_hash: Hash256,
    merkle_root: Hash256,
    time: u32,
    bits: u32,
    nonce: u32,
    // computed on first request, never changes afterwards
    hash: OnceCell<Hash256>,
}

impl BlockHeader {
    pub fn new(
        version: i32,
        prev_hash: Hash256,
        merkle_root: Hash256,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        BlockHeader {
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
            hash: OnceCell::new(),
        }
    }

    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut prev_hash = [0u8; 32];
        prev_hash.copy_from_slice(&raw[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&raw[36..68]);

        BlockHeader::new(
            LittleEndian::read_i32(&raw[0..4]),
            Hash256(prev_hash),
            Hash256(merkle_root),
            LittleEndian::read_u32(&raw[68..72]),
            LittleEndian::read_u32(&raw[72..76]),
            LittleEndian::read_u32(&raw[76..80]),
        )
    }

    /// Reads the 80 header bytes in one go, so a short read consumes nothing.
    pub fn decode<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Self> {
        let raw = cursor.read_array::<HEADER_SIZE>()?;
        Ok(BlockHeader::from_bytes(&raw))
    }

    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        LittleEndian::write_i32(&mut raw[0..4], self.version);
        raw[4..36].copy_from_slice(self.prev_hash.as_bytes());
        raw[36..68].copy_from_slice(self.merkle_root.as_bytes());
        LittleEndian::write_u32(&mut raw[68..72], self.time);
        LittleEndian::write_u32(&mut raw[72..76], self.bits);
        LittleEndian::write_u32(&mut raw[76..80], self.nonce);
        raw
    }

    /// Block hash in internal byte order; use `to_string()` for display order.
    pub fn hash(&self) -> Hash256 {
        *self.hash.get_or_init(|| double_sha256(&self.serialize()))
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn prev_hash(&self) -> Hash256 {
        self.prev_hash
    }

    pub fn merkle_root(&self) -> Hash256 {
        self.merkle_root
    }

    /// Raw on-disk timestamp, seconds since the Unix epoch.
    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.time as i64, 0).unwrap_or_default()
    }

    /// Compact difficulty target, kept opaque.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.serialize() == other.serialize()
    }
}

impl Eq for BlockHeader {}

impl fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHeader")
            .field("hash", &self.hash())
            .field("version", &self.version)
            .field("prev_hash", &self.prev_hash)
            .field("merkle_root", &self.merkle_root)
            .field("timestamp", &self.timestamp())
            .field("bits", &format_args!("{:08x}", self.bits))
            .field("nonce", &self.nonce)
            .finish()
    }
}

impl Serialize for BlockHeader {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("BlockHeader", 7)?;
        state.serialize_field("hash", &self.hash())?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("prev_hash", &self.prev_hash)?;
        state.serialize_field("merkle_root", &self.merkle_root)?;
        state.serialize_field("timestamp", &self.timestamp())?;
        state.serialize_field("bits", &format!("{:08x}", self.bits))?;
        state.serialize_field("nonce", &self.nonce)?;
        state.end()
    }
}
