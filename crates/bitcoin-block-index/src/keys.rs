//! Keys of the `blocks/index` database: one prefix byte followed by a payload.

use bitcoin_blockfile::{CompactSize, Hash256};

pub const BLOCK_INDEX: u8 = b'b';
pub const FILE_INFO: u8 = b'f';
pub const TX_INDEX: u8 = b't';
pub const LAST_BLOCK_FILE: u8 = b'l';
pub const REINDEXING: u8 = b'R';
pub const FLAG: u8 = b'F';

fn prefixed(prefix: u8, payload: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + payload.len());
    key.push(prefix);
    key.extend_from_slice(payload);
    key
}

/// `b` + block hash in internal byte order.
pub fn block_index(hash: &Hash256) -> Vec<u8> {
    prefixed(BLOCK_INDEX, hash.as_bytes())
}

/// `f` + file number, little-endian.
pub fn file_info(file: u32) -> Vec<u8> {
    prefixed(FILE_INFO, &file.to_le_bytes())
}

/// `t` + txid in internal byte order.
pub fn tx_index(txid: &Hash256) -> Vec<u8> {
    prefixed(TX_INDEX, txid.as_bytes())
}

pub fn last_block_file() -> Vec<u8> {
    vec![LAST_BLOCK_FILE]
}

pub fn reindexing() -> Vec<u8> {
    vec![REINDEXING]
}

/// `F` + length-prefixed flag name. The length prefix is a single byte for
/// any name shorter than 253 bytes.
pub fn flag(name: &str) -> Vec<u8> {
    let mut key = vec![FLAG];
    CompactSize::encode(name.len() as u64, &mut key);
    key.extend_from_slice(name.as_bytes());
    key
}
