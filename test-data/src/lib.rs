//! Byte-level fixtures shared by the unit and integration tests.
//!
//! Everything here is plain bytes and display-order hash strings so that any
//! crate in the workspace can use it as a dev-dependency.

use hex_literal::hex;
use once_cell::sync::Lazy;

/// Mainnet block 0 without the record prefix: header, tx count and coinbase.
pub const GENESIS_BLOCK: [u8; 285] = hex!(
    "0100000000000000000000000000000000000000000000000000000000000000"
    "000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa"
    "4b1e5e4a29ab5f49ffff001d1dac2b7c01010000000100000000000000000000"
    "00000000000000000000000000000000000000000000ffffffff4d04ffff001d"
    "0104455468652054696d65732030332f4a616e2f32303039204368616e63656c"
    "6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f75742066"
    "6f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe554827"
    "1967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4"
    "f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000"
);

pub const GENESIS_BLOCK_HASH: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

// single transaction, so the merkle root is the coinbase txid
pub const GENESIS_MERKLE_ROOT: &str =
    "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
pub const GENESIS_COINBASE_TXID: &str = GENESIS_MERKLE_ROOT;

/// Version 2, one input spending `11..11:1` with a two-item witness, one P2WPKH output.
pub const SEGWIT_TX: [u8; 92] = hex!(
    "02000000 0001"
    "01 1111111111111111111111111111111111111111111111111111111111111111 01000000 00 feffffff"
    "01 50c3000000000000 16 00142222222222222222222222222222222222222222"
    "02 03aabbcc 02ddee"
    "65000000"
);

/// [`SEGWIT_TX`] with marker, flag and witness removed.
pub const SEGWIT_TX_LEGACY: [u8; 82] = hex!(
    "02000000"
    "01 1111111111111111111111111111111111111111111111111111111111111111 01000000 00 feffffff"
    "01 50c3000000000000 16 00142222222222222222222222222222222222222222"
    "65000000"
);

pub const SEGWIT_TXID: &str = "58fe39986138833fca30925c238926a42c916c9179fbbd93470530970c4152bd";
pub const SEGWIT_WTXID: &str = "4bb38ed444a01eebe46a87f62e9101ce7b4a2fe63b3d6f61f93a0dee8e56c5e9";

pub const MAINNET_MAGIC_BYTES: [u8; 4] = hex!("f9beb4d9");
pub const TESTNET_MAGIC_BYTES: [u8; 4] = hex!("0b110907");

/// The genesis block framed as it appears at the start of mainnet `blk00000.dat`.
pub static GENESIS_RECORD: Lazy<Vec<u8>> = Lazy::new(|| {
    frame_record(u32::from_le_bytes(MAINNET_MAGIC_BYTES), &GENESIS_BLOCK)
});

/// Prefixes `body` with the magic tag and its own length, as a node writes it to disk.
pub fn frame_record(magic: u32, body: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(body.len() + 8);
    record.extend_from_slice(&magic.to_le_bytes());
    record.extend_from_slice(&(body.len() as u32).to_le_bytes());
    record.extend_from_slice(body);
    record
}

/// Assembles the contents of a flat block file, keeping track of where each
/// record's header lands.
#[derive(Debug, Default, Clone)]
pub struct BlockFileImage {
    bytes: Vec<u8>,
}

impl BlockFileImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn padding(mut self, len: usize) -> Self {
        self.bytes.resize(self.bytes.len() + len, 0);
        self
    }

    /// Appends a record and returns the data position a block index entry for it would hold.
    pub fn push_record(&mut self, magic: u32, body: &[u8]) -> u64 {
        let data_pos = self.bytes.len() as u64 + 8;
        self.bytes.extend(frame_record(magic, body));
        data_pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
