//! Decoding of the raw blocks and transactions a Bitcoin full node keeps in its
//! flat `blkNNNNN.dat` files.

pub mod block;
pub mod block_file;
pub mod cursor;
pub mod error;
pub mod hash;
pub mod header;
pub mod network;
pub mod serde_hex;
pub mod transaction;
pub mod varint;

pub use block::Block;
pub use block_file::{block_file_path, BlockFile, BlockScanner};
pub use cursor::Cursor;
pub use error::{DecodeError, Result};
pub use hash::{double_sha256, reverse_bytes, Hash256};
pub use header::BlockHeader;
pub use network::Network;
pub use transaction::{Transaction, TxEncoding, TxInput, TxOutput};
pub use varint::{CompactSize, ContinuationVarint};
