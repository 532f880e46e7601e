//! Access to the `blocks/index` LevelDB of a Bitcoin full node and hash based
//! retrieval of blocks and transactions from its block files.

pub mod error;
pub mod index_db;
pub mod keys;
pub mod reader;
pub mod records;
pub mod store;

pub use error::{IndexError, RecordKind, Result};
pub use index_db::{parse_display_hash, IndexDb};
pub use reader::BlockchainReader;
pub use records::{BlockIndexRecord, BlockStatus, FileInfoRecord, TxIndexRecord, Validity};
pub use store::IndexStore;
