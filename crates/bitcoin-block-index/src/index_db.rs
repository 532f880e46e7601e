use std::path::Path;

use bitcoin_blockfile::Hash256;
use rusty_leveldb::{Options, DB};
use snafu::prelude::*;
use tracing::debug;

use crate::error::{InvalidHash, MalformedRecord, NotFound, RecordKind, Result, Store};
use crate::keys;
use crate::records::{BlockIndexRecord, FileInfoRecord, TxIndexRecord};
use crate::store::IndexStore;

/// Parses a hash the way users and RPC show it (byte-reversed hex).
pub fn parse_display_hash(input: &str) -> Result<Hash256> {
    Hash256::from_display_hex(input.trim()).map_err(|e| {
        InvalidHash {
            input,
            reason: e.to_string(),
        }
        .build()
    })
}

/// Typed lookups over the `blocks/index` database.
pub struct IndexDb<S = DB> {
    store: S,
}

impl IndexDb<DB> {
    /// Opens `<datadir>/blocks/index`. The database must already exist.
    ///
    /// The node holds a lock on this database while it runs, so this fails
    /// against a live node.
    pub fn open(datadir: impl AsRef<Path>) -> Result<Self> {
        let path = datadir.as_ref().join("blocks").join("index");
        let mut options = Options::default();
        options.create_if_missing = false;

        let db = DB::open(&path, options).context(Store { path: path.clone() })?;
        debug!(path = %path.display(), "Opened block index");
        Ok(IndexDb { store: db })
    }
}

impl<S: IndexStore> IndexDb<S> {
    pub fn new(store: S) -> Self {
        IndexDb { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn fetch(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.store.get(key)?.context(NotFound {
            key: hex::encode(key),
        })
    }

    pub fn block_index_record(&mut self, hash: &Hash256) -> Result<BlockIndexRecord> {
        let value = self.fetch(&keys::block_index(hash))?;
        BlockIndexRecord::from_bytes(&value)
    }

    pub fn block_index_record_by_display_hex(&mut self, hash: &str) -> Result<BlockIndexRecord> {
        self.block_index_record(&parse_display_hash(hash)?)
    }

    pub fn file_info_record(&mut self, file: u32) -> Result<FileInfoRecord> {
        let value = self.fetch(&keys::file_info(file))?;
        FileInfoRecord::from_bytes(&value)
    }

    pub fn tx_index_record(&mut self, txid: &Hash256) -> Result<TxIndexRecord> {
        let value = self.fetch(&keys::tx_index(txid))?;
        TxIndexRecord::from_bytes(&value)
    }

    pub fn tx_index_record_by_display_hex(&mut self, txid: &str) -> Result<TxIndexRecord> {
        self.tx_index_record(&parse_display_hash(txid)?)
    }

    /// Number of the `blkNNNNN.dat` file the node is currently appending to.
    pub fn last_block_file_number_used(&mut self) -> Result<u32> {
        let value = self.fetch(&keys::last_block_file())?;
        let bytes: [u8; 4] = value
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .context(MalformedRecord {
                kind: RecordKind::LastBlockFile,
                reason: format!("expected 4 bytes, found {}", value.len()),
            })?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn is_reindexing(&mut self) -> Result<bool> {
        self.store.contains(&keys::reindexing())
    }

    /// Value of a named flag such as `txindex`. Fails with `NotFound` if the
    /// node never wrote the flag.
    pub fn flag(&mut self, name: &str) -> Result<bool> {
        let value = self.fetch(&keys::flag(name))?;
        match value.first() {
            Some(b'1') => Ok(true),
            Some(_) => Ok(false),
            None => MalformedRecord {
                kind: RecordKind::Flag,
                reason: format!("flag {name} has an empty value"),
            }
            .fail(),
        }
    }
}
