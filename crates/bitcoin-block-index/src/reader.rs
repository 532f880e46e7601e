use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use bitcoin_blockfile::{Block, BlockFile, BlockScanner, Network, Transaction};
use rusty_leveldb::DB;
use snafu::prelude::*;
use tracing::info;

use crate::error::{
    Decode, HashMismatch, MalformedRecord, RecordKind, Reindexing, Result, TxIndexDisabled,
};
use crate::index_db::{parse_display_hash, IndexDb};
use crate::records::{BlockIndexRecord, FileInfoRecord, TxIndexRecord};
use crate::store::IndexStore;

const TXINDEX_FLAG: &str = "txindex";

/// Resolves block and transaction hashes through the index to bytes in the
/// flat block files of one node data directory.
pub struct BlockchainReader<S = DB> {
    datadir: PathBuf,
    network: Network,
    index: IndexDb<S>,
}

impl BlockchainReader<DB> {
    pub fn open(datadir: impl AsRef<Path>, network: Network) -> Result<Self> {
        let datadir = datadir.as_ref();
        let index = IndexDb::open(datadir)?;
        info!(datadir = %datadir.display(), %network, "Opened blockchain data");
        Ok(BlockchainReader::new(datadir, network, index))
    }
}

impl<S: IndexStore> BlockchainReader<S> {
    pub fn new(datadir: impl Into<PathBuf>, network: Network, index: IndexDb<S>) -> Self {
        BlockchainReader {
            datadir: datadir.into(),
            network,
            index,
        }
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.datadir.join("blocks")
    }

    pub fn index(&mut self) -> &mut IndexDb<S> {
        &mut self.index
    }

    fn ensure_not_reindexing(&mut self) -> Result<()> {
        ensure!(!self.index.is_reindexing()?, Reindexing);
        Ok(())
    }

    fn ensure_txindex(&mut self) -> Result<()> {
        let enabled = match self.index.flag(TXINDEX_FLAG) {
            Ok(enabled) => enabled,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };
        ensure!(enabled, TxIndexDisabled);
        Ok(())
    }

    /// Looks up a block by its display-order hash and decodes it from its block file.
    pub fn get_block(&mut self, hash: &str) -> Result<Block> {
        self.ensure_not_reindexing()?;
        let expected = parse_display_hash(hash)?;
        let record = self.index.block_index_record(&expected)?;
        let (file, data_pos) = record.block_location().context(MalformedRecord {
            kind: RecordKind::BlockIndex,
            reason: "block has no data position, its data is not on disk",
        })?;

        let block = self.get_block_from_file(file, data_pos.into())?;
        ensure!(
            block.hash() == expected,
            HashMismatch {
                expected,
                found: block.hash(),
                file,
                data_pos,
            }
        );
        Ok(block)
    }

    /// Looks up a transaction by its display-order txid. Needs a node run with `-txindex`.
    pub fn get_transaction(&mut self, txid: &str) -> Result<Transaction> {
        self.ensure_not_reindexing()?;
        self.ensure_txindex()?;
        let record = self.index.tx_index_record_by_display_hex(txid)?;
        self.get_transaction_from_file(
            record.file,
            record.data_pos.into(),
            record.tx_offset.into(),
        )
    }

    pub fn get_block_from_file(&self, file: u32, data_pos: u64) -> Result<Block> {
        BlockFile::open(self.blocks_dir(), file, self.network)
            .and_then(|mut block_file| block_file.read_block(data_pos))
            .context(Decode)
    }

    pub fn get_transaction_from_file(
        &self,
        file: u32,
        data_pos: u64,
        tx_offset: u64,
    ) -> Result<Transaction> {
        BlockFile::open(self.blocks_dir(), file, self.network)
            .and_then(|mut block_file| block_file.read_transaction(data_pos, tx_offset))
            .context(Decode)
    }

    pub fn scan_file(&self, file: u32) -> Result<BlockScanner<BufReader<File>>> {
        BlockFile::open(self.blocks_dir(), file, self.network)
            .and_then(BlockFile::scan)
            .context(Decode)
    }

    pub fn block_index_record(&mut self, hash: &str) -> Result<BlockIndexRecord> {
        self.index.block_index_record_by_display_hex(hash)
    }

    pub fn tx_index_record(&mut self, txid: &str) -> Result<TxIndexRecord> {
        self.index.tx_index_record_by_display_hex(txid)
    }

    pub fn file_info_record(&mut self, file: u32) -> Result<FileInfoRecord> {
        self.index.file_info_record(file)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use bitcoin_blockfile::{block_file_path, ContinuationVarint, Hash256};
    use test_data_utils::{
        BlockFileImage, GENESIS_BLOCK, GENESIS_BLOCK_HASH, GENESIS_COINBASE_TXID,
    };

    use super::*;
    use crate::error::IndexError;
    use crate::keys;

    type MapReader = BlockchainReader<BTreeMap<Vec<u8>, Vec<u8>>>;

    fn varints(values: &[u64]) -> Vec<u8> {
        let mut out = Vec::new();
        for value in values {
            ContinuationVarint::encode(*value, &mut out);
        }
        out
    }

    /// Data dir with the genesis block in `blk00002.dat` after some padding,
    /// and index entries pointing at it.
    fn setup(dir: &Path, status: u64, extra: Vec<(Vec<u8>, Vec<u8>)>) -> MapReader {
        let mut image = BlockFileImage::new().padding(16);
        let data_pos = image.push_record(Network::Mainnet.magic(), &GENESIS_BLOCK);
        fs::create_dir_all(dir.join("blocks")).unwrap();
        fs::write(block_file_path(&dir.join("blocks"), 2), image.into_bytes()).unwrap();

        let block_hash: Hash256 = GENESIS_BLOCK_HASH.parse().unwrap();
        let txid: Hash256 = GENESIS_COINBASE_TXID.parse().unwrap();

        let mut fields = vec![1, 0, status, 1, 2];
        if status & 8 != 0 {
            fields.push(data_pos);
        }
        if status & 16 != 0 {
            fields.push(0);
        }
        let mut block_value = varints(&fields);
        block_value.extend_from_slice(&GENESIS_BLOCK[..80]);

        let mut store: BTreeMap<Vec<u8>, Vec<u8>> = extra.into_iter().collect();
        store.insert(keys::block_index(&block_hash), block_value);
        store.insert(keys::tx_index(&txid), varints(&[2, data_pos, 1]));

        BlockchainReader::new(dir, Network::Mainnet, IndexDb::new(store))
    }

    #[test]
    fn test_get_block_and_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = setup(
            dir.path(),
            5 | 8,
            vec![(keys::flag("txindex"), b"1".to_vec())],
        );

        let block = reader.get_block(GENESIS_BLOCK_HASH).unwrap();
        assert_eq!(block.hash().to_string(), GENESIS_BLOCK_HASH);
        assert_eq!(block.start_pos(), 16);

        let tx = reader.get_transaction(GENESIS_COINBASE_TXID).unwrap();
        assert_eq!(tx.txid().to_string(), GENESIS_COINBASE_TXID);
    }

    #[test]
    fn test_refuses_while_reindexing() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = setup(dir.path(), 5 | 8, vec![(keys::reindexing(), b"1".to_vec())]);

        assert!(matches!(
            reader.get_block(GENESIS_BLOCK_HASH),
            Err(IndexError::Reindexing { .. })
        ));
        assert!(matches!(
            reader.get_transaction(GENESIS_COINBASE_TXID),
            Err(IndexError::Reindexing { .. })
        ));
        // plain record lookups still work
        assert!(reader.block_index_record(GENESIS_BLOCK_HASH).is_ok());
    }

    #[test]
    fn test_transaction_needs_txindex() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = setup(dir.path(), 5 | 8, vec![]);
        assert!(matches!(
            reader.get_transaction(GENESIS_COINBASE_TXID),
            Err(IndexError::TxIndexDisabled { .. })
        ));

        let mut reader = setup(
            dir.path(),
            5 | 8,
            vec![(keys::flag("txindex"), b"0".to_vec())],
        );
        assert!(matches!(
            reader.get_transaction(GENESIS_COINBASE_TXID),
            Err(IndexError::TxIndexDisabled { .. })
        ));
    }

    #[test]
    fn test_block_without_data() {
        let dir = tempfile::tempdir().unwrap();
        // undo only: the record has a file number but no data position
        let mut reader = setup(dir.path(), 5 | 16, vec![]);

        match reader.get_block(GENESIS_BLOCK_HASH) {
            Ok(_) => panic!("Expected error"),
            Err(e) => assert!(matches!(
                e,
                IndexError::MalformedRecord {
                    kind: RecordKind::BlockIndex,
                    ..
                }
            )),
        }
    }

    #[test]
    fn test_index_entry_pointing_at_another_block() {
        let dir = tempfile::tempdir().unwrap();
        let wrong = Hash256([0x42; 32]);
        // same location as the genesis entry, which starts after 16 bytes of padding
        let mut value = varints(&[1, 0, 5 | 8, 1, 2, 24]);
        value.extend_from_slice(&GENESIS_BLOCK[..80]);
        let mut reader = setup(dir.path(), 5 | 8, vec![(keys::block_index(&wrong), value)]);

        match reader.get_block(&wrong.to_string()) {
            Ok(block) => panic!("Expected error, got block {}", block.hash()),
            Err(IndexError::HashMismatch {
                expected,
                found,
                file,
                data_pos,
                ..
            }) => {
                assert_eq!(expected, wrong);
                assert_eq!(found.to_string(), GENESIS_BLOCK_HASH);
                assert_eq!((file, data_pos), (2, 24));
            }
            Err(e) => panic!("Unexpected error {e}"),
        }
        assert!(reader.get_block(GENESIS_BLOCK_HASH).is_ok());
    }

    #[test]
    fn test_missing_block_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = setup(dir.path(), 5 | 8, vec![]);

        match reader.get_block_from_file(9, 8) {
            Ok(_) => panic!("Expected error"),
            Err(e) => assert!(matches!(e, IndexError::Decode { .. })),
        }
        assert_eq!(reader.scan_file(2).unwrap().count(), 1);
    }
}
