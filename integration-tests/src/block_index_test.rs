use bitcoin_block_index::{keys, BlockchainReader, IndexDb, IndexError, Validity};
use bitcoin_blockfile::{BlockFile, BlockHeader, Hash256, Network};
use test_data_utils::{
    GENESIS_BLOCK, GENESIS_BLOCK_HASH, GENESIS_COINBASE_TXID, SEGWIT_TX, SEGWIT_TXID,
    SEGWIT_WTXID,
};

use crate::test_helpers::{mainnet_image_with, varints, NodeDataDir};

const HAVE_DATA: u64 = 8;
const VALID_SCRIPTS: u64 = 5;

/// Body of a block holding the genesis coinbase followed by a segwit spend.
fn second_block() -> (Vec<u8>, Hash256) {
    let genesis_hash: Hash256 = GENESIS_BLOCK_HASH.parse().unwrap();
    let header = BlockHeader::new(
        0x2000_0000,
        genesis_hash,
        Hash256([0x33; 32]),
        1_231_469_665,
        0x1d00_ffff,
        2_573_394_689,
    );

    let mut body = header.serialize().to_vec();
    body.push(2);
    body.extend_from_slice(&GENESIS_BLOCK[81..]);
    body.extend_from_slice(&SEGWIT_TX);
    (body, header.hash())
}

fn block_index_value(
    height: u64,
    tx_count: u64,
    file: u64,
    data_pos: u64,
    header: &[u8],
) -> Vec<u8> {
    let status = VALID_SCRIPTS | HAVE_DATA;
    let mut value = varints(&[259_900, height, status, tx_count, file, data_pos]);
    value.extend_from_slice(&header[..80]);
    value
}

/// blk00003.dat with the genesis block and a second block, indexed in a real
/// LevelDB along with a transaction index.
fn populated_datadir() -> (NodeDataDir, Hash256, Vec<u64>) {
    let node = NodeDataDir::new();
    let (second, second_hash) = second_block();
    let (image, positions) = mainnet_image_with(&[&GENESIS_BLOCK[..], &second[..]], 40);
    node.write_block_file(3, image);

    let genesis_hash: Hash256 = GENESIS_BLOCK_HASH.parse().unwrap();
    let segwit_txid: Hash256 = SEGWIT_TXID.parse().unwrap();
    // the segwit spend follows the tx count and the 204 byte coinbase
    let segwit_offset = 1 + (GENESIS_BLOCK.len() as u64 - 81);

    node.write_index(&[
        (
            keys::block_index(&genesis_hash),
            block_index_value(0, 1, 3, positions[0], &GENESIS_BLOCK),
        ),
        (
            keys::block_index(&second_hash),
            block_index_value(1, 2, 3, positions[1], &second),
        ),
        (
            keys::tx_index(&segwit_txid),
            varints(&[3, positions[1], segwit_offset]),
        ),
        (
            keys::file_info(3),
            varints(&[2, 700, 0, 0, 1, 1_231_006_505, 1_231_469_665]),
        ),
        (keys::last_block_file(), 3u32.to_le_bytes().to_vec()),
        (keys::flag("txindex"), b"1".to_vec()),
    ]);

    (node, second_hash, positions)
}

#[test]
fn test_get_block_through_leveldb_index() {
    let (node, second_hash, positions) = populated_datadir();
    let mut reader = BlockchainReader::open(node.path(), Network::Mainnet).unwrap();

    let genesis = reader.get_block(GENESIS_BLOCK_HASH).unwrap();
    assert_eq!(genesis.hash().to_string(), GENESIS_BLOCK_HASH);
    assert_eq!(genesis.data_pos(), positions[0]);
    assert_eq!(genesis.start_pos(), positions[0] - 8);
    assert_eq!(
        genesis.transactions()[0].txid().to_string(),
        GENESIS_COINBASE_TXID
    );

    let second = reader.get_block(&second_hash.to_string()).unwrap();
    assert_eq!(second.hash(), second_hash);
    assert_eq!(second.tx_count(), 2);
    assert_eq!(second.transactions()[1].wtxid().to_string(), SEGWIT_WTXID);
}

#[test]
fn test_get_transaction_through_tx_index() {
    let (node, _, positions) = populated_datadir();
    let mut reader = BlockchainReader::open(node.path(), Network::Mainnet).unwrap();

    let record = reader.tx_index_record(SEGWIT_TXID).unwrap();
    assert_eq!(record.file, 3);
    assert_eq!(u64::from(record.data_pos), positions[1]);

    let tx = reader.get_transaction(SEGWIT_TXID).unwrap();
    assert_eq!(tx.txid().to_string(), SEGWIT_TXID);
    assert!(tx.has_witness());

    // the same transaction straight from the file, without the index
    let mut file = BlockFile::open(node.blocks_dir(), 3, Network::Mainnet).unwrap();
    let direct = file
        .read_transaction(positions[1], u64::from(record.tx_offset))
        .unwrap();
    assert_eq!(direct, tx);
}

#[test]
fn test_bookkeeping_records() {
    let (node, _, _) = populated_datadir();
    let mut index = IndexDb::open(node.path()).unwrap();

    let record = index
        .block_index_record_by_display_hex(GENESIS_BLOCK_HASH)
        .unwrap();
    assert_eq!(record.height, 0);
    assert_eq!(record.status.validity(), Validity::Scripts);
    assert!(record.status.has_data());
    assert_eq!(record.header.hash().to_string(), GENESIS_BLOCK_HASH);

    let info = index.file_info_record(3).unwrap();
    assert_eq!(info.blocks, 2);
    assert_eq!(info.height_last, 1);
    assert_eq!(info.time_first.timestamp(), 1_231_006_505);

    assert_eq!(index.last_block_file_number_used().unwrap(), 3);
    assert!(index.flag("txindex").unwrap());
    assert!(!index.is_reindexing().unwrap());
    assert!(index.flag("prunedblockfiles").unwrap_err().is_not_found());
}

#[test]
fn test_unknown_hash_and_missing_index() {
    let (node, _, _) = populated_datadir();
    let mut reader = BlockchainReader::open(node.path(), Network::Mainnet).unwrap();

    let unknown = "00".repeat(32);
    assert!(reader.get_block(&unknown).unwrap_err().is_not_found());
    assert!(matches!(
        reader.get_block("not-a-hash"),
        Err(IndexError::InvalidHash { .. })
    ));
    drop(reader);

    let empty = tempfile::tempdir().unwrap();
    match IndexDb::open(empty.path()) {
        Ok(_) => panic!("Expected error"),
        Err(e) => assert!(matches!(e, IndexError::Store { .. })),
    }
}

#[test]
fn test_scan_file_on_disk() {
    let (node, second_hash, positions) = populated_datadir();
    let scanner = BlockFile::open(node.blocks_dir(), 3, Network::Mainnet)
        .unwrap()
        .scan()
        .unwrap();

    let blocks: Vec<_> = scanner.collect::<Result<_, _>>().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].data_pos(), positions[0]);
    assert_eq!(blocks[1].hash(), second_hash);
    assert_eq!(blocks[0].end_pos(), blocks[1].start_pos());
}
