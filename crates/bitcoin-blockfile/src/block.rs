use std::io::{Read, Seek};

use serde::Serialize;
use snafu::prelude::*;

use crate::cursor::Cursor;
use crate::error::{MagicMismatch, Result};
use crate::hash::Hash256;
use crate::header::BlockHeader;
use crate::network::Network;
use crate::transaction::{vec_for_count, Transaction};
use crate::varint::CompactSize;

/// Bytes in front of every record body: the magic tag and the declared length.
pub const RECORD_PREFIX_SIZE: u64 = 8;

/// One record of a flat block file: `magic || length || header || tx_count || txs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    magic: u32,
    length: u32,
    header: BlockHeader,
    tx_count: u64,
    transactions: Vec<Transaction>,
    start_pos: u64,
}

impl Block {
    /// Decodes the record at the cursor position.
    ///
    /// If the first four bytes are not `network`'s magic tag this fails with
    /// [`crate::DecodeError::MagicMismatch`]. Any failure, including one deep
    /// inside a transaction, rewinds the cursor to where the record started.
    pub fn decode<R: Read + Seek>(cursor: &mut Cursor<R>, network: Network) -> Result<Self> {
        cursor.restore_on_error(|cursor, start_pos| {
            let magic = cursor.read_u32()?;
            ensure!(
                magic == network.magic(),
                MagicMismatch {
                    expected: network.magic(),
                    found: magic,
                    position: start_pos,
                }
            );

            let length = cursor.read_u32()?;
            let header = BlockHeader::decode(cursor)?;
            let tx_count = CompactSize::decode(cursor)?;

            let mut transactions = vec_for_count(tx_count);
            for _ in 0..tx_count {
                transactions.push(Transaction::decode(cursor)?);
            }

            tracing::debug!(
                start_pos,
                length,
                tx_count,
                hash = %header.hash(),
                "Decoded block record"
            );

            Ok(Block {
                magic,
                length,
                header,
                tx_count,
                transactions,
                start_pos,
            })
        })
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    pub fn network(&self) -> Option<Network> {
        Network::from_magic(self.magic)
    }

    /// Declared byte length of the record body (header, tx count and transactions).
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Offset of the magic tag in the source file.
    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Offset of the header, which is what the block index calls the data position.
    pub fn data_pos(&self) -> u64 {
        self.start_pos + RECORD_PREFIX_SIZE
    }

    /// Offset one past the last byte of the record, per its declared length.
    pub fn end_pos(&self) -> u64 {
        self.data_pos() + self.length as u64
    }
}
