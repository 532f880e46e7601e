//! Random and sequential access to `blkNNNNN.dat` files.
//!
//! Positions handed out by the block index point at the header, eight bytes
//! past the start of the record; [`BlockFile`] takes those positions as-is.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tracing::{debug, warn};

use crate::block::{Block, RECORD_PREFIX_SIZE};
use crate::cursor::Cursor;
use crate::error::{BlockFileOpen, LengthTooLarge, MagicMismatch, Result, Truncated};
use crate::header::BlockHeader;
use crate::network::Network;
use crate::transaction::Transaction;

/// Bytes read at a time while looking for the next magic tag.
const RESYNC_WINDOW: u64 = 4096;

pub fn block_file_name(number: u32) -> String {
    format!("blk{number:05}.dat")
}

pub fn block_file_path(blocks_dir: &Path, number: u32) -> PathBuf {
    blocks_dir.join(block_file_name(number))
}

pub struct BlockFile {
    path: PathBuf,
    number: u32,
    network: Network,
    cursor: Cursor<BufReader<File>>,
}

impl BlockFile {
    pub fn open(blocks_dir: impl AsRef<Path>, number: u32, network: Network) -> Result<Self> {
        let path = block_file_path(blocks_dir.as_ref(), number);
        let file = File::open(&path).context(BlockFileOpen { path: path.clone() })?;
        debug!(path = %path.display(), %network, "Opened block file");

        Ok(BlockFile {
            path,
            number,
            network,
            cursor: Cursor::new(BufReader::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn seek_record(&mut self, data_pos: u64) -> Result<u64> {
        let record_pos = data_pos.checked_sub(RECORD_PREFIX_SIZE).context(Truncated {
            needed: RECORD_PREFIX_SIZE,
            position: data_pos,
        })?;
        debug!(file = self.number, data_pos, record_pos, "Seeking to block record");
        self.cursor.seek_to(record_pos)
    }

    /// Decodes the block whose header starts at `data_pos`.
    pub fn read_block(&mut self, data_pos: u64) -> Result<Block> {
        self.seek_record(data_pos)?;
        Block::decode(&mut self.cursor, self.network)
    }

    /// Decodes one transaction of the block whose header starts at `data_pos`.
    /// `tx_offset` counts from the first byte after the header.
    pub fn read_transaction(&mut self, data_pos: u64, tx_offset: u64) -> Result<Transaction> {
        let network = self.network;
        self.seek_record(data_pos)?;

        self.cursor.restore_on_error(|cursor, position| {
            let magic = cursor.read_u32()?;
            ensure!(
                magic == network.magic(),
                MagicMismatch {
                    expected: network.magic(),
                    found: magic,
                    position,
                }
            );
            cursor.read_u32()?;
            BlockHeader::decode(cursor)?;

            let offset = i64::try_from(tx_offset).ok().context(LengthTooLarge {
                length: tx_offset,
                position,
            })?;
            cursor.seek_relative(offset)?;
            Transaction::decode(cursor)
        })
    }

    /// Iterates over every record in the file from the beginning.
    pub fn scan(mut self) -> Result<BlockScanner<BufReader<File>>> {
        self.cursor.seek_to(0)?;
        BlockScanner::new(self.cursor, self.network)
    }
}

/// Walks the records of a flat file in order.
///
/// Bytes that do not start a record for the configured network (typically the
/// zero padding a node pre-allocates at the end of a file) are skipped up to
/// the next magic tag. A decoded record is followed by the next one at
/// `start + 8 + declared length`. The first error other than a framing
/// mismatch is yielded and ends the scan.
pub struct BlockScanner<R> {
    cursor: Cursor<R>,
    network: Network,
    len: u64,
    done: bool,
}

impl<R: Read + Seek> BlockScanner<R> {
    pub fn new(mut cursor: Cursor<R>, network: Network) -> Result<Self> {
        let len = cursor.stream_len()?;
        Ok(BlockScanner {
            cursor,
            network,
            len,
            done: false,
        })
    }

    fn next_block(&mut self) -> Result<Option<Block>> {
        loop {
            let position = self.cursor.position()?;
            if position + RECORD_PREFIX_SIZE > self.len {
                return Ok(None);
            }

            match Block::decode(&mut self.cursor, self.network) {
                Ok(block) => {
                    self.cursor.seek_to(block.end_pos())?;
                    return Ok(Some(block));
                }
                Err(e) if e.is_framing() => {
                    if !self.resync(position + 1)? {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Moves the cursor to the next magic tag at or after `from`. Returns false
    /// if the file has none.
    fn resync(&mut self, from: u64) -> Result<bool> {
        let magic = self.network.magic().to_le_bytes();
        let mut position = from;
        // zero padding is expected, anything else is worth a warning
        let mut garbage = false;

        while position + magic.len() as u64 <= self.len {
            self.cursor.seek_to(position)?;
            let window = (self.len - position).min(RESYNC_WINDOW);
            let bytes = self.cursor.read_bytes(window)?;

            if let Some(i) = bytes.windows(magic.len()).position(|w| w == magic) {
                let found = position + i as u64;
                garbage |= bytes[..i].iter().any(|b| *b != 0);
                if garbage {
                    warn!(from, to = found, "Skipped bytes without a block record");
                }
                self.cursor.seek_to(found)?;
                return Ok(true);
            }
            garbage |= bytes.iter().any(|b| *b != 0);
            // overlap so a tag split across two windows is still seen
            position += window - (magic.len() as u64 - 1);
        }

        debug!(from, len = self.len, "No further block records");
        self.cursor.seek_to(self.len)?;
        Ok(false)
    }
}

impl<R: Read + Seek> Iterator for BlockScanner<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
