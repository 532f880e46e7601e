//! Values stored in the `blocks/index` database.
//!
//! Unlike the block files, these records use [`ContinuationVarint`] for every
//! integer field. The block index record additionally embeds the block header
//! in its fixed-width form.

use std::io;

use bitcoin_blockfile::{BlockHeader, ContinuationVarint, Cursor, DecodeError};
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::{MalformedRecord, RecordKind, Result};

bitflags! {
    /// Status bitmask of a block index entry. The low three bits hold a
    /// validity level rather than independent flags, see [`BlockStatus::validity`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockStatus: u32 {
        const VALID_MASK = 0b111;
        /// Full block available in `blk*.dat`.
        const HAVE_DATA = 8;
        /// Undo data available in `rev*.dat`.
        const HAVE_UNDO = 16;
        const FAILED_VALID = 32;
        const FAILED_CHILD = 64;
        /// Block data was stored with witnesses.
        const OPT_WITNESS = 128;

        const _ = !0;
    }
}

/// How far validation of a block got. Levels are cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Unknown,
    Header,
    Tree,
    Transactions,
    Chain,
    Scripts,
}

impl BlockStatus {
    pub fn validity(&self) -> Validity {
        match self.bits() & Self::VALID_MASK.bits() {
            1 => Validity::Header,
            2 => Validity::Tree,
            3 => Validity::Transactions,
            4 => Validity::Chain,
            5 => Validity::Scripts,
            _ => Validity::Unknown,
        }
    }

    pub fn has_data(&self) -> bool {
        self.contains(Self::HAVE_DATA)
    }

    pub fn has_undo(&self) -> bool {
        self.contains(Self::HAVE_UNDO)
    }

    pub fn failed(&self) -> bool {
        self.intersects(Self::FAILED_VALID | Self::FAILED_CHILD)
    }

    /// Validated up to at least `level` and not marked failed.
    pub fn is_valid(&self, level: Validity) -> bool {
        !self.failed() && self.validity() >= level
    }
}

impl Serialize for BlockStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("BlockStatus", 6)?;
        state.serialize_field("bits", &self.bits())?;
        state.serialize_field("validity", &self.validity())?;
        state.serialize_field("have_data", &self.has_data())?;
        state.serialize_field("have_undo", &self.has_undo())?;
        state.serialize_field("failed", &self.failed())?;
        state.serialize_field("witness", &self.contains(Self::OPT_WITNESS))?;
        state.end()
    }
}

/// Field-by-field reader that turns decode failures into `MalformedRecord`.
struct RecordReader<'a> {
    kind: RecordKind,
    cursor: Cursor<io::Cursor<&'a [u8]>>,
    len: usize,
}

impl<'a> RecordReader<'a> {
    fn new(kind: RecordKind, bytes: &'a [u8]) -> Self {
        debug!(%kind, raw = %hex::encode(bytes), "Decoding index record");
        RecordReader {
            kind,
            cursor: Cursor::from_slice(bytes),
            len: bytes.len(),
        }
    }

    fn malformed(&self, field: &str, reason: impl std::fmt::Display) -> crate::error::IndexError {
        MalformedRecord {
            kind: self.kind,
            reason: format!("{field}: {reason}"),
        }
        .build()
    }

    fn decoded<T>(&self, field: &str, result: std::result::Result<T, DecodeError>) -> Result<T> {
        result.map_err(|e| self.malformed(field, e))
    }

    fn varint(&mut self, field: &str) -> Result<u64> {
        let result = ContinuationVarint::decode(&mut self.cursor);
        self.decoded(field, result)
    }

    fn varint_as<T: TryFrom<u64>>(&mut self, field: &str) -> Result<T> {
        let value = self.varint(field)?;
        T::try_from(value).map_err(|_| {
            self.malformed(
                field,
                format!("{value} does not fit in {}", std::any::type_name::<T>()),
            )
        })
    }

    fn timestamp(&mut self, field: &str) -> Result<DateTime<Utc>> {
        let seconds: i64 = self.varint_as(field)?;
        DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| self.malformed(field, format!("{seconds} is out of range")))
    }

    fn header(&mut self) -> Result<BlockHeader> {
        let result = BlockHeader::decode(&mut self.cursor);
        self.decoded("header", result)
    }

    fn finish(mut self) -> Result<()> {
        let result = self.cursor.position();
        let position = self.decoded("end", result)?;
        if position < self.len as u64 {
            debug!(kind = %self.kind, trailing = self.len as u64 - position, "Ignoring trailing bytes");
        }
        Ok(())
    }
}

/// Entry of the `b` keyspace: where a block is stored and how far it was validated.
///
/// `file`, `data_pos` and `undo_pos` are only stored when the status says the
/// corresponding data exists; otherwise they are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockIndexRecord {
    pub height: i32,
    pub status: BlockStatus,
    pub tx_count: u32,
    pub file: Option<u32>,
    pub data_pos: Option<u32>,
    pub undo_pos: Option<u32>,
    pub header: BlockHeader,
}

impl BlockIndexRecord {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(RecordKind::BlockIndex, bytes);

        // leading client version, not interpreted
        reader.varint("version")?;
        let height = reader.varint_as("height")?;
        let status = BlockStatus::from_bits_retain(reader.varint_as("status")?);
        let tx_count = reader.varint_as("tx_count")?;

        let file = if status.intersects(BlockStatus::HAVE_DATA | BlockStatus::HAVE_UNDO) {
            Some(reader.varint_as("file")?)
        } else {
            None
        };
        let data_pos = if status.has_data() {
            Some(reader.varint_as("data_pos")?)
        } else {
            None
        };
        let undo_pos = if status.has_undo() {
            Some(reader.varint_as("undo_pos")?)
        } else {
            None
        };

        let header = reader.header()?;
        reader.finish()?;

        Ok(BlockIndexRecord {
            height,
            status,
            tx_count,
            file,
            data_pos,
            undo_pos,
            header,
        })
    }

    /// File number and data position of the block, if its data is on disk.
    pub fn block_location(&self) -> Option<(u32, u32)> {
        self.file.zip(self.data_pos)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp()
    }
}

/// Entry of the `f` keyspace: bookkeeping for one `blkNNNNN.dat`/`revNNNNN.dat` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfoRecord {
    pub blocks: u32,
    pub size: u32,
    pub undo_size: u32,
    pub height_first: u32,
    pub height_last: u32,
    pub time_first: DateTime<Utc>,
    pub time_last: DateTime<Utc>,
}

impl FileInfoRecord {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(RecordKind::FileInfo, bytes);
        let record = FileInfoRecord {
            blocks: reader.varint_as("blocks")?,
            size: reader.varint_as("size")?,
            undo_size: reader.varint_as("undo_size")?,
            height_first: reader.varint_as("height_first")?,
            height_last: reader.varint_as("height_last")?,
            time_first: reader.timestamp("time_first")?,
            time_last: reader.timestamp("time_last")?,
        };
        reader.finish()?;
        Ok(record)
    }
}

/// Entry of the `t` keyspace, present when the node runs with `-txindex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxIndexRecord {
    pub file: u32,
    /// Data position of the containing block.
    pub data_pos: u32,
    /// Offset of the transaction counted from the end of the block header.
    pub tx_offset: u32,
}

impl TxIndexRecord {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(RecordKind::TxIndex, bytes);
        let record = TxIndexRecord {
            file: reader.varint_as("file")?,
            data_pos: reader.varint_as("data_pos")?,
            tx_offset: reader.varint_as("tx_offset")?,
        };
        reader.finish()?;
        Ok(record)
    }
}
