use std::fmt;
use std::path::PathBuf;

use bitcoin_blockfile::{DecodeError, Hash256};
use snafu::prelude::*;

/// Which kind of index value failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    BlockIndex,
    FileInfo,
    TxIndex,
    LastBlockFile,
    Flag,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::BlockIndex => "block index",
            RecordKind::FileInfo => "file info",
            RecordKind::TxIndex => "tx index",
            RecordKind::LastBlockFile => "last block file",
            RecordKind::Flag => "flag",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
#[snafu(visibility(pub))]
pub enum IndexError {
    #[snafu(display("Malformed {kind} record: {reason}"))]
    MalformedRecord {
        kind: RecordKind,
        reason: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Key {key} not found in the block index"))]
    NotFound {
        key: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to open block index at {}: {source}", path.display()))]
    Store {
        path: PathBuf,
        source: rusty_leveldb::Status,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Invalid hash {input:?}: {reason}"))]
    InvalidHash {
        input: String,
        reason: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Node is reindexing, the block index is incomplete"))]
    Reindexing {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Transaction index is disabled on this node"))]
    TxIndexDisabled {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display(
        "Block at file {file} position {data_pos} hashes to {found}, expected {expected}"
    ))]
    HashMismatch {
        expected: Hash256,
        found: Hash256,
        file: u32,
        data_pos: u32,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to read from block file"))]
    Decode {
        source: DecodeError,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl IndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
