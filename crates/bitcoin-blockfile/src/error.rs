use std::path::PathBuf;

use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
#[snafu(visibility(pub))]
pub enum DecodeError {
    #[snafu(display("Unexpected end of data: needed {needed} bytes at position {position}"))]
    Truncated {
        needed: u64,
        position: u64,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display(
        "Invalid block record at position {position}: expected magic {expected:08x}, found {found:08x}"
    ))]
    MagicMismatch {
        expected: u32,
        found: u32,
        position: u64,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to open block file {}", path.display()))]
    BlockFileOpen {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Length prefix {length} at position {position} does not fit in memory"))]
    LengthTooLarge {
        length: u64,
        position: u64,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Varint starting at position {position} overflows 64 bits"))]
    VarintOverflow {
        position: u64,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("I/O error while decoding"))]
    Io {
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl DecodeError {
    /// True for a framing failure, i.e. the cursor was not positioned on a block record.
    pub fn is_framing(&self) -> bool {
        matches!(self, DecodeError::MagicMismatch { .. })
    }

    pub fn is_truncation(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
