//! Transaction decoding for both serialisations a block file can contain.
//!
//! A transaction is either in the original (legacy) layout or in the extended
//! segwit layout, which inserts a `0x00` marker and a non-zero flag byte after
//! the version and appends one witness stack per input before the locktime.
//! The txid is always computed over the legacy layout so it never depends on
//! witness data; [`Transaction::wtxid`] covers the full serialisation.

use std::io::{Read, Seek};

use once_cell::sync::OnceCell;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::cursor::Cursor;
use crate::error::Result;
use crate::hash::{double_sha256, Hash256};
use crate::serde_hex;
use crate::varint::CompactSize;

pub const COIN: i64 = 100_000_000;

const SEGWIT_MARKER: u8 = 0x00;
const WITNESS_FLAG: u8 = 0x01;

/// Element counts come from untrusted bytes; cap what we reserve up front.
const MAX_PREALLOC_ITEMS: u64 = 1024;

pub(crate) fn vec_for_count<T>(count: u64) -> Vec<T> {
    Vec::with_capacity(count.min(MAX_PREALLOC_ITEMS) as usize)
}

/// Which serialisation a transaction was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TxEncoding {
    Legacy,
    Extended { flag: u8 },
}

impl TxEncoding {
    pub fn has_witness_flag(&self) -> bool {
        matches!(self, TxEncoding::Extended { flag } if flag & WITNESS_FLAG != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxInput {
    pub prev_hash: Hash256,
    pub prev_index: u32,
    #[serde(serialize_with = "serde_hex::serialize")]
    pub script: Vec<u8>,
    pub sequence: u32,
    #[serde(serialize_with = "serde_hex::serialize_stack")]
    pub witness: Option<Vec<Vec<u8>>>,
}

impl TxInput {
    fn decode<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Self> {
        let prev_hash = Hash256(cursor.read_array::<32>()?);
        let prev_index = cursor.read_u32()?;
        let script_len = CompactSize::decode(cursor)?;
        let script = cursor.read_bytes(script_len)?;
        let sequence = cursor.read_u32()?;

        Ok(TxInput {
            prev_hash,
            prev_index,
            script,
            sequence,
            witness: None,
        })
    }

    fn decode_witness<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Vec<Vec<u8>>> {
        let count = CompactSize::decode(cursor)?;
        let mut items = vec_for_count(count);
        for _ in 0..count {
            let len = CompactSize::decode(cursor)?;
            items.push(cursor.read_bytes(len)?);
        }
        Ok(items)
    }

    pub fn serialize_legacy(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        write_var_bytes(&self.script, out);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }

    fn serialize_witness(&self, out: &mut Vec<u8>) {
        let items = self.witness.as_deref().unwrap_or_default();
        CompactSize::encode(items.len() as u64, out);
        for item in items {
            write_var_bytes(item, out);
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_hash.is_zero() && self.prev_index == u32::MAX
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutput {
    /// Amount in satoshis.
    pub value: i64,
    #[serde(serialize_with = "serde_hex::serialize")]
    pub script: Vec<u8>,
}

impl TxOutput {
    fn decode<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Self> {
        let value = cursor.read_i64()?;
        let script_len = CompactSize::decode(cursor)?;
        let script = cursor.read_bytes(script_len)?;
        Ok(TxOutput { value, script })
    }

    pub fn serialize_legacy(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(&self.script, out);
    }

    pub fn btc(&self) -> f64 {
        self.value as f64 / COIN as f64
    }
}

fn write_var_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    CompactSize::encode(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

#[derive(Debug, Clone)]
pub struct Transaction {
    version: i32,
    encoding: TxEncoding,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    locktime: u32,
    start_pos: u64,
    txid: OnceCell<Hash256>,
    wtxid: OnceCell<Hash256>,
}

impl Transaction {
    /// Builds a transaction in memory. It is given the extended encoding only
    /// if some input carries a witness stack.
    pub fn new(version: i32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>, locktime: u32) -> Self {
        let encoding = if inputs.iter().any(|input| input.witness.is_some()) {
            TxEncoding::Extended { flag: WITNESS_FLAG }
        } else {
            TxEncoding::Legacy
        };

        Transaction {
            version,
            encoding,
            inputs,
            outputs,
            locktime,
            start_pos: 0,
            txid: OnceCell::new(),
            wtxid: OnceCell::new(),
        }
    }

    /// Decodes one transaction, picking the layout from the byte after the version.
    ///
    /// A `0x00` there followed by a non-zero flag byte selects the extended
    /// layout. `00 00` is read as a legacy transaction with no inputs and no
    /// outputs. On failure the cursor is left where it was.
    pub fn decode<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Self> {
        cursor.restore_on_error(|cursor, start_pos| {
            let version = cursor.read_i32()?;
            let encoding = match cursor.peek(2) {
                Ok(sentinel) if sentinel[0] == SEGWIT_MARKER && sentinel[1] != 0 => {
                    cursor.seek_relative(2)?;
                    TxEncoding::Extended { flag: sentinel[1] }
                }
                Ok(_) => TxEncoding::Legacy,
                // fewer than two bytes left: the body decode reports the truncation
                Err(e) if e.is_truncation() => TxEncoding::Legacy,
                Err(e) => return Err(e),
            };
            Self::decode_body(cursor, version, encoding, start_pos)
        })
    }

    /// Decodes a transaction known to be in the legacy layout, without looking
    /// for a segwit marker. Raw transactions exchanged over RPC use this.
    pub fn decode_legacy<R: Read + Seek>(cursor: &mut Cursor<R>) -> Result<Self> {
        cursor.restore_on_error(|cursor, start_pos| {
            let version = cursor.read_i32()?;
            Self::decode_body(cursor, version, TxEncoding::Legacy, start_pos)
        })
    }

    fn decode_body<R: Read + Seek>(
        cursor: &mut Cursor<R>,
        version: i32,
        encoding: TxEncoding,
        start_pos: u64,
    ) -> Result<Self> {
        let input_count = CompactSize::decode(cursor)?;
        let mut inputs = vec_for_count(input_count);
        for _ in 0..input_count {
            inputs.push(TxInput::decode(cursor)?);
        }

        let output_count = CompactSize::decode(cursor)?;
        let mut outputs = vec_for_count(output_count);
        for _ in 0..output_count {
            outputs.push(TxOutput::decode(cursor)?);
        }

        if encoding.has_witness_flag() {
            for input in inputs.iter_mut() {
                input.witness = Some(TxInput::decode_witness(cursor)?);
            }
        }

        let locktime = cursor.read_u32()?;

        tracing::trace!(
            start_pos,
            ?encoding,
            inputs = inputs.len(),
            outputs = outputs.len(),
            "Decoded transaction"
        );

        Ok(Transaction {
            version,
            encoding,
            inputs,
            outputs,
            locktime,
            start_pos,
            txid: OnceCell::new(),
            wtxid: OnceCell::new(),
        })
    }

    /// Serialisation without marker, flag or witnesses. This is what the txid commits to.
    pub fn serialize_legacy(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        self.write_inputs_outputs(&mut out);
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// Serialisation in the layout the transaction was read from.
    pub fn serialize(&self) -> Vec<u8> {
        let TxEncoding::Extended { flag } = self.encoding else {
            return self.serialize_legacy();
        };

        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(SEGWIT_MARKER);
        out.push(flag);
        self.write_inputs_outputs(&mut out);
        if self.encoding.has_witness_flag() {
            for input in &self.inputs {
                input.serialize_witness(&mut out);
            }
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    fn write_inputs_outputs(&self, out: &mut Vec<u8>) {
        CompactSize::encode(self.inputs.len() as u64, out);
        for input in &self.inputs {
            input.serialize_legacy(out);
        }
        CompactSize::encode(self.outputs.len() as u64, out);
        for output in &self.outputs {
            output.serialize_legacy(out);
        }
    }

    pub fn txid(&self) -> Hash256 {
        *self
            .txid
            .get_or_init(|| double_sha256(&self.serialize_legacy()))
    }

    pub fn wtxid(&self) -> Hash256 {
        *self.wtxid.get_or_init(|| double_sha256(&self.serialize()))
    }

    pub fn has_witness(&self) -> bool {
        self.inputs
            .iter()
            .any(|input| input.witness.as_ref().is_some_and(|stack| !stack.is_empty()))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn encoding(&self) -> TxEncoding {
        self.encoding
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    /// Offset of the first version byte in the source the transaction was decoded from.
    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Sum of the output values in satoshis, or `None` if it overflows an `i64`.
    pub fn total_output_value(&self) -> Option<i64> {
        self.outputs
            .iter()
            .try_fold(0i64, |total, output| total.checked_add(output.value))
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.encoding == other.encoding
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.locktime == other.locktime
            && self.start_pos == other.start_pos
    }
}

impl Eq for Transaction {}

impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Transaction", 8)?;
        state.serialize_field("txid", &self.txid())?;
        state.serialize_field("wtxid", &self.wtxid())?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("encoding", &self.encoding)?;
        state.serialize_field("inputs", &self.inputs)?;
        state.serialize_field("outputs", &self.outputs)?;
        state.serialize_field("locktime", &self.locktime)?;
        state.serialize_field("start_pos", &self.start_pos)?;
        state.end()
    }
}
