//! Shapes exchanged with the node, and the conversion between the node's
//! decoded raw transaction view and legacy transaction bytes.

use bitcoin_blockfile::transaction::COIN;
use bitcoin_blockfile::{Cursor, Hash256, Transaction, TxInput, TxOutput};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcError};

const MAX_MONEY: i64 = 21_000_000 * COIN;

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub(crate) fn into_result(self) -> Result<serde_json::Value> {
        if let Some(error) = self.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result.ok_or(RpcError::MissingResult)
    }
}

/// Entry of `listunspent`. Also accepted as a previous output by `signrawtransaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: Hash256,
    pub vout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        rename = "scriptPubKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub script_pub_key: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub spendable: bool,
    #[serde(default)]
    pub solvable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTxIn {
    pub txid: Hash256,
    pub vout: u32,
    #[serde(rename = "scriptSig")]
    pub script_sig: String,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTxOut {
    /// Amount in whole coins.
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
}

/// A legacy transaction with txids and scripts as hex and amounts in coins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<RawTxIn>,
    pub vout: Vec<RawTxOut>,
}

impl RawTransaction {
    /// Decodes legacy raw transaction hex as returned by `createrawtransaction`.
    pub fn from_hex(raw: &str) -> Result<Self> {
        let bytes = hex::decode(raw.trim())?;
        let tx = Transaction::decode_legacy(&mut Cursor::from_slice(&bytes))?;
        Ok(RawTransaction::from(&tx))
    }

    pub fn to_transaction(&self) -> Result<Transaction> {
        let inputs = self
            .vin
            .iter()
            .map(|input| {
                Ok(TxInput {
                    prev_hash: input.txid,
                    prev_index: input.vout,
                    script: hex::decode(&input.script_sig)?,
                    sequence: input.sequence,
                    witness: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let outputs = self
            .vout
            .iter()
            .map(|output| {
                Ok(TxOutput {
                    value: coins_to_sats(output.value)?,
                    script: hex::decode(&output.script_pub_key)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Transaction::new(self.version, inputs, outputs, self.locktime))
    }

    /// Legacy serialisation as hex, the form `signrawtransaction` expects.
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.to_transaction()?.serialize_legacy()))
    }
}

impl From<&Transaction> for RawTransaction {
    fn from(tx: &Transaction) -> Self {
        RawTransaction {
            version: tx.version(),
            locktime: tx.locktime(),
            vin: tx
                .inputs()
                .iter()
                .map(|input| RawTxIn {
                    txid: input.prev_hash,
                    vout: input.prev_index,
                    script_sig: hex::encode(&input.script),
                    sequence: input.sequence,
                })
                .collect(),
            vout: tx
                .outputs()
                .iter()
                .map(|output| RawTxOut {
                    value: output.btc(),
                    script_pub_key: hex::encode(&output.script),
                })
                .collect(),
        }
    }
}

/// Rounds to the nearest satoshi.
pub fn coins_to_sats(value: f64) -> Result<i64> {
    let sats = (value * COIN as f64).round();
    if !sats.is_finite() || sats < 0.0 || sats > MAX_MONEY as f64 {
        return Err(RpcError::InvalidAmount(value));
    }
    Ok(sats as i64)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SigningError {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptSig", default)]
    pub script_sig: String,
    #[serde(default)]
    pub sequence: u32,
    pub error: String,
}

/// Result of `signrawtransaction`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
    #[serde(default)]
    pub errors: Vec<SigningError>,
}
