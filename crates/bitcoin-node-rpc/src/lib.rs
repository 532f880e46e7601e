pub mod client;
pub mod error;
pub mod types;

pub use client::{NodeRpc, NodeRpcClient, RpcConfig};
pub use error::{Result, RpcError};
pub use types::{
    RawTransaction, RawTxIn, RawTxOut, RpcErrorObject, SignedTransaction, SigningError,
    UnspentOutput,
};
