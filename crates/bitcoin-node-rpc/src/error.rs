#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response has no result")]
    MissingResult,
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("raw transaction could not be decoded: {0}")]
    RawTransaction(#[from] bitcoin_blockfile::DecodeError),
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("signing incomplete")]
    SigningIncomplete,
    #[error("node returned an invalid txid: {0:?}")]
    InvalidTxid(String),
}

pub type Result<T> = std::result::Result<T, RpcError>;
