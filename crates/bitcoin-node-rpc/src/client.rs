//! Async JSON-RPC surface of a Bitcoin node.
//!
//! An implementation provides `call()`; the typed helpers on [`NodeRpc`] are
//! built on top of it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bitcoin_blockfile::{Hash256, Network};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, RpcError};
use crate::types::{RawTransaction, RpcResponse, SignedTransaction, UnspentOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub network: Network,
}

impl RpcConfig {
    /// Local node on the network's default port, with empty credentials.
    pub fn new(network: Network) -> Self {
        RpcConfig {
            host: "127.0.0.1".to_string(),
            port: network.default_rpc_port(),
            user: String::new(),
            pass: String::new(),
            network,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Sends one request and returns its `result`.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;

    async fn call_as<T>(&self, method: &str, params: Vec<Value>) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Fails unless the node answers; returns its block count.
    async fn check(&self) -> Result<u64> {
        self.call_as("getblockcount", vec![]).await
    }

    async fn list_unspent(&self) -> Result<Vec<UnspentOutput>> {
        self.call_as("listunspent", vec![]).await
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Hash256>> {
        self.call_as("getrawmempool", vec![]).await
    }

    /// `outputs` maps addresses to amounts in whole coins.
    async fn create_raw_transaction(
        &self,
        inputs: &[UnspentOutput],
        outputs: &BTreeMap<String, f64>,
    ) -> Result<RawTransaction> {
        let inputs: Vec<Value> = inputs
            .iter()
            .map(|utxo| json!({ "txid": utxo.txid, "vout": utxo.vout }))
            .collect();
        let raw: String = self
            .call_as("createrawtransaction", vec![json!(inputs), json!(outputs)])
            .await?;
        RawTransaction::from_hex(&raw)
    }

    async fn sign_raw_transaction(
        &self,
        tx: &RawTransaction,
        prev_outputs: &[UnspentOutput],
    ) -> Result<SignedTransaction> {
        let raw = tx.to_hex()?;
        debug!(raw = %raw, "Signing raw transaction");

        let mut params = vec![json!(raw)];
        if !prev_outputs.is_empty() {
            params.push(serde_json::to_value(prev_outputs)?);
        }

        let signed: SignedTransaction = self.call_as("signrawtransaction", params).await?;
        if let Some(error) = signed.errors.first() {
            return Err(RpcError::SigningFailed(error.error.clone()));
        }
        if !signed.complete {
            return Err(RpcError::SigningIncomplete);
        }
        Ok(signed)
    }

    async fn send_raw_transaction(&self, raw: &str) -> Result<Hash256> {
        let txid: String = self.call_as("sendrawtransaction", vec![json!(raw)]).await?;
        if txid.len() != 64 {
            return Err(RpcError::InvalidTxid(txid));
        }
        Hash256::from_display_hex(&txid).map_err(|_| RpcError::InvalidTxid(txid))
    }
}

/// [`NodeRpc`] over HTTP with basic auth.
pub struct NodeRpcClient {
    config: RpcConfig,
    url: String,
    http: Client,
    next_id: AtomicU64,
}

impl NodeRpcClient {
    pub fn new(config: RpcConfig) -> Self {
        Self {
            url: config.url(),
            config,
            http: Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }
}

#[async_trait]
impl NodeRpc for NodeRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.url, "Sending RPC request");

        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.config.user, Some(&self.config.pass))
            .json(&request)
            .send()
            .await?;

        // the node reports RPC errors with a 4xx/5xx status and a JSON body
        let http_error = response.error_for_status_ref().err();
        let body = response.text().await?;

        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(e) => match http_error {
                Some(http_error) => Err(http_error.into()),
                None => Err(e.into()),
            },
        }
    }
}
