use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use bitcoin_blockfile::{block_file_path, ContinuationVarint, Network};
use rusty_leveldb::{Options, DB};
use serde_json::{json, Value};
use tempfile::TempDir;
use test_data_utils::{BlockFileImage, SEGWIT_TXID, SEGWIT_TX_LEGACY};
use tracing::{debug, warn};

pub fn varints(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        ContinuationVarint::encode(*value, &mut out);
    }
    out
}

/// A node data directory on disk: block files under `blocks/` and a real
/// LevelDB at `blocks/index`.
pub struct NodeDataDir {
    dir: TempDir,
}

impl NodeDataDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("blocks").join("index")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.path().join("blocks")
    }

    pub fn write_block_file(&self, number: u32, image: BlockFileImage) {
        fs::write(block_file_path(&self.blocks_dir(), number), image.into_bytes()).unwrap();
    }

    /// Writes the entries and closes the database so a reader can take the lock.
    pub fn write_index(&self, entries: &[(Vec<u8>, Vec<u8>)]) {
        let mut options = Options::default();
        options.create_if_missing = true;
        let mut db = DB::open(self.blocks_dir().join("index"), options).unwrap();
        for (key, value) in entries {
            db.put(key, value).unwrap();
        }
        db.flush().unwrap();
        drop(db);
    }
}

pub fn mainnet_image_with(bodies: &[&[u8]], padding: usize) -> (BlockFileImage, Vec<u64>) {
    let mut image = BlockFileImage::new().padding(padding);
    let positions = bodies
        .iter()
        .map(|body| image.push_record(Network::Mainnet.magic(), body))
        .collect();
    (image, positions)
}

pub const RPC_USER: &str = "alice";
pub const RPC_PASS: &str = "secret";
// base64("alice:secret")
const EXPECTED_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";

#[derive(Clone, Default)]
struct StubState {
    requests: Arc<Mutex<Vec<Value>>>,
}

/// A JSON-RPC 1.0 server answering the handful of calls the client makes,
/// the way a node with a small wallet would.
pub struct StubNode {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl StubNode {
    pub async fn start() -> Self {
        let state = StubState::default();
        let requests = state.requests.clone();
        let app = Router::new().route("/", post(handle)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

fn reply(id: &Value, result: Value) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "result": result, "error": null, "id": id })),
    )
}

fn reply_error(
    status: StatusCode,
    id: &Value,
    code: i64,
    message: &str,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "result": null,
            "error": { "code": code, "message": message },
            "id": id,
        })),
    )
}

async fn handle(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == EXPECTED_AUTH);
    if !authorized {
        warn!("Stub node rejected a request with bad credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }

    state.requests.lock().unwrap().push(request.clone());
    let id = &request["id"];
    let params = request["params"].as_array().cloned().unwrap_or_default();

    let method = request["method"].as_str().unwrap_or_default();
    debug!(method, params = params.len(), "Stub node handling request");

    let response = match method {
        "getblockcount" => reply(id, json!(840_000)),
        "listunspent" => reply(
            id,
            json!([{
                "txid": SEGWIT_TXID,
                "vout": 0,
                "address": "bc1qyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3z7ad0d9",
                "scriptPubKey": format!("0014{}", "22".repeat(20)),
                "amount": 0.0005,
                "confirmations": 12,
                "spendable": true,
                "solvable": true
            }]),
        ),
        "getrawmempool" => reply(id, json!([SEGWIT_TXID])),
        "createrawtransaction" => reply(id, json!(hex::encode(SEGWIT_TX_LEGACY))),
        "signrawtransaction" => {
            let raw = params.first().cloned().unwrap_or(Value::Null);
            if params.len() < 2 {
                reply(
                    id,
                    json!({
                        "hex": raw,
                        "complete": false,
                        "errors": [{
                            "txid": "11".repeat(32),
                            "vout": 1,
                            "scriptSig": "",
                            "sequence": 4294967294u32,
                            "error": "Input not found or already spent"
                        }]
                    }),
                )
            } else {
                reply(id, json!({ "hex": raw, "complete": true }))
            }
        }
        "sendrawtransaction" => match params.first().and_then(Value::as_str) {
            Some("00") => reply_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                id,
                -22,
                "TX decode failed",
            ),
            Some("short") => reply(id, json!("abcd")),
            _ => reply(id, json!(SEGWIT_TXID)),
        },
        _ => reply_error(StatusCode::NOT_FOUND, id, -32601, "Method not found"),
    };
    Ok(response)
}
