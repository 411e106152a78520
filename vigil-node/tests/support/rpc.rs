use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Canned chain served by [`FakeRpcNode`].
#[derive(Debug, Clone)]
pub struct FakeChain {
    pub latest: u64,
    /// Block hashes are `<hash_prefix><block in hex>`.
    pub hash_prefix: String,
    pub supports_trace: bool,
    /// Answer every request with HTTP 503.
    pub down: bool,
}

impl FakeChain {
    pub fn at(latest: u64) -> Self {
        Self {
            latest,
            hash_prefix: "0xfeed".into(),
            supports_trace: false,
            down: false,
        }
    }

    pub fn with_trace(mut self) -> Self {
        self.supports_trace = true;
        self
    }

    pub fn with_hash_prefix(mut self, prefix: &str) -> Self {
        self.hash_prefix = prefix.into();
        self
    }

    pub fn down(mut self) -> Self {
        self.down = true;
        self
    }
}

struct NodeState {
    chain: FakeChain,
    calls: Mutex<Vec<(String, Value)>>,
}

/// Minimal JSON-RPC node on a random local port.
pub struct FakeRpcNode {
    pub url: String,
    state: Arc<NodeState>,
}

impl FakeRpcNode {
    pub async fn spawn(chain: FakeChain) -> Self {
        let state = Arc::new(NodeState {
            chain,
            calls: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/", post(rpc))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Params of every call made with `method`, in order.
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

fn parse_block(raw: &Value) -> Option<u64> {
    let raw = raw.as_str()?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

async fn rpc(
    State(state): State<Arc<NodeState>>,
    Json(request): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    state
        .calls
        .lock()
        .unwrap()
        .push((method.clone(), params.clone()));

    if state.chain.down {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let chain = &state.chain;
    let id = request["id"].clone();
    let result = match method.as_str() {
        "eth_blockNumber" => json!(format!("{:#x}", chain.latest)),
        "eth_getBlockByNumber" => match parse_block(&params[0]) {
            Some(block) if block <= chain.latest => {
                let transactions = if params[1].as_bool().unwrap_or(false) {
                    json!([{ "hash": "0x01" }, { "hash": "0x02" }])
                } else {
                    json!(["0x01", "0x02"])
                };
                json!({
                    "number": params[0],
                    "hash": format!("{}{block:x}", chain.hash_prefix),
                    "transactions": transactions,
                })
            }
            _ => Value::Null,
        },
        "trace_block" if chain.supports_trace => json!([{ "type": "call" }]),
        _ => {
            return Ok(Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" },
            })));
        }
    };

    Ok(Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })))
}
