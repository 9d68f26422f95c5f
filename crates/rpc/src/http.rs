use crate::error::ProviderError;
use crate::multicall::{decode_aggregate3, encode_aggregate3};
use crate::provider::{CallProvider, CallResults, CallSpec};
use alloy_primitives::{Address, Bytes, U64};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// Ethereum JSON-RPC client issuing `eth_call` against the latest block.
///
/// When a Multicall3 address is configured, [`CallProvider::aggregate`]
/// packs a whole chunk into a single `aggregate3` call.
pub struct JsonRpcProvider {
    url: Url,
    http: Client,
    multicall: Option<Address>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcProvider {
    pub fn new(endpoint: impl AsRef<str>, multicall: Option<Address>) -> Result<Self, ProviderError> {
        Self::with_http_client(
            endpoint,
            multicall,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    /// Use an existing reqwest client (custom TLS, proxies, timeouts).
    pub fn with_http_client(
        endpoint: impl AsRef<str>,
        multicall: Option<Address>,
        http: Client,
    ) -> Result<Self, ProviderError> {
        let url = Url::parse(endpoint.as_ref())
            .map_err(|_| ProviderError::InvalidEndpoint(endpoint.as_ref().to_string()))?;
        Ok(Self {
            url,
            http,
            multicall,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }

    pub fn multicall_address(&self) -> Option<Address> {
        self.multicall
    }

    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn eth_call(&self, target: Address, data: &Bytes) -> Result<Bytes, ProviderError> {
        self.request("eth_call", json!([{ "to": target, "data": data }, "latest"]))
            .await
    }

    async fn request<T>(&self, method: &str, params: Value) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let parsed: RpcResponse<T> = response.json().await?;
        match (parsed.result, parsed.error) {
            (_, Some(err)) => Err(map_rpc_error(err)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ProviderError::malformed(format!(
                "{method}: response has neither result nor error"
            ))),
        }
    }
}

fn map_rpc_error(err: RpcErrorObject) -> ProviderError {
    // Geth and most clients use code 3 for reverts; older ones only say so in the message.
    if err.code == 3 || err.message.contains("execution reverted") {
        let detail = err
            .data
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(err.message);
        return ProviderError::Reverted(detail);
    }
    ProviderError::Rpc {
        code: err.code,
        message: err.message,
    }
}

#[async_trait]
impl CallProvider for JsonRpcProvider {
    async fn call(&self, call: &CallSpec) -> Result<Bytes, ProviderError> {
        self.eth_call(call.target, &call.data).await
    }

    async fn aggregate(&self, calls: &[CallSpec]) -> Result<CallResults, ProviderError> {
        let Some(multicall) = self.multicall else {
            let pending = calls.iter().map(|call| self.call(call));
            return Ok(futures::future::join_all(pending).await);
        };
        let raw = self.eth_call(multicall, &encode_aggregate3(calls)).await?;
        decode_aggregate3(&raw, calls.len())
    }
}
