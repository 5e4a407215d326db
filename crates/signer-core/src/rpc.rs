//! JSON-RPC access to an Ethereum node.
//!
//! The transport is abstracted behind [`RpcTransport`] so the signing flow can
//! run against a real node ([`HttpTransport`], behind the `http` feature) or a
//! scripted double in tests. [`RpcClient`] layers the typed `eth_*` calls the
//! flow needs on top of any transport.
//!
//! Retries and timeouts belong to the transport; the client issues each call
//! exactly once.

use std::sync::Arc;

use alloy_primitives::{B256, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::address::Address;
use crate::error::{Error, Result};

/// A JSON-RPC request: method name and positional params.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    /// The method, e.g. `eth_chainId`.
    pub method: String,

    /// The params array.
    pub params: Value,
}

/// The error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    /// The error code reported by the node.
    pub code: i64,

    /// The human-readable reason reported by the node.
    pub message: String,

    /// Optional extra data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// A JSON-RPC response; exactly one of `result` or `error` is expected.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RpcResponse {
    /// The `result` field.
    #[serde(default)]
    pub result: Option<Value>,

    /// The `error` field.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// A successful response carrying `result`.
    #[must_use]
    pub const fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// A failed response carrying the node's error.
    #[must_use]
    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A request/response channel to a JSON-RPC node.
///
/// Implementations return `Err` only for transport-level failures (connection,
/// timeout, unparseable body). A well-formed response carrying an `error`
/// object is returned as `Ok`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Sends one request and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcUnavailable`] on transport failure.
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse>;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse> {
        (**self).request(request).await
    }
}

/// Typed `eth_*` calls over an [`RpcTransport`].
#[derive(Debug, Clone)]
pub struct RpcClient<T> {
    transport: T,
}

impl<T: RpcTransport> RpcClient<T> {
    /// Wraps a transport.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a call and returns either the `result` or the node's error object.
    async fn call_raw(
        &self,
        method: &str,
        params: Value,
    ) -> Result<core::result::Result<Value, RpcErrorObject>> {
        debug!(method, "issuing JSON-RPC call");

        let response = self
            .transport
            .request(RpcRequest {
                method: method.to_string(),
                params,
            })
            .await?;

        match (response.result, response.error) {
            (_, Some(error)) => Ok(Err(error)),
            (Some(result), None) => Ok(Ok(result)),
            (None, None) => Err(Error::rpc(method, "missing result field")),
        }
    }

    /// Sends a call and returns its `result`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcUnavailable`] on transport failure or when the node
    /// answers with an error object.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_raw(method, params).await?.map_err(|error| {
            Error::rpc(method, format!("node error {}: {}", error.code, error.message))
        })
    }

    /// `eth_chainId`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcUnavailable`] if the call fails or the result is
    /// not a quantity.
    pub async fn chain_id(&self) -> Result<u64> {
        const METHOD: &str = "eth_chainId";
        let result = self.call(METHOD, json!([])).await?;
        parse_u64(METHOD, &result)
    }

    /// `eth_estimateGas` for a call from `from` to `to` at the latest block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcUnavailable`] if the call fails or the result is
    /// not a quantity.
    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &Bytes,
    ) -> Result<u64> {
        const METHOD: &str = "eth_estimateGas";
        let call = json!({
            "from": from.to_hex(),
            "to": to.to_hex(),
            "value": format!("0x{value:x}"),
            "data": format!("0x{}", hex::encode(data)),
        });
        let result = self.call(METHOD, json!([call, "latest"])).await?;
        parse_u64(METHOD, &result)
    }

    /// `eth_getTransactionCount` for `address` at the latest block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcUnavailable`] if the call fails or the result is
    /// not a quantity.
    pub async fn transaction_count(&self, address: Address) -> Result<u64> {
        const METHOD: &str = "eth_getTransactionCount";
        let result = self
            .call(METHOD, json!([address.to_hex(), "latest"]))
            .await?;
        parse_u64(METHOD, &result)
    }

    /// `eth_gasPrice`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RpcUnavailable`] if the call fails or the result is
    /// not a quantity.
    pub async fn gas_price(&self) -> Result<U256> {
        const METHOD: &str = "eth_gasPrice";
        let result = self.call(METHOD, json!([])).await?;
        parse_u256(METHOD, &result)
    }

    /// `eth_sendRawTransaction`; returns the transaction hash reported by the
    /// node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BroadcastRejected`] with the node's message, verbatim,
    /// when the node refuses the transaction, and [`Error::RpcUnavailable`]
    /// on transport failure or an unparseable result.
    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<B256> {
        const METHOD: &str = "eth_sendRawTransaction";
        let result = self
            .call_raw(METHOD, json!([format!("0x{}", hex::encode(raw_tx))]))
            .await?
            .map_err(|error| Error::BroadcastRejected {
                reason: error.message,
            })?;

        let hash = result
            .as_str()
            .ok_or_else(|| Error::rpc(METHOD, format!("returned non-string: {result}")))?;
        hash.parse()
            .map_err(|e| Error::rpc(METHOD, format!("invalid transaction hash {hash}: {e}")))
    }
}

/// Strips the `0x` prefix of a JSON quantity.
fn quantity_digits<'a>(method: &str, value: &'a Value) -> Result<&'a str> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::rpc(method, format!("returned non-string: {value}")))?;
    s.strip_prefix("0x")
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| Error::rpc(method, format!("invalid quantity: {s}")))
}

fn parse_u64(method: &str, value: &Value) -> Result<u64> {
    let digits = quantity_digits(method, value)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::rpc(method, format!("invalid quantity 0x{digits}: {e}")))
}

fn parse_u256(method: &str, value: &Value) -> Result<U256> {
    let digits = quantity_digits(method, value)?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| Error::rpc(method, format!("invalid quantity 0x{digits}: {e}")))
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::{RpcRequest, RpcResponse, RpcTransport};
    use crate::error::{Error, Result};

    /// JSON-RPC 2.0 over HTTP POST.
    #[derive(Debug)]
    pub struct HttpTransport {
        client: reqwest::Client,
        url: String,
        next_id: AtomicU64,
    }

    impl HttpTransport {
        /// Creates a transport posting to `url` with a per-request timeout.
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidConfig`] if the HTTP client cannot be built.
        pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
            Ok(Self {
                client,
                url: url.into(),
                next_id: AtomicU64::new(1),
            })
        }
    }

    #[async_trait]
    impl RpcTransport for HttpTransport {
        async fn request(&self, request: RpcRequest) -> Result<RpcResponse> {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let method = request.method;
            let payload = json!({
                "jsonrpc": "2.0",
                "method": &method,
                "params": request.params,
                "id": id,
            });

            let response = self
                .client
                .post(&self.url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| Error::rpc(&method, format!("request failed: {e}")))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::rpc(&method, format!("failed to read body: {e}")))?;

            // Some nodes pair an error object with a non-2xx status; keep it.
            match serde_json::from_str::<RpcResponse>(&body) {
                Ok(parsed) if status.is_success() || parsed.error.is_some() => Ok(parsed),
                Ok(_) => Err(Error::rpc(&method, format!("HTTP {status}: {body}"))),
                Err(e) if status.is_success() => {
                    Err(Error::rpc(&method, format!("invalid JSON response: {e}")))
                }
                Err(_) => Err(Error::rpc(&method, format!("HTTP {status}: {body}"))),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use serde_json::Value;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};
        use tokio::task::JoinHandle;

        use super::*;
        use crate::rpc::RpcClient;

        /// Answers exactly one HTTP request with `status` and `body`, and
        /// hands back the JSON body the client posted.
        async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Value>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let posted = read_body(&mut stream).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
                serde_json::from_slice(&posted).unwrap()
            });

            (url, handle)
        }

        async fn read_body(stream: &mut TcpStream) -> Vec<u8> {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed mid-request");
                buf.extend_from_slice(&chunk[..n]);

                let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return buf[end + 4..end + 4 + length].to_vec();
                }
            }
        }

        fn transport(url: String) -> HttpTransport {
            HttpTransport::new(url, Duration::from_secs(5)).unwrap()
        }

        #[tokio::test]
        async fn posts_json_rpc_envelope() {
            let (url, server) = serve_once("200 OK", r#"{"jsonrpc":"2.0","id":1,"result":"0x89"}"#).await;
            let client = RpcClient::new(transport(url));

            assert_eq!(client.chain_id().await.unwrap(), 137);

            let posted = server.await.unwrap();
            assert_eq!(posted["jsonrpc"], "2.0");
            assert_eq!(posted["method"], "eth_chainId");
            assert_eq!(posted["params"], json!([]));
            assert_eq!(posted["id"], 1);
        }

        #[tokio::test]
        async fn error_object_on_error_status_is_kept() {
            let (url, server) = serve_once(
                "500 Internal Server Error",
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
            )
            .await;
            let client = RpcClient::new(transport(url));

            let err = client.send_raw_transaction(&[0x02, 0xc0]).await.unwrap_err();

            assert!(matches!(err, Error::BroadcastRejected { ref reason } if reason == "nonce too low"));
            assert_eq!(server.await.unwrap()["method"], "eth_sendRawTransaction");
        }

        #[tokio::test]
        async fn non_json_error_status_is_unavailable() {
            let (url, server) = serve_once("502 Bad Gateway", "upstream down").await;

            let err = transport(url)
                .request(RpcRequest {
                    method: "eth_gasPrice".to_string(),
                    params: json!([]),
                })
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                Error::RpcUnavailable { ref method, ref reason }
                    if method == "eth_gasPrice" && reason.contains("502")
            ));
            server.await.unwrap();
        }

        #[tokio::test]
        async fn unreachable_node_is_unavailable() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);

            let err = transport(url)
                .request(RpcRequest {
                    method: "eth_chainId".to_string(),
                    params: json!([]),
                })
                .await
                .unwrap_err();

            assert!(matches!(err, Error::RpcUnavailable { ref method, .. } if method == "eth_chainId"));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// A scripted node: pops one queued response per request and records the
    /// methods it was asked for.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        responses: Mutex<VecDeque<Result<RpcResponse>>>,
        requests: Mutex<Vec<RpcRequest>>,
    }

    impl MockTransport {
        pub(crate) fn new(responses: Vec<Result<RpcResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::default(),
            }
        }

        pub(crate) fn methods(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.method.clone())
                .collect()
        }

        pub(crate) fn requests(&self) -> Vec<RpcRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn request(&self, request: RpcRequest) -> Result<RpcResponse> {
            let method = request.method.clone();
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::rpc(&method, "no scripted response")))
        }
    }

    fn ok(value: Value) -> Result<RpcResponse> {
        Ok(RpcResponse::success(value))
    }

    #[tokio::test]
    async fn quantities_are_parsed() {
        let client = RpcClient::new(MockTransport::new(vec![
            ok(json!("0x1")),
            ok(json!("0x3b9aca00")),
        ]));

        assert_eq!(client.chain_id().await.unwrap(), 1);
        assert_eq!(
            client.gas_price().await.unwrap(),
            U256::from(1_000_000_000u64)
        );
    }

    #[tokio::test]
    async fn estimate_gas_sends_call_object() {
        let client = RpcClient::new(MockTransport::new(vec![ok(json!("0x5208"))]));
        let from = Address::new([0x01; 20]);
        let to = Address::new([0x02; 20]);

        let gas = client
            .estimate_gas(from, to, U256::ZERO, &Bytes::from_static(&[0xab]))
            .await
            .unwrap();
        assert_eq!(gas, 21000);

        let requests = client.transport().requests();
        assert_eq!(requests[0].method, "eth_estimateGas");
        assert_eq!(
            requests[0].params,
            json!([{
                "from": from.to_hex(),
                "to": to.to_hex(),
                "value": "0x0",
                "data": "0xab",
            }, "latest"])
        );
    }

    #[tokio::test]
    async fn node_error_is_rpc_unavailable() {
        let client = RpcClient::new(MockTransport::new(vec![Ok(RpcResponse::failure(
            -32000,
            "execution reverted",
        ))]));

        let err = client.transaction_count(Address::zero()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::RpcUnavailable { ref method, ref reason }
                if method == "eth_getTransactionCount" && reason.contains("execution reverted")
        ));
    }

    #[tokio::test]
    async fn unparseable_results_are_rpc_unavailable() {
        let client = RpcClient::new(MockTransport::new(vec![
            ok(json!(1)),
            ok(json!("0x")),
            ok(json!("0xzz")),
            Ok(RpcResponse::default()),
        ]));

        for _ in 0..4 {
            assert!(matches!(
                client.chain_id().await,
                Err(Error::RpcUnavailable { .. })
            ));
        }
    }

    #[tokio::test]
    async fn send_raw_transaction_rejection_keeps_reason() {
        let client = RpcClient::new(MockTransport::new(vec![Ok(RpcResponse::failure(
            -32000,
            "nonce too low",
        ))]));

        let err = client.send_raw_transaction(&[0x02, 0xc0]).await.unwrap_err();
        assert!(matches!(err, Error::BroadcastRejected { ref reason } if reason == "nonce too low"));
        assert_eq!(
            client.transport().requests()[0].params,
            json!(["0x02c0"])
        );
    }

    #[tokio::test]
    async fn send_raw_transaction_parses_hash() {
        let hash = B256::repeat_byte(0x5a);
        let client = RpcClient::new(MockTransport::new(vec![ok(json!(hash.to_string()))]));

        assert_eq!(client.send_raw_transaction(&[0x02]).await.unwrap(), hash);
    }
}
