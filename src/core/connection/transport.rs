/*!
Probe transport for Monero daemon and wallet RPC endpoints.

The manager never speaks HTTP itself. It asks an [`RpcTransport`] to perform one
cheap, side-effect-free exchange against a connection and reports back whether
the endpoint answered, whether it accepted the credentials, and how long it took.

## Built-in transport

`IsahcRpcTransport` (feature `isahc-transport`) posts a JSON-RPC `get_version`
request to `<uri>/json_rpc`:

- HTTP 200 with a `result` member: online and authenticated
- HTTP 401: online, credentials rejected
- anything else, or a transport error: probe failure

Credentials use HTTP digest authentication, as monerod and monero-wallet-rpc expect.
*/

use crate::core::connection::errors::ProbeError;
use crate::core::connection::types::{ProbeResponse, RpcConnection};

#[cfg(feature = "isahc-transport")]
use isahc::auth::{Authentication, Credentials};
#[cfg(feature = "isahc-transport")]
use isahc::config::Configurable;
#[cfg(feature = "isahc-transport")]
use isahc::{AsyncReadResponseExt, HttpClient, Request};
#[cfg(feature = "isahc-transport")]
use std::time::{Duration, Instant};

/// Transport abstraction for dependency injection and testing
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync {
    /// Perform one bounded probe against `connection`
    async fn probe(
        &self,
        connection: &RpcConnection,
        timeout_ms: u32,
    ) -> Result<ProbeResponse, ProbeError>;
}

/// JSON-RPC request body used as the probe
pub fn probe_request_body() -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": "0",
        "method": "get_version"
    })
}

/// Prefix `http://` when the URI carries no scheme
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Build the `/json_rpc` endpoint for a connection URI
pub fn json_rpc_url(uri: &str) -> Result<String, ProbeError> {
    let normalized = normalize_uri(uri);
    let parsed = url::Url::parse(&normalized)
        .map_err(|e| ProbeError::InvalidUri(format!("{}: {}", uri, e)))?;
    if parsed.host_str().is_none() {
        return Err(ProbeError::InvalidUri(uri.to_string()));
    }
    Ok(format!("{}/json_rpc", parsed.as_str().trim_end_matches('/')))
}

/// Interpret an HTTP status and body returned by the probe request
pub fn classify_probe_response(status_code: u16, body: &[u8]) -> Result<bool, ProbeError> {
    match status_code {
        401 => Ok(false),
        200 => {
            let json: serde_json::Value = serde_json::from_slice(body)
                .map_err(|e| ProbeError::InvalidResponse(format!("JSON parse error: {}", e)))?;
            if json.get("result").is_some() {
                return Ok(true);
            }
            let message = json
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("missing result");
            Err(ProbeError::InvalidResponse(message.to_string()))
        }
        other => Err(ProbeError::Request(format!("HTTP {}", other))),
    }
}

/// Production transport using isahc
#[cfg(feature = "isahc-transport")]
pub struct IsahcRpcTransport {
    client: HttpClient,
}

#[cfg(feature = "isahc-transport")]
impl IsahcRpcTransport {
    pub fn new() -> Result<Self, ProbeError> {
        let client = HttpClient::new()
            .map_err(|e| ProbeError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "isahc-transport")]
#[async_trait::async_trait]
impl RpcTransport for IsahcRpcTransport {
    async fn probe(
        &self,
        connection: &RpcConnection,
        timeout_ms: u32,
    ) -> Result<ProbeResponse, ProbeError> {
        let url = json_rpc_url(connection.uri())?;
        let body = serde_json::to_vec(&probe_request_body())
            .map_err(|e| ProbeError::Request(format!("Request encoding failed: {}", e)))?;

        let mut builder = Request::post(&url)
            .timeout(Duration::from_millis(timeout_ms as u64))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let (Some(username), Some(password)) = (connection.username(), connection.password()) {
            builder = builder
                .authentication(Authentication::digest())
                .credentials(Credentials::new(username, password));
        }
        let request = builder
            .body(body)
            .map_err(|e| ProbeError::Request(format!("Request creation failed: {}", e)))?;

        let start = Instant::now();
        let mut response = self.client.send_async(request).await.map_err(|e| {
            if matches!(e.kind(), isahc::error::ErrorKind::Timeout) {
                ProbeError::Timeout { timeout_ms }
            } else {
                ProbeError::Request(e.to_string())
            }
        })?;
        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::Request(format!("Failed to read response body: {}", e)))?;
        let elapsed = start.elapsed();

        let authenticated = classify_probe_response(status_code, &body)?;
        Ok(ProbeResponse {
            authenticated,
            elapsed,
        })
    }
}
