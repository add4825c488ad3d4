//! Bitget REST transport.
//!
//! Signed HTTP access to the Bitget v2 API, implementing [`Transport`].
//!
//! # Authentication
//!
//! Bitget uses API key + secret + passphrase with HMAC SHA256 signatures.
//! All signed requests carry:
//! - `ACCESS-KEY`, `ACCESS-PASSPHRASE` headers
//! - `ACCESS-TIMESTAMP` header (ms)
//! - `ACCESS-SIGN` header: base64 HMAC SHA256 of
//!   `timestamp + METHOD + path[?query] + body`
//!
//! Demo trading (testnet) uses the production host with a `paptrading: 1`
//! header.

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method as HttpMethod, Url};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::debug;
use zeroize::Zeroizing;

use tradeport_domain::ClientConfig;
use tradeport_exec::{
    Auth, ExecError, ExecResult, Method, RawRequest, Transport, TransportError, TransportResult,
};

use crate::bitget_types::BitgetEnvelope;

// =============================================================================
// Constants
// =============================================================================

/// Bitget REST API base URL
const BITGET_API_URL: &str = "https://api.bitget.com";

/// Default request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Envelope code of a successful response
pub const SUCCESS_CODE: &str = "00000";

/// Longest response body kept in an error
const MAX_ERROR_BODY: usize = 512;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Bitget REST Client
// =============================================================================

/// Bitget REST transport.
///
/// Owns its HTTP client exclusively; `close()` drops it.
pub struct BitgetRestClient {
    /// HTTP client, `None` once closed
    client: RwLock<Option<Client>>,
    /// API key
    api_key: String,
    /// API secret
    api_secret: Zeroizing<String>,
    /// API passphrase
    passphrase: Zeroizing<String>,
    /// Route to demo trading
    testnet: bool,
    /// Base URL
    base_url: String,
    /// Per-request timeout
    timeout: Duration,
}

impl BitgetRestClient {
    /// Exchange identifier.
    pub const EXCHANGE_ID: &'static str = "bitget";

    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns `ExecError::Config` if the passphrase is missing or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> ExecResult<Self> {
        let passphrase = config
            .password()
            .ok_or_else(|| ExecError::Config("Bitget requires an API passphrase".to_string()))?;

        let client = Client::builder()
            .build()
            .map_err(|e| ExecError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client: RwLock::new(Some(client)),
            api_key: config.api_key().to_string(),
            api_secret: Zeroizing::new(config.api_secret().to_string()),
            passphrase: Zeroizing::new(passphrase.to_string()),
            testnet: config.testnet(),
            base_url: BITGET_API_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full URL and the `path[?query]` that is signed.
    ///
    /// GET params are percent-encoded once; the signed string carries the
    /// same encoded query the server receives.
    fn target(&self, request: &RawRequest) -> TransportResult<(Url, String)> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|e| TransportError::Network(format!("Invalid URL {}: {}", request.path, e)))?;

        if request.method == Method::Get && !request.params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.params.iter().map(|(k, v)| (k.as_str(), query_value(v))));
        }

        let request_path = match url.query() {
            Some(query) => format!("{}?{}", request.path, query),
            None => request.path.clone(),
        };
        Ok((url, request_path))
    }

    /// Base64 HMAC SHA256 signature of `timestamp + method + path + body`.
    fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> TransportResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| TransportError::Network(format!("HMAC error: {}", e)))?;

        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());

        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Unwrap the Bitget envelope.
    fn parse_response(status: u16, body: &str) -> TransportResult<Value> {
        let success = (200..300).contains(&status);

        match serde_json::from_str::<BitgetEnvelope>(body) {
            Ok(envelope) if envelope.code != SUCCESS_CODE => Err(TransportError::Api {
                code: envelope.code,
                msg: envelope.msg,
            }),
            Ok(envelope) if success => Ok(envelope.data.unwrap_or(Value::Null)),
            Err(e) if success => Err(TransportError::Decode(format!("Failed to parse response: {}", e))),
            _ => Err(TransportError::Http {
                status,
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            }),
        }
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Transport for BitgetRestClient {
    fn exchange_id(&self) -> &str {
        Self::EXCHANGE_ID
    }

    async fn send(&self, request: RawRequest) -> TransportResult<Value> {
        let client = self.client.read().await.clone().ok_or(TransportError::Closed)?;

        let (url, request_path) = self.target(&request)?;
        let (method, body) = match request.method {
            Method::Get => (HttpMethod::GET, String::new()),
            Method::Post => (
                HttpMethod::POST,
                serde_json::to_string(&request.params)
                    .map_err(|e| TransportError::Decode(format!("Failed to encode body: {}", e)))?,
            ),
        };

        let mut builder = client
            .request(method.clone(), url)
            .header("Content-Type", "application/json")
            .header("locale", "en-US");

        if self.testnet {
            builder = builder.header("paptrading", "1");
        }

        if request.auth == Auth::Private {
            let timestamp = Utc::now().timestamp_millis().to_string();
            let sign = self.sign(&timestamp, method.as_str(), &request_path, &body)?;
            builder = builder
                .header("ACCESS-KEY", &self.api_key)
                .header("ACCESS-SIGN", sign)
                .header("ACCESS-TIMESTAMP", timestamp)
                .header("ACCESS-PASSPHRASE", self.passphrase.as_str());
        }

        if !body.is_empty() {
            builder = builder.body(body);
        }

        debug!(method = %method, path = %request_path, "Bitget request");

        let response = timeout(self.timeout, builder.send())
            .await
            .map_err(|_| TransportError::Timeout(format!("{} after {:?}", request_path, self.timeout)))?
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Self::parse_response(status, &text)
    }

    async fn close(&self) -> TransportResult<()> {
        if self.client.write().await.take().is_some() {
            debug!("Bitget HTTP client released");
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BitgetRestClient {
        let config = ClientConfig::new("key", "secret").with_password("pass");
        BitgetRestClient::new(&config).unwrap()
    }

    #[test]
    fn test_passphrase_required() {
        let config = ClientConfig::new("key", "secret");
        assert!(matches!(BitgetRestClient::new(&config), Err(ExecError::Config(_))));
    }

    #[test]
    fn test_request_path_sorts_query() {
        let client = client();
        let request = RawRequest::get("/api/v2/mix/market/ticker")
            .param("symbol", "XRPUSDT")
            .param("productType", "USDT-FUTURES");

        let (url, path) = client.target(&request).unwrap();
        assert_eq!(path, "/api/v2/mix/market/ticker?productType=USDT-FUTURES&symbol=XRPUSDT");
        assert_eq!(url.as_str(), format!("{}{}", BITGET_API_URL, path));

        let post = RawRequest::post("/api/v2/mix/order/place-order").param("size", "5");
        let (url, path) = client.target(&post).unwrap();
        assert_eq!(path, "/api/v2/mix/order/place-order");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_query_values_are_encoded_before_signing() {
        let client = client().with_base_url("http://127.0.0.1:9");
        let request = RawRequest::get("/api/v2/mix/order/detail")
            .param("clientOid", "a&b=c d")
            .param("symbol", "XRPUSDT");

        let (url, path) = client.target(&request).unwrap();
        assert_eq!(path, "/api/v2/mix/order/detail?clientOid=a%26b%3Dc+d&symbol=XRPUSDT");
        assert_eq!(url.query(), Some("clientOid=a%26b%3Dc+d&symbol=XRPUSDT"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("clientOid".to_string(), "a&b=c d".to_string()));

        let raw = client.sign("1", "GET", "/api/v2/mix/order/detail?clientOid=a&b=c d&symbol=XRPUSDT", "").unwrap();
        assert_ne!(client.sign("1", "GET", &path, "").unwrap(), raw);
    }

    #[test]
    fn test_sign_is_deterministic_base64() {
        let client = client();
        let a = client.sign("1700000000000", "GET", "/api/v2/mix/account/accounts", "").unwrap();
        let b = client.sign("1700000000000", "GET", "/api/v2/mix/account/accounts", "").unwrap();
        let c = client.sign("1700000000001", "GET", "/api/v2/mix/account/accounts", "").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        // 32-byte digest
        assert_eq!(base64::engine::general_purpose::STANDARD.decode(&a).unwrap().len(), 32);
    }

    #[test]
    fn test_parse_success_envelope() {
        let body = r#"{"code":"00000","msg":"success","requestTime":1,"data":[{"symbol":"XRPUSDT"}]}"#;
        let data = BitgetRestClient::parse_response(200, body).unwrap();
        assert_eq!(data[0]["symbol"], "XRPUSDT");
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"code":"40762","msg":"The order amount exceeds the balance","data":null}"#;
        let err = BitgetRestClient::parse_response(400, body).unwrap_err();
        assert_eq!(
            err,
            TransportError::Api {
                code: "40762".to_string(),
                msg: "The order amount exceeds the balance".to_string()
            }
        );
    }

    #[test]
    fn test_parse_http_error_without_envelope() {
        let err = BitgetRestClient::parse_response(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, TransportError::Http { status: 502, .. }));

        let err = BitgetRestClient::parse_response(200, "not json").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_requests() {
        let client = client();
        client.close().await.unwrap();
        client.close().await.unwrap();

        let err = client.send(RawRequest::get("/api/v2/public/time")).await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }
}
