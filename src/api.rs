//! Spreadsheet endpoint client.
//!
//! The endpoint is a single URL dispatching on an `action` parameter. Reads go
//! out as `GET ?action=...`; writes are `POST`ed either as a flat JSON body or
//! form-encoded (`action` + JSON `payload` field), depending on the configured
//! [`Transport`]. Every call reads the `{success, error?}` envelope back: there
//! is no fire-and-forget mode.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cart::CheckoutSnapshot;
use crate::error::{PosError, PosResult};
use crate::models::{MenuItem, OrderRecord, OrderStatus};
use crate::settings::RegisterSettings;

/// Menu as published by `getMenu`: category key -> items.
pub type MenuSections = BTreeMap<String, Vec<MenuItem>>;

/// How write requests are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// `application/json` body with `action` alongside the payload fields.
    #[default]
    Json,
    /// Form-encoded `action` and `payload` (JSON string). Avoids the CORS
    /// preflight some spreadsheet hosts refuse.
    #[serde(alias = "form-urlencoded")]
    Form,
}

impl Transport {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "json" => Some(Transport::Json),
            "form" | "form-urlencoded" => Some(Transport::Form),
            _ => None,
        }
    }
}

/// Acknowledgement of a saved order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOrderAck {
    pub order_number: Option<String>,
}

/// The four operations of the remote collaborator.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn get_menu(&self) -> PosResult<MenuSections>;
    async fn get_orders(&self) -> PosResult<Vec<OrderRecord>>;
    async fn save_order(&self, snapshot: &CheckoutSnapshot) -> PosResult<SaveOrderAck>;
    async fn update_status(&self, record_id: &str, status: OrderStatus) -> PosResult<()>;
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the endpoint URL:
/// - trim whitespace
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_endpoint_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach order endpoint at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid order endpoint URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 | 403 => format!(
            "Order endpoint refused access (HTTP {}); check the deployment permissions",
            status.as_u16()
        ),
        404 => "Order endpoint not found (HTTP 404)".to_string(),
        s if s >= 500 => format!("Order endpoint server error (HTTP {s})"),
        s => format!("Unexpected response from order endpoint (HTTP {s})"),
    }
}

/// Check the `{success, error?}` envelope of a response body and return the
/// parsed JSON on success.
pub(crate) fn parse_envelope(action: &'static str, body: &str) -> PosResult<Value> {
    let json: Value = serde_json::from_str(body.trim()).map_err(|e| {
        PosError::Network(format!("Invalid JSON from order endpoint for {action}: {e}"))
    })?;

    if json.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(json);
    }

    let message = json
        .get("error")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("request failed")
        .to_string();
    Err(PosError::RemoteRejected { action, message })
}

/// Decode the `data` member of a successful envelope. A missing or null
/// `data` yields the type's default (empty list / empty map).
fn decode_data<T>(action: &'static str, envelope: &Value) -> PosResult<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match envelope.get("data") {
        None | Some(Value::Null) => Ok(T::default()),
        Some(data) => serde_json::from_value(data.clone()).map_err(|e| {
            PosError::Network(format!("Malformed {action} data from order endpoint: {e}"))
        }),
    }
}

/// Decode each row on its own. A row that does not decode is logged with its
/// position and skipped; the rest of the sheet still comes through.
fn decode_rows<T: DeserializeOwned>(
    action: &'static str,
    section: &str,
    rows: Vec<Value>,
) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(row, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(action, section, row, error = %e, "skipping malformed row");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        warn!(
            action,
            section,
            skipped = total - decoded.len(),
            kept = decoded.len(),
            "some rows were skipped"
        );
    }
    decoded
}

fn decode_orders(envelope: &Value) -> PosResult<Vec<OrderRecord>> {
    let rows: Vec<Value> = decode_data("getOrders", envelope)?;
    Ok(decode_rows("getOrders", "orders", rows))
}

fn decode_menu(envelope: &Value) -> PosResult<MenuSections> {
    let raw: BTreeMap<String, Vec<Value>> = decode_data("getMenu", envelope)?;
    Ok(raw
        .into_iter()
        .map(|(key, items)| {
            let items = decode_rows("getMenu", &key, items);
            (key, items)
        })
        .collect())
}

fn order_number_from(envelope: &Value) -> Option<String> {
    match envelope.get("orderNumber")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmittedLine<'a> {
    id: &'a str,
    name: &'a str,
    price: u64,
    quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveOrderPayload<'a> {
    table_number: &'a str,
    items: Vec<SubmittedLine<'a>>,
    total_amount: u64,
    total_count: u64,
    received_amount: u64,
    change_amount: u64,
}

impl<'a> SaveOrderPayload<'a> {
    fn from_snapshot(snapshot: &'a CheckoutSnapshot) -> Self {
        Self {
            table_number: snapshot.destination.as_wire(),
            items: snapshot
                .lines
                .iter()
                .map(|line| SubmittedLine {
                    id: &line.item_id,
                    name: &line.name,
                    price: line.unit_price,
                    quantity: line.quantity,
                })
                .collect(),
            total_amount: snapshot.total_amount,
            total_count: snapshot.total_count,
            received_amount: snapshot.tendered_amount,
            change_amount: snapshot.change,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStatusPayload<'a> {
    unique_id: &'a str,
    new_status: &'a str,
}

// ---------------------------------------------------------------------------
// HTTP endpoint
// ---------------------------------------------------------------------------

/// Default timeout for endpoint requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`RemoteEndpoint`] over HTTP.
pub struct HttpEndpoint {
    base_url: String,
    transport: Transport,
    client: Client,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, transport: Transport) -> PosResult<Self> {
        Self::with_timeout(base_url, transport, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, transport: Transport, timeout: Duration) -> PosResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PosError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, transport, client))
    }

    pub fn with_client(base_url: &str, transport: Transport, client: Client) -> Self {
        Self {
            base_url: normalize_endpoint_url(base_url),
            transport,
            client,
        }
    }

    pub fn from_settings(settings: &RegisterSettings) -> PosResult<Self> {
        Self::with_timeout(
            &settings.endpoint_url,
            settings.transport,
            settings.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    fn read_request(&self, action: &'static str) -> RequestBuilder {
        self.client
            .get(&self.base_url)
            .query(&[("action", action)])
    }

    fn write_request<P: Serialize>(
        &self,
        action: &'static str,
        payload: &P,
    ) -> PosResult<RequestBuilder> {
        let mut body = serde_json::to_value(payload)
            .map_err(|e| PosError::Network(format!("Failed to encode {action} payload: {e}")))?;
        let request = self.client.post(&self.base_url);
        match self.transport {
            Transport::Json => {
                if let Value::Object(ref mut fields) = body {
                    fields.insert("action".to_string(), Value::String(action.to_string()));
                }
                Ok(request.json(&body))
            }
            Transport::Form => {
                let encoded = body.to_string();
                Ok(request.form(&[("action", action), ("payload", encoded.as_str())]))
            }
        }
    }

    async fn execute(&self, action: &'static str, request: RequestBuilder) -> PosResult<Value> {
        let start = Instant::now();
        let resp = request
            .send()
            .await
            .map_err(|e| PosError::Network(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            warn!(
                action,
                status = status.as_u16(),
                latency_ms,
                "order endpoint returned non-success status"
            );
            let detail = if body_text.trim().is_empty() {
                status_error(status)
            } else {
                format!("{}: {}", status_error(status), body_text.trim())
            };
            return Err(PosError::Network(detail));
        }

        let body_text = resp
            .text()
            .await
            .map_err(|e| PosError::Network(friendly_error(&self.base_url, &e)))?;
        debug!(action, latency_ms, bytes = body_text.len(), "order endpoint responded");
        parse_envelope(action, &body_text)
    }
}

#[async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn get_menu(&self) -> PosResult<MenuSections> {
        let envelope = self.execute("getMenu", self.read_request("getMenu")).await?;
        decode_menu(&envelope)
    }

    async fn get_orders(&self) -> PosResult<Vec<OrderRecord>> {
        let envelope = self
            .execute("getOrders", self.read_request("getOrders"))
            .await?;
        decode_orders(&envelope)
    }

    async fn save_order(&self, snapshot: &CheckoutSnapshot) -> PosResult<SaveOrderAck> {
        let payload = SaveOrderPayload::from_snapshot(snapshot);
        let request = self.write_request("saveOrder", &payload)?;
        let envelope = self.execute("saveOrder", request).await?;
        Ok(SaveOrderAck {
            order_number: order_number_from(&envelope),
        })
    }

    async fn update_status(&self, record_id: &str, status: OrderStatus) -> PosResult<()> {
        let payload = UpdateStatusPayload {
            unique_id: record_id,
            new_status: status.as_str(),
        };
        let request = self.write_request("updateStatus", &payload)?;
        self.execute("updateStatus", request).await.map(|_| ())
    }
}
