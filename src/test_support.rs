//! Test doubles shared by the unit tests: a scripted in-memory endpoint and a
//! one-shot HTTP stub for exercising the real client.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use crate::api::{MenuSections, RemoteEndpoint, SaveOrderAck};
use crate::cart::CheckoutSnapshot;
use crate::error::{PosError, PosResult};
use crate::models::{Destination, MenuCategory, MenuItem, OrderRecord, OrderStatus};

pub fn menu_item(id: &str, price: u64) -> MenuItem {
    MenuItem {
        id: id.to_string(),
        name: format!("{id} name"),
        price,
        category: MenuCategory::Coffee,
    }
}

pub fn at_minute(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()
}

pub fn order_record(id: &str, status: OrderStatus, minute: u32, quantity: u32) -> OrderRecord {
    OrderRecord {
        id: id.to_string(),
        timestamp: at_minute(minute),
        destination: Destination::Table("3".into()),
        item_name: format!("{id} item"),
        unit_price: 400,
        quantity,
        status,
    }
}

/// In-memory endpoint. Status updates are applied to the stored orders, so
/// the fake behaves like the sheet being the source of truth.
#[derive(Default)]
pub struct FakeEndpoint {
    menu: Mutex<MenuSections>,
    orders: Mutex<Vec<OrderRecord>>,
    saved: Mutex<Vec<CheckoutSnapshot>>,
    status_updates: Mutex<Vec<(String, OrderStatus)>>,
    orders_gate: Mutex<Option<Arc<Notify>>>,
    fail_menu: AtomicBool,
    fail_orders: AtomicBool,
    reject_save: AtomicBool,
    fail_save: AtomicBool,
    fail_updates: AtomicBool,
    get_orders_calls: AtomicUsize,
    parked_orders_calls: AtomicUsize,
}

impl FakeEndpoint {
    pub fn with_orders(orders: Vec<OrderRecord>) -> Self {
        let endpoint = Self::default();
        endpoint.set_orders(orders);
        endpoint
    }

    pub fn set_menu(&self, menu: MenuSections) {
        *self.menu.lock().unwrap() = menu;
    }

    pub fn set_orders(&self, orders: Vec<OrderRecord>) {
        *self.orders.lock().unwrap() = orders;
    }

    pub fn orders(&self) -> Vec<OrderRecord> {
        self.orders.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<CheckoutSnapshot> {
        self.saved.lock().unwrap().clone()
    }

    pub fn status_updates(&self) -> Vec<(String, OrderStatus)> {
        self.status_updates.lock().unwrap().clone()
    }

    pub fn get_orders_calls(&self) -> usize {
        self.get_orders_calls.load(Ordering::SeqCst)
    }

    pub fn fail_menu(&self, fail: bool) {
        self.fail_menu.store(fail, Ordering::SeqCst);
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn reject_save(&self, reject: bool) {
        self.reject_save.store(reject, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_orders` calls currently waiting on a hold gate.
    pub fn parked_orders_calls(&self) -> usize {
        self.parked_orders_calls.load(Ordering::SeqCst)
    }

    /// Make `get_orders` capture its response and then wait on the returned
    /// handle before answering.
    pub fn hold_orders(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.orders_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl RemoteEndpoint for FakeEndpoint {
    async fn get_menu(&self) -> PosResult<MenuSections> {
        if self.fail_menu.load(Ordering::SeqCst) {
            return Err(PosError::Network("Cannot reach order endpoint".into()));
        }
        Ok(self.menu.lock().unwrap().clone())
    }

    async fn get_orders(&self) -> PosResult<Vec<OrderRecord>> {
        self.get_orders_calls.fetch_add(1, Ordering::SeqCst);
        let response = if self.fail_orders.load(Ordering::SeqCst) {
            Err(PosError::Network("Connection to fake timed out".into()))
        } else {
            Ok(self.orders.lock().unwrap().clone())
        };
        let gate = self.orders_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.parked_orders_calls.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.parked_orders_calls.fetch_sub(1, Ordering::SeqCst);
        }
        response
    }

    async fn save_order(&self, snapshot: &CheckoutSnapshot) -> PosResult<SaveOrderAck> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(PosError::Network("Cannot reach order endpoint".into()));
        }
        if self.reject_save.load(Ordering::SeqCst) {
            return Err(PosError::RemoteRejected {
                action: "saveOrder",
                message: "sheet locked".into(),
            });
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(snapshot.clone());
        Ok(SaveOrderAck {
            order_number: Some(saved.len().to_string()),
        })
    }

    async fn update_status(&self, record_id: &str, status: OrderStatus) -> PosResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PosError::Network("Connection to fake timed out".into()));
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((record_id.to_string(), status));
        for record in self.orders.lock().unwrap().iter_mut() {
            if record.id == record_id {
                record.status = status;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP stub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers.
    pub head: String,
    pub body: String,
}

/// Serve one canned `(status, body)` response per connection, in order, and
/// record each request. Returns the `/exec` URL of the stub.
pub async fn spawn_stub_http(
    responses: Vec<(u16, String)>,
) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut socket).await;
            sink.lock().unwrap().push(request);
            let reason = if status < 400 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}/exec"), captured)
}

async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break buf.len(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = (header_end + 4).min(buf.len());
    while buf.len() < body_start + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body_end = (body_start + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[body_start..body_end]).to_string();

    CapturedRequest { head, body }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
