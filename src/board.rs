//! Order board: a polled replica of the order sheet with optimistic status
//! toggles.
//!
//! The board owns one replica of every order row plus a table of local status
//! writes. Fetches replace the replica wholesale, except that a row whose
//! status was written locally keeps the local value until the write is
//! confirmed *and* a fetch that started after the confirmation has come back.
//! That closes the window where a poll issued before a toggle lands after it
//! and reverts the card.
//!
//! All state sits behind one mutex that is never held across a network call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::RemoteEndpoint;
use crate::error::{PosError, PosResult};
use crate::models::{OrderRecord, OrderStatus, MAX_ROW_QUANTITY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardPhase {
    Loading,
    Ready,
    Refreshing,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Delivered,
    Cancelled,
}

impl StatusFilter {
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == OrderStatus::Pending,
            StatusFilter::Delivered => status == OrderStatus::Delivered,
            StatusFilter::Cancelled => status == OrderStatus::Cancelled,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "all" => Some(StatusFilter::All),
            "pending" => Some(StatusFilter::Pending),
            "delivered" => Some(StatusFilter::Delivered),
            "cancelled" | "canceled" => Some(StatusFilter::Cancelled),
            _ => None,
        }
    }
}

/// One card per physical unit of an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCard {
    pub record_id: String,
    pub time_label: String,
    pub destination_label: String,
    pub item_name: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardView {
    Loading,
    Error { message: String },
    Empty,
    Cards(Vec<UnitCard>),
}

/// Filter, order newest first (stable for equal timestamps) and expand each
/// record into `quantity` cards.
pub fn render_cards(records: &[OrderRecord], filter: StatusFilter) -> Vec<UnitCard> {
    let mut visible: Vec<&OrderRecord> = records
        .iter()
        .filter(|record| filter.matches(record.status))
        .collect();
    visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    visible
        .into_iter()
        .flat_map(|record| {
            let card = UnitCard {
                record_id: record.id.clone(),
                time_label: record.timestamp.with_timezone(&Local).format("%H:%M").to_string(),
                destination_label: record.destination.label(),
                item_name: record.item_name.clone(),
                status: record.status,
                status_label: record.status.label(),
            };
            let units = record.quantity.clamp(1, MAX_ROW_QUANTITY) as usize;
            std::iter::repeat(card).take(units)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Board state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalWrite {
    status: OrderStatus,
    /// Epoch at which the write was issued.
    issued: u64,
    /// Epoch at which the endpoint acknowledged it.
    confirmed: Option<u64>,
}

impl LocalWrite {
    /// The sheet is authoritative again once a fetch that started after the
    /// acknowledgement has returned.
    fn settled_by(&self, fetch_started: u64) -> bool {
        self.confirmed.is_some_and(|at| at <= fetch_started)
    }
}

#[derive(Debug)]
struct BoardState {
    phase: BoardPhase,
    replica: Vec<OrderRecord>,
    filter: StatusFilter,
    local_writes: HashMap<String, LocalWrite>,
    /// Bumped on every write issue and acknowledgement.
    epoch: u64,
    last_synced_at: Option<DateTime<Utc>>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            phase: BoardPhase::Loading,
            replica: Vec::new(),
            filter: StatusFilter::All,
            local_writes: HashMap::new(),
            epoch: 0,
            last_synced_at: None,
        }
    }
}

impl BoardState {
    fn apply_fetch(&mut self, mut records: Vec<OrderRecord>, fetch_started: u64) {
        for record in records.iter_mut() {
            if let Some(write) = self.local_writes.get(&record.id) {
                if !write.settled_by(fetch_started) {
                    record.status = write.status;
                }
            }
        }
        self.local_writes
            .retain(|_, write| !write.settled_by(fetch_started));
        self.replica = records;
        self.last_synced_at = Some(Utc::now());
    }

    fn view(&self) -> BoardView {
        match &self.phase {
            BoardPhase::Loading => BoardView::Loading,
            BoardPhase::Error(message) => BoardView::Error {
                message: message.clone(),
            },
            BoardPhase::Ready | BoardPhase::Refreshing => {
                let cards = render_cards(&self.replica, self.filter);
                if cards.is_empty() {
                    BoardView::Empty
                } else {
                    BoardView::Cards(cards)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Board handle
// ---------------------------------------------------------------------------

/// Shared handle to one order board session. Clones refer to the same board.
pub struct OrderBoard<E: RemoteEndpoint + ?Sized> {
    endpoint: Arc<E>,
    state: Arc<Mutex<BoardState>>,
}

impl<E: RemoteEndpoint + ?Sized> Clone for OrderBoard<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: RemoteEndpoint + ?Sized> OrderBoard<E> {
    pub fn new(endpoint: Arc<E>) -> Self {
        Self {
            endpoint,
            state: Arc::new(Mutex::new(BoardState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Full fetch. A failure switches the board to the error view; the last
    /// good replica is kept underneath.
    pub async fn load(&self) -> PosResult<()> {
        let fetch_started = {
            let mut state = self.lock();
            state.phase = BoardPhase::Loading;
            state.epoch
        };

        match self.endpoint.get_orders().await {
            Ok(records) => {
                let mut state = self.lock();
                let count = records.len();
                state.apply_fetch(records, fetch_started);
                state.phase = BoardPhase::Ready;
                info!(records = count, "order board loaded");
                Ok(())
            }
            Err(e) => {
                self.lock().phase = BoardPhase::Error(e.to_string());
                error!(error = %e, "order board load failed");
                Err(e)
            }
        }
    }

    /// Polling fetch. A failure is logged and returned but leaves the replica
    /// and the view exactly as they were.
    pub async fn refresh(&self) -> PosResult<()> {
        let fetch_started = {
            let mut state = self.lock();
            if state.phase == BoardPhase::Loading {
                debug!("order board load in progress, skipping refresh");
                return Ok(());
            }
            if state.phase == BoardPhase::Ready {
                state.phase = BoardPhase::Refreshing;
            }
            state.epoch
        };

        match self.endpoint.get_orders().await {
            Ok(records) => {
                let mut state = self.lock();
                let count = records.len();
                state.apply_fetch(records, fetch_started);
                state.phase = BoardPhase::Ready;
                debug!(
                    records = count,
                    pending_writes = state.local_writes.len(),
                    "order board refreshed"
                );
                Ok(())
            }
            Err(e) => {
                let mut state = self.lock();
                if state.phase == BoardPhase::Refreshing {
                    state.phase = BoardPhase::Ready;
                }
                warn!(error = %e, "order board refresh failed, keeping last good data");
                Err(e)
            }
        }
    }

    /// Advance a record through `pending -> delivered -> cancelled -> pending`.
    ///
    /// The new status shows immediately. If the endpoint refuses the write
    /// the board reloads from the sheet and the write error is returned.
    pub async fn toggle_status(&self, record_id: &str) -> PosResult<OrderStatus> {
        let (next, issued) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let current = state
                .replica
                .iter()
                .find(|record| record.id == record_id)
                .map(|record| record.status)
                .ok_or_else(|| PosError::UnknownOrder(record_id.to_string()))?;
            let next = current.next();

            state.epoch += 1;
            let issued = state.epoch;
            for record in state.replica.iter_mut().filter(|r| r.id == record_id) {
                record.status = next;
            }
            state.local_writes.insert(
                record_id.to_string(),
                LocalWrite {
                    status: next,
                    issued,
                    confirmed: None,
                },
            );
            (next, issued)
        };

        match self.endpoint.update_status(record_id, next).await {
            Ok(()) => {
                let mut state = self.lock();
                state.epoch += 1;
                let confirmed_at = state.epoch;
                if let Some(write) = state.local_writes.get_mut(record_id) {
                    if write.issued == issued {
                        write.confirmed = Some(confirmed_at);
                    }
                }
                info!(record_id, status = %next, "order status updated");
                Ok(next)
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    let ours = state
                        .local_writes
                        .get(record_id)
                        .is_some_and(|write| write.issued == issued);
                    if ours {
                        state.local_writes.remove(record_id);
                    }
                }
                warn!(
                    record_id,
                    status = %next,
                    error = %e,
                    "order status update failed, reloading board"
                );
                if let Err(reload_err) = self.load().await {
                    error!(error = %reload_err, "board reload after failed status update also failed");
                }
                Err(e)
            }
        }
    }

    pub fn set_filter(&self, filter: StatusFilter) {
        self.lock().filter = filter;
    }

    pub fn filter(&self) -> StatusFilter {
        self.lock().filter
    }

    pub fn phase(&self) -> BoardPhase {
        self.lock().phase.clone()
    }

    pub fn view(&self) -> BoardView {
        self.lock().view()
    }

    pub fn records(&self) -> Vec<OrderRecord> {
        self.lock().replica.clone()
    }

    pub fn pending_writes(&self) -> usize {
        self.lock().local_writes.len()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_synced_at
    }
}
