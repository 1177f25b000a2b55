//! Register controller: menu, cart and checkout for one terminal.
//!
//! Checkout snapshots the cart, submits the snapshot, and clears the cart
//! only once the endpoint has confirmed the save. A failed save leaves every
//! line, the destination and the tender in place so staff can retry.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::RemoteEndpoint;
use crate::cart::{CartState, TableKey, TenderKey};
use crate::error::{PosError, PosResult};
use crate::menu::{load_menu, MenuCatalog};
use crate::models::Destination;

/// Outcome of a saved order, shown to staff on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_number: Option<String>,
    pub destination: Destination,
    pub total_amount: u64,
    pub total_count: u64,
    pub tendered_amount: u64,
    pub change: u64,
}

pub struct Register<E: RemoteEndpoint + ?Sized> {
    endpoint: Arc<E>,
    menu: MenuCatalog,
    cart: CartState,
}

impl<E: RemoteEndpoint + ?Sized> Register<E> {
    pub fn new(endpoint: Arc<E>) -> Self {
        Self {
            endpoint,
            menu: MenuCatalog::default(),
            cart: CartState::new(),
        }
    }

    /// Fetch the menu. Returns the number of items available for sale.
    pub async fn load_menu(&mut self) -> usize {
        self.menu = load_menu(self.endpoint.as_ref()).await;
        self.menu.item_count()
    }

    pub fn menu(&self) -> &MenuCatalog {
        &self.menu
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    pub fn add_item_by_id(&mut self, item_id: &str) -> PosResult<()> {
        let item = self
            .menu
            .find(item_id)
            .ok_or_else(|| PosError::UnknownMenuItem(item_id.to_string()))?;
        self.cart.add_item(item);
        Ok(())
    }

    pub fn increment_line(&mut self, item_id: &str) {
        self.cart.increment_line(item_id);
    }

    pub fn decrement_line(&mut self, item_id: &str) {
        self.cart.decrement_line(item_id);
    }

    pub fn remove_line(&mut self, item_id: &str) {
        self.cart.remove_line(item_id);
    }

    pub fn press_table_key(&mut self, key: TableKey) {
        self.cart.press_table_key(key);
    }

    pub fn press_tender_key(&mut self, key: TenderKey) {
        self.cart.press_tender_key(key);
    }

    pub fn can_checkout(&self) -> bool {
        self.cart.can_checkout()
    }

    /// Drop the order in progress.
    pub fn cancel_order(&mut self) {
        if !self.cart.is_empty() {
            info!(lines = self.cart.lines().len(), "order cancelled");
        }
        self.cart.clear();
    }

    /// Validate, submit and, only on success, clear the cart.
    pub async fn checkout(&mut self) -> PosResult<CheckoutReceipt> {
        let snapshot = self.cart.snapshot()?;
        info!(
            attempt_id = %snapshot.attempt_id,
            destination = %snapshot.destination,
            total_amount = snapshot.total_amount,
            total_count = snapshot.total_count,
            "submitting order"
        );

        match self.endpoint.save_order(&snapshot).await {
            Ok(ack) => {
                self.cart.clear();
                info!(
                    attempt_id = %snapshot.attempt_id,
                    order_number = ack.order_number.as_deref().unwrap_or("-"),
                    change = snapshot.change,
                    "order saved"
                );
                Ok(CheckoutReceipt {
                    order_number: ack.order_number,
                    destination: snapshot.destination,
                    total_amount: snapshot.total_amount,
                    total_count: snapshot.total_count,
                    tendered_amount: snapshot.tendered_amount,
                    change: snapshot.change,
                })
            }
            Err(e) => {
                warn!(
                    attempt_id = %snapshot.attempt_id,
                    error = %e,
                    "order save failed, cart kept for retry"
                );
                Err(e)
            }
        }
    }
}
