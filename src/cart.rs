//! Order-in-progress state for the register.
//!
//! The cart holds lines, the destination being keyed in and the tendered
//! amount. Totals are always derived from the lines on read. Nothing in this
//! module talks to the network; [`crate::register::Register`] owns the cart
//! and decides when it is safe to clear it.

use serde::Serialize;
use uuid::Uuid;

use crate::error::CheckoutRejection;
use crate::models::{Destination, MenuItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: String,
    pub name: String,
    pub unit_price: u64,
    /// Always >= 1 while the line is in the cart.
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

// ---------------------------------------------------------------------------
// Keypads
// ---------------------------------------------------------------------------

/// Key on the table-number pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKey {
    Digit(u8),
    Takeout,
    Clear,
}

impl TableKey {
    /// Parse a pad label: `0`-`9`, `T` or `C`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "C" | "c" => Some(TableKey::Clear),
            "T" | "t" => Some(TableKey::Takeout),
            other => single_digit(other).map(TableKey::Digit),
        }
    }
}

/// Key on the tendered-amount pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderKey {
    Digit(u8),
    DoubleZero,
    Clear,
}

impl TenderKey {
    /// Parse a pad label: `0`-`9`, `00` or `C`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "C" | "c" => Some(TenderKey::Clear),
            "00" => Some(TenderKey::DoubleZero),
            other => single_digit(other).map(TenderKey::Digit),
        }
    }
}

fn single_digit(label: &str) -> Option<u8> {
    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).map(|d| d as u8),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Cart state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    lines: Vec<CartLine>,
    destination: Option<Destination>,
    tendered_amount: u64,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    pub fn tendered_amount(&self) -> u64 {
        self.tendered_amount
    }

    pub fn total_amount(&self) -> u64 {
        self.lines
            .iter()
            .fold(0u64, |acc, line| acc.saturating_add(line.subtotal()))
    }

    pub fn total_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Change owed to the customer, or `None` while the tender is short.
    pub fn change_due(&self) -> Option<u64> {
        self.tendered_amount.checked_sub(self.total_amount())
    }

    // -- line edits --------------------------------------------------------

    /// Add one unit of `item`, merging into an existing line with the same id.
    pub fn add_item(&mut self, item: &MenuItem) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item.id) {
            line.quantity = line.quantity.saturating_add(1);
            return;
        }
        self.lines.push(CartLine {
            item_id: item.id.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity: 1,
        });
    }

    pub fn increment_line(&mut self, item_id: &str) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item_id) {
            line.quantity = line.quantity.saturating_add(1);
        }
    }

    /// Remove one unit; the line goes away when its last unit does.
    pub fn decrement_line(&mut self, item_id: &str) {
        let Some(idx) = self.lines.iter().position(|l| l.item_id == item_id) else {
            return;
        };
        if self.lines[idx].quantity > 1 {
            self.lines[idx].quantity -= 1;
        } else {
            self.lines.remove(idx);
        }
    }

    pub fn remove_line(&mut self, item_id: &str) {
        self.lines.retain(|l| l.item_id != item_id);
    }

    // -- destination ---------------------------------------------------------

    pub fn set_destination(&mut self, destination: Option<Destination>) {
        self.destination = destination;
    }

    /// Apply a table-pad key. Digits and takeout are mutually exclusive:
    /// a digit typed while takeout is selected starts a fresh table number.
    pub fn press_table_key(&mut self, key: TableKey) {
        match key {
            TableKey::Clear => self.destination = None,
            TableKey::Takeout => self.destination = Some(Destination::Takeout),
            TableKey::Digit(d) => {
                let mut number = match self.destination.take() {
                    Some(Destination::Table(number)) => number,
                    Some(Destination::Takeout) | None => String::new(),
                };
                number.push(char::from(b'0' + d.min(9)));
                self.destination = Some(Destination::Table(number));
            }
        }
    }

    // -- tender --------------------------------------------------------------

    /// Apply a tender-pad key. Digits shift in from the right; `00` multiplies
    /// by one hundred.
    pub fn press_tender_key(&mut self, key: TenderKey) {
        self.tendered_amount = match key {
            TenderKey::Clear => 0,
            TenderKey::DoubleZero => self.tendered_amount.saturating_mul(100),
            TenderKey::Digit(d) => self
                .tendered_amount
                .saturating_mul(10)
                .saturating_add(u64::from(d.min(9))),
        };
    }

    // -- checkout ------------------------------------------------------------

    pub fn validate(&self) -> Result<(), CheckoutRejection> {
        if self.lines.is_empty() {
            return Err(CheckoutRejection::EmptyCart);
        }
        if self.destination.is_none() {
            return Err(CheckoutRejection::NoDestination);
        }
        let total = self.total_amount();
        if self.tendered_amount < total {
            return Err(CheckoutRejection::InsufficientTender {
                tendered: self.tendered_amount,
                total,
            });
        }
        Ok(())
    }

    pub fn can_checkout(&self) -> bool {
        self.validate().is_ok()
    }

    /// Copy everything the endpoint needs. The cart itself is untouched.
    pub fn snapshot(&self) -> Result<CheckoutSnapshot, CheckoutRejection> {
        self.validate()?;
        let total_amount = self.total_amount();
        let destination = self
            .destination
            .clone()
            .ok_or(CheckoutRejection::NoDestination)?;
        Ok(CheckoutSnapshot {
            attempt_id: Uuid::new_v4().to_string(),
            lines: self.lines.clone(),
            destination,
            total_amount,
            total_count: self.total_count(),
            tendered_amount: self.tendered_amount,
            change: self.tendered_amount - total_amount,
        })
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.destination = None;
        self.tendered_amount = 0;
    }
}

/// Frozen copy of a validated cart, submitted to `saveOrder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSnapshot {
    /// Local id used to correlate log lines for one checkout attempt.
    pub attempt_id: String,
    pub lines: Vec<CartLine>,
    pub destination: Destination,
    pub total_amount: u64,
    pub total_count: u64,
    pub tendered_amount: u64,
    pub change: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MenuCategory;

    fn item(id: &str, price: u64) -> MenuItem {
        MenuItem {
            id: id.to_string(),
            name: format!("item {id}"),
            price,
            category: MenuCategory::Coffee,
        }
    }

    fn ready_cart() -> CartState {
        let mut cart = CartState::new();
        cart.add_item(&item("blend", 450));
        cart.add_item(&item("toast", 300));
        cart.add_item(&item("blend", 450));
        cart.press_table_key(TableKey::Digit(5));
        for key in [TenderKey::Digit(1), TenderKey::Digit(2), TenderKey::DoubleZero] {
            cart.press_tender_key(key);
        }
        cart
    }

    #[test]
    fn test_add_item_merges_by_id() {
        let cart = ready_cart();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].item_id, "blend");
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.total_amount(), 1200);
        assert_eq!(cart.total_count(), 3);
    }

    #[test]
    fn test_decrement_removes_line_at_zero() {
        let mut cart = ready_cart();
        cart.decrement_line("toast");
        assert!(cart.lines().iter().all(|l| l.item_id != "toast"));
        cart.decrement_line("blend");
        assert_eq!(cart.lines()[0].quantity, 1);
        cart.decrement_line("blend");
        assert!(cart.is_empty());
        cart.decrement_line("blend");
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals_track_lines_over_mixed_edits() {
        let menu = [item("a", 120), item("b", 450), item("c", 980)];
        let mut cart = CartState::new();
        // xorshift keeps the sequence deterministic without a rand dependency
        let mut seed: u32 = 0x9E37_79B9;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let target = &menu[(seed % 3) as usize];
            match (seed >> 8) % 4 {
                0 => cart.add_item(target),
                1 => cart.increment_line(&target.id),
                2 => cart.decrement_line(&target.id),
                _ => cart.remove_line(&target.id),
            }
            let expected: u64 = cart
                .lines()
                .iter()
                .map(|l| l.unit_price * u64::from(l.quantity))
                .sum();
            assert_eq!(cart.total_amount(), expected);
            assert!(cart.lines().iter().all(|l| l.quantity >= 1));
        }
    }

    #[test]
    fn test_tender_pad_sequence() {
        let mut cart = CartState::new();
        for label in ["1", "0", "0", "00"] {
            cart.press_tender_key(TenderKey::from_label(label).unwrap());
        }
        assert_eq!(cart.tendered_amount(), 10000);
        cart.press_tender_key(TenderKey::Clear);
        assert_eq!(cart.tendered_amount(), 0);
    }

    #[test]
    fn test_tender_pad_saturates() {
        let mut cart = CartState::new();
        for _ in 0..30 {
            cart.press_tender_key(TenderKey::Digit(9));
        }
        assert_eq!(cart.tendered_amount(), u64::MAX);
    }

    #[test]
    fn test_table_pad_takeout_and_digits_are_exclusive() {
        let mut cart = CartState::new();
        cart.press_table_key(TableKey::Digit(1));
        cart.press_table_key(TableKey::Digit(2));
        assert_eq!(cart.destination(), Some(&Destination::Table("12".into())));

        cart.press_table_key(TableKey::Takeout);
        assert_eq!(cart.destination(), Some(&Destination::Takeout));

        cart.press_table_key(TableKey::Digit(3));
        assert_eq!(cart.destination(), Some(&Destination::Table("3".into())));

        cart.press_table_key(TableKey::Clear);
        assert_eq!(cart.destination(), None);
    }

    #[test]
    fn test_key_labels() {
        assert_eq!(TableKey::from_label("T"), Some(TableKey::Takeout));
        assert_eq!(TableKey::from_label("7"), Some(TableKey::Digit(7)));
        assert_eq!(TableKey::from_label("00"), None);
        assert_eq!(TenderKey::from_label("00"), Some(TenderKey::DoubleZero));
        assert_eq!(TenderKey::from_label("C"), Some(TenderKey::Clear));
        assert_eq!(TenderKey::from_label("x"), None);
    }

    #[test]
    fn test_validation_order() {
        let mut cart = CartState::new();
        assert_eq!(cart.validate(), Err(CheckoutRejection::EmptyCart));

        cart.add_item(&item("blend", 450));
        assert_eq!(cart.validate(), Err(CheckoutRejection::NoDestination));

        cart.press_table_key(TableKey::Takeout);
        assert_eq!(
            cart.validate(),
            Err(CheckoutRejection::InsufficientTender {
                tendered: 0,
                total: 450
            })
        );
        assert!(!cart.can_checkout());

        cart.press_tender_key(TenderKey::Digit(5));
        cart.press_tender_key(TenderKey::DoubleZero);
        assert!(cart.can_checkout());
        assert_eq!(cart.change_due(), Some(50));
    }

    #[test]
    fn test_snapshot_copies_without_clearing() {
        let cart = ready_cart();
        let snapshot = cart.snapshot().expect("ready cart should snapshot");
        assert_eq!(snapshot.lines, cart.lines());
        assert_eq!(snapshot.destination, Destination::Table("5".into()));
        assert_eq!(snapshot.total_amount, 1200);
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.tendered_amount, 1200);
        assert_eq!(snapshot.change, 0);
        assert!(!snapshot.attempt_id.is_empty());
        assert_eq!(cart.lines().len(), 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut cart = ready_cart();
        cart.clear();
        assert_eq!(cart, CartState::new());
    }
}
