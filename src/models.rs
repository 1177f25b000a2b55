//! Wire and domain types for menu items and order records.
//!
//! The spreadsheet endpoint is loose about types: numeric cells may come back
//! as numbers or strings, and order rows may be keyed by the sheet's Japanese
//! column headers instead of camelCase names. Decoding here accepts both so
//! the rest of the crate only ever sees clean values.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuCategory {
    Coffee,
    SoftDrink,
    Food,
    #[default]
    #[serde(other)]
    Other,
}

impl MenuCategory {
    /// Order in which category sections are shown on the register.
    pub const DISPLAY_ORDER: [MenuCategory; 4] = [
        MenuCategory::Coffee,
        MenuCategory::SoftDrink,
        MenuCategory::Food,
        MenuCategory::Other,
    ];

    pub fn as_key(&self) -> &'static str {
        match self {
            MenuCategory::Coffee => "coffee",
            MenuCategory::SoftDrink => "softDrink",
            MenuCategory::Food => "food",
            MenuCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuCategory::Coffee => "コーヒー",
            MenuCategory::SoftDrink => "ソフトドリンク",
            MenuCategory::Food => "フード",
            MenuCategory::Other => "その他",
        }
    }
}

/// A sellable item as published by the endpoint. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    /// Price in the minor currency unit.
    #[serde(deserialize_with = "lenient_amount")]
    pub price: u64,
    #[serde(default)]
    pub category: MenuCategory,
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Table number or takeout designation attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Table(String),
    Takeout,
}

impl Destination {
    /// Literal the endpoint uses for takeout orders.
    pub const TAKEOUT: &'static str = "Takeout";

    /// Parse a wire value. Empty strings carry no destination.
    pub fn from_wire(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed == Self::TAKEOUT {
            Some(Destination::Takeout)
        } else {
            Some(Destination::Table(trimmed.to_string()))
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Destination::Table(number) => number,
            Destination::Takeout => Self::TAKEOUT,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Destination::Table(number) => format!("テーブル: {number}"),
            Destination::Takeout => "テイクアウト".to_string(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Destination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Destination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let raw = match &value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(de::Error::custom(format!(
                    "destination must be a string or number, got {other}"
                )))
            }
        };
        Destination::from_wire(&raw).ok_or_else(|| de::Error::custom("empty destination"))
    }
}

// ---------------------------------------------------------------------------
// Order records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Next status in the fixed board cycle.
    pub fn next(self) -> Self {
        match self {
            OrderStatus::Pending => OrderStatus::Delivered,
            OrderStatus::Delivered => OrderStatus::Cancelled,
            OrderStatus::Cancelled => OrderStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "未提供",
            OrderStatus::Delivered => "提供済み",
            OrderStatus::Cancelled => "キャンセル",
        }
    }

    /// Normalize a status string from the sheet. Unknown values fall back to
    /// pending so the row stays visible to staff.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "delivered" => OrderStatus::Delivered,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            other => {
                warn!(status = %other, "unknown order status, treating as pending");
                OrderStatus::Pending
            }
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(OrderStatus::from_wire(&raw))
    }
}

/// Largest quantity accepted from one order row. The board draws one card per
/// unit, so a typo in the sheet must not turn into millions of cards.
pub const MAX_ROW_QUANTITY: u32 = 99;

/// One row of the order sheet: a single line item of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(alias = "ID", alias = "uniqueId", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "日時", deserialize_with = "flexible_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "テーブル番号", alias = "tableNumber")]
    pub destination: Destination,
    #[serde(alias = "商品名", alias = "name")]
    pub item_name: String,
    #[serde(alias = "単価", alias = "price", deserialize_with = "lenient_amount")]
    pub unit_price: u64,
    #[serde(alias = "数量", default = "default_quantity", deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(alias = "ステータス")]
    pub status: OrderStatus,
}

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0)
                    .map(|f| f.round() as u64)
            })
        }
        _ => None,
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_u64(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid amount: {value}")))
}

fn default_quantity() -> u32 {
    1
}

fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let quantity = match value_to_u64(&value) {
        None | Some(0) => 1,
        Some(q) if q > u64::from(MAX_ROW_QUANTITY) => {
            warn!(quantity = q, cap = MAX_ROW_QUANTITY, "order row quantity out of range, capping");
            MAX_ROW_QUANTITY
        }
        Some(q) => q as u32,
    };
    Ok(quantity)
}

/// Parse a sheet timestamp: RFC 3339 first, then naive forms read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn flexible_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
}
