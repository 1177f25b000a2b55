//! Error types shared by the register, the order board and the API client.

use thiserror::Error;

/// Reasons a checkout is refused before anything is sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutRejection {
    #[error("no items in the order")]
    EmptyCart,
    #[error("select a table number or takeout")]
    NoDestination,
    #[error("tendered amount {tendered} is less than the total {total}")]
    InsufficientTender { tendered: u64, total: u64 },
}

#[derive(Debug, Error)]
pub enum PosError {
    /// Transport failure, non-success HTTP status or an unreadable body.
    #[error("{0}")]
    Network(String),

    /// The endpoint answered `success: false`.
    #[error("endpoint rejected {action}: {message}")]
    RemoteRejected { action: &'static str, message: String },

    #[error(transparent)]
    Checkout(#[from] CheckoutRejection),

    #[error("menu item not found: {0}")]
    UnknownMenuItem(String),

    #[error("order not found on board: {0}")]
    UnknownOrder(String),

    #[error("settings: {0}")]
    Settings(String),
}

impl PosError {
    /// True for failures that came from talking to the endpoint, as opposed
    /// to local validation or lookups.
    pub fn is_remote(&self) -> bool {
        matches!(self, PosError::Network(_) | PosError::RemoteRejected { .. })
    }
}

pub type PosResult<T> = Result<T, PosError>;
