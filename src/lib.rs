//! pos-register: register and order-board client for a spreadsheet-backed
//! POS endpoint.
//!
//! Two independent views share one [`api::RemoteEndpoint`]:
//!
//! - [`register::Register`] keeps the cart, table/takeout keypad and cash
//!   tender for the order being rung up, and submits it with `saveOrder`.
//! - [`board::OrderBoard`] mirrors the order sheet as unit cards, toggles
//!   their status optimistically and is kept fresh by [`sync::start_board`].
//!
//! Call [`init_logging`] once at start-up and hold on to the returned guard.

pub mod api;
pub mod board;
pub mod cart;
pub mod diagnostics;
pub mod error;
pub mod menu;
pub mod models;
pub mod register;
pub mod settings;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use api::{HttpEndpoint, MenuSections, RemoteEndpoint, SaveOrderAck, Transport};
pub use board::{BoardPhase, BoardView, OrderBoard, StatusFilter, UnitCard};
pub use cart::{CartLine, CartState, CheckoutSnapshot, TableKey, TenderKey};
pub use diagnostics::init_logging;
pub use error::{CheckoutRejection, PosError, PosResult};
pub use menu::{MenuCatalog, MenuSection};
pub use models::{Destination, MenuCategory, MenuItem, OrderRecord, OrderStatus};
pub use register::{CheckoutReceipt, Register};
pub use settings::RegisterSettings;
pub use sync::{start_board, start_board_poller, BoardPoller};

/// Crate version with the git revision it was built from.
pub fn build_info() -> String {
    format!(
        "pos-register v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_SHA")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_names_version() {
        let info = build_info();
        assert!(info.starts_with(&format!("pos-register v{}", env!("CARGO_PKG_VERSION"))));
        assert!(info.ends_with(&format!("({})", env!("BUILD_GIT_SHA"))));
    }
}
