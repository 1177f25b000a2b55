//! Background polling for the order board.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::RemoteEndpoint;
use crate::board::OrderBoard;

/// Default cadence of board refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running board poller.
pub struct BoardPoller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BoardPoller {
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    /// Stop polling. A refresh already in flight is allowed to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Start the board poller. Spawns a tokio task that calls
/// [`OrderBoard::refresh`] every `interval` until stopped. Refresh failures
/// are already logged by the board and never end the loop.
pub fn start_board_poller<E>(board: OrderBoard<E>, interval: Duration) -> BoardPoller
where
    E: RemoteEndpoint + ?Sized + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Board poller started");
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            cycles += 1;
            if board.refresh().await.is_err() {
                debug!(cycle = cycles, "board refresh cycle failed");
            }
        }

        info!(cycles, "Board poller stopped");
    });

    BoardPoller { cancel, handle }
}

/// Load the board once, then keep it fresh in the background.
pub async fn start_board<E>(endpoint: Arc<E>, interval: Duration) -> (OrderBoard<E>, BoardPoller)
where
    E: RemoteEndpoint + ?Sized + 'static,
{
    let board = OrderBoard::new(endpoint);
    // A failed first load is visible on the board itself; polling still starts
    // so the board recovers once the endpoint is reachable.
    let _ = board.load().await;
    let poller = start_board_poller(board.clone(), interval);
    (board, poller)
}
