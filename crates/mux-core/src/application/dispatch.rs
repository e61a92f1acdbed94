//! # Response-Dispatch Loop
//!
//! Single task that reads responses and routes each to its pending call.
//! Reads are issued strictly one after another, so the transport never sees
//! two concurrent `read` calls.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{PendingCallTable, TransportError};
use crate::ports::Transport;

/// Run until `lifetime` is cancelled or a read fails.
///
/// `ready` fires before the first read. Cancellation is an orderly exit and
/// returns `Ok`; any other read error terminates the loop and is returned.
/// Responses nobody waits for are dropped by the table.
pub(crate) async fn run_dispatch_loop<T>(
    transport: Arc<T>,
    table: Arc<PendingCallTable>,
    lifetime: CancellationToken,
    ready: oneshot::Sender<()>,
) -> Result<(), TransportError>
where
    T: Transport + ?Sized,
{
    let _ = ready.send(());
    info!("Dispatch loop started");

    while !lifetime.is_cancelled() {
        match transport.read(&lifetime).await {
            Ok(response) => {
                table.resolve(response);
            }
            Err(err) if err.is_cancellation() && lifetime.is_cancelled() => break,
            Err(err) => {
                error!(error = %err, pending = table.len(), "Dispatch loop read failed");
                return Err(err);
            }
        }
    }

    info!("Dispatch loop stopped");
    Ok(())
}
