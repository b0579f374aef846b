//! Process-level shutdown state for the session command.
//!
//! Two phases:
//! - Before `register_shutdown_tx()`: Ctrl+C exits the process directly
//! - After: the handler sets the flag and notifies the engine loop, which
//!   flushes session state before exiting

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender for the running session
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            crate::log!("session"; "shutting down...");
            let _ = tx.send(());
        } else {
            // No session running (e.g., one-shot render) - nothing to flush
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the running session's shutdown channel.
///
/// Call after the engine is constructed, before blocking on it.
pub fn register_shutdown_tx(tx: crossbeam::channel::Sender<()>) {
    let _ = SHUTDOWN_TX.set(tx);
}

/// Check if shutdown has been requested.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
