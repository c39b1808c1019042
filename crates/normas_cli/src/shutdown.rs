use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use console::Term;

/// Global shutdown flag for graceful termination. Shared with the sync
/// engine, which checks it between documents.
static SHUTDOWN: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// The shared shutdown flag, for handing to the sync engine.
pub(crate) fn shutdown_flag() -> Arc<AtomicBool> {
    Arc::clone(&SHUTDOWN)
}

/// Set up the Ctrl+C handler for graceful shutdown.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current documents...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current documents");
        }

        SHUTDOWN.store(true, Ordering::Release);

        // Wait for second Ctrl+C for force quit
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install second Ctrl+C handler");

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
