use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status after a second interrupt: 128 + SIGINT.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Cooperative shutdown flag shared by the server loop and the signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Route SIGINT/SIGTERM into this flag. A second signal while shutting
    /// down exits immediately.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let requested = Arc::clone(&self.requested);
        ctrlc::set_handler(move || {
            if requested.swap(true, Ordering::SeqCst) {
                std::process::exit(FORCED_EXIT_CODE);
            }
            eprintln!("\nshutdown requested, finishing in-flight requests...");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_requested());
        signal.request();
        assert!(observer.is_requested());
    }
}
