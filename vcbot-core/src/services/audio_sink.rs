//! The shared audio output every voice session subscribes to.
//!
//! Created once at startup and handed to each new call. Nothing is played
//! through it yet; the voice layer reports track failures back here so they
//! end up in the log instead of vanishing inside the driver.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{error, info};

#[derive(Debug)]
pub struct AudioSink {
    name: String,
    subscriptions: AtomicUsize,
    errors: AtomicU64,
}

impl AudioSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscriptions: AtomicUsize::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn record_subscription(&self, guild: &str) {
        let n = self.subscriptions.fetch_add(1, Ordering::Relaxed) + 1;
        info!("AudioSink '{}': subscribed call in guild {} (total subscriptions: {})", self.name, guild, n);
    }

    pub fn report_error(&self, detail: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        error!("Audio player error ({}): {}", self.name, detail);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl Default for AudioSink {
    fn default() -> Self {
        Self::new("main")
    }
}
