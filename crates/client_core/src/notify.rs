use tracing::{info, warn};

/// Receiver of the human-readable outcome messages shown to the user.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        info!(target: "notify", "{message}");
    }

    fn error(&self, message: &str) {
        warn!(target: "notify", "{message}");
    }
}
