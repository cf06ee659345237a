//! Out-of-band notification delivery abstraction.
//!
//! The auth service hands finished messages to a [`Notifier`]; the
//! implementation decides how to deliver (SMTP, API, etc.). The default
//! sender for local dev logs the message and returns `Ok(())`. Delivery
//! failures surface to the caller; they are never silently swallowed.

use anyhow::Result;
use tracing::info;

pub trait Notifier: Send + Sync {
    /// Deliver a message or return an error to surface as a delivery failure.
    fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        info!(to_email = %to_email, subject = %subject, body = %body, "notification send stub");
        Ok(())
    }
}
