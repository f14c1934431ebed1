//! Mock email sender for testing.

use crate::error::{AuthError, Result};
use crate::providers::{EmailSender, LoginLinkEmail};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock email sender.
///
/// Records every email instead of delivering it, and can be switched into a
/// failing mode to exercise delivery-error paths. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockEmailSender {
    sent: Arc<Mutex<Vec<LoginLinkEmail>>>,
    failing: Arc<AtomicBool>,
}

impl MockEmailSender {
    /// Create a new mock sender that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock sender whose sends fail.
    #[must_use]
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.set_failing(true);
        sender
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Emails sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<LoginLinkEmail> {
        self.sent.lock().clone()
    }

    /// The most recently sent email.
    #[must_use]
    pub fn last(&self) -> Option<LoginLinkEmail> {
        self.sent.lock().last().cloned()
    }

    /// Token embedded in the most recently sent link.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.last()
            .and_then(|email| email.link.rsplit_once("token=").map(|(_, t)| t.to_string()))
    }
}

impl EmailSender for MockEmailSender {
    async fn send_login_link(&self, email: &LoginLinkEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::EmailDeliveryFailed(
                "mock sender is failing".to_string(),
            ));
        }
        self.sent.lock().push(email.clone());
        Ok(())
    }
}
