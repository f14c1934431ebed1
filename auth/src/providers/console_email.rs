//! Console email sender for development and testing.

use crate::error::Result;
use crate::providers::{EmailSender, LoginLinkEmail};
use crate::token_store::token_prefix;
use tracing::info;

/// Console email sender.
///
/// Prints login emails to stdout instead of sending them. Useful during
/// development where no mail server is configured.
///
/// # Examples
///
/// ```ignore
/// use relay_auth::providers::{ConsoleEmailSender, EmailSender, LoginLinkEmail};
///
/// let sender = ConsoleEmailSender::new();
/// sender.send_login_link(&LoginLinkEmail {
///     to: "user@example.com".into(),
///     display_name: None,
///     link: "http://localhost:3000/auth/verify?token=abc123".into(),
///     expires_in: chrono::Duration::hours(1),
/// }).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    /// Create a new console email sender.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EmailSender for ConsoleEmailSender {
    async fn send_login_link(&self, email: &LoginLinkEmail) -> Result<()> {
        let token = email.link.rsplit_once("token=").map_or("", |(_, t)| t);
        info!(
            to = %email.to,
            token_prefix = %token_prefix(token),
            expires_in_minutes = email.expires_in.num_minutes(),
            "Login link email (development mode)"
        );

        println!("\n──────────────────── LOGIN LINK EMAIL ────────────────────");
        println!("To:      {}", email.to);
        println!("Subject: {}", email.subject());
        println!("──────────────────────────────────────────────────────────");
        println!("{}", email.body());
        println!("──────────────────────────────────────────────────────────\n");

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_sender_always_succeeds() {
        let sender = ConsoleEmailSender::new();
        let email = LoginLinkEmail {
            to: "a@x.com".into(),
            display_name: None,
            link: "http://localhost/auth/verify?token=abc".into(),
            expires_in: chrono::Duration::hours(1),
        };
        sender.send_login_link(&email).await.unwrap();
    }
}
