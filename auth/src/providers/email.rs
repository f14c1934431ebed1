//! Email sender trait.

use crate::error::Result;
use crate::providers::{ConsoleEmailSender, SmtpEmailSender};
use chrono::Duration;

/// A login link ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLinkEmail {
    /// Recipient address.
    pub to: String,

    /// Name to greet the recipient with, if known.
    pub display_name: Option<String>,

    /// Full link, token included.
    pub link: String,

    /// How long the link stays valid.
    pub expires_in: Duration,
}

impl LoginLinkEmail {
    /// Subject line.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        "Your sign-in link"
    }

    /// Plain-text body.
    #[must_use]
    pub fn body(&self) -> String {
        let greeting = self
            .display_name
            .as_deref()
            .map_or_else(|| "Hello,".to_string(), |name| format!("Hello {name},"));
        let minutes = self.expires_in.num_minutes();

        format!(
            "{greeting}\n\n\
             Use the link below to sign in. It can be used once and expires in {minutes} minutes.\n\n\
             {}\n\n\
             If you did not ask to sign in, you can ignore this email.\n",
            self.link
        )
    }
}

/// Delivers login-link emails.
///
/// This trait abstracts over delivery services so the login flow can be
/// tested without a mail server.
pub trait EmailSender: Send + Sync {
    /// Send a login link.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailDeliveryFailed`](crate::AuthError::EmailDeliveryFailed)
    /// if the message could not be built or handed to the mail server.
    fn send_login_link(
        &self,
        email: &LoginLinkEmail,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Runtime-selected sender.
#[derive(Debug, Clone)]
pub enum Mailer {
    /// Print to the console.
    Console(ConsoleEmailSender),

    /// Deliver over SMTP.
    Smtp(SmtpEmailSender),
}

impl Mailer {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Console(_) => "console",
            Self::Smtp(_) => "smtp",
        }
    }
}

impl EmailSender for Mailer {
    async fn send_login_link(&self, email: &LoginLinkEmail) -> Result<()> {
        match self {
            Self::Console(sender) => sender.send_login_link(email).await,
            Self::Smtp(sender) => sender.send_login_link(email).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(display_name: Option<&str>) -> LoginLinkEmail {
        LoginLinkEmail {
            to: "a@x.com".into(),
            display_name: display_name.map(Into::into),
            link: "http://localhost:3000/auth/verify?token=abc".into(),
            expires_in: Duration::hours(1),
        }
    }

    #[test]
    fn test_body_contains_link_and_expiry() {
        let body = email(None).body();
        assert!(body.starts_with("Hello,\n"));
        assert!(body.contains("http://localhost:3000/auth/verify?token=abc"));
        assert!(body.contains("expires in 60 minutes"));
    }

    #[test]
    fn test_body_greets_by_name() {
        assert!(email(Some("Ada")).body().starts_with("Hello Ada,"));
    }
}
