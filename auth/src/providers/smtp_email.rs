//! SMTP email sender using Lettre.

use crate::error::{AuthError, Result};
use crate::providers::{EmailSender, LoginLinkEmail};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// Port on which SMTP servers expect an implicit TLS connection.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Connection settings for [`SmtpEmailSender`].
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    /// SMTP server host (e.g., "smtp.gmail.com").
    pub host: String,

    /// SMTP server port: 465 for implicit TLS, anything else uses STARTTLS.
    pub port: u16,

    /// Authentication username, if the server requires one.
    pub username: Option<String>,

    /// Authentication password.
    pub password: Option<String>,

    /// Sender, either `addr@host` or `Name <addr@host>`.
    pub from: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

/// SMTP email sender.
///
/// Sends plain-text login emails through an async `lettre` transport. Each
/// send opens its own connection.
///
/// # Examples
///
/// ```ignore
/// use relay_auth::providers::{SmtpEmailSender, SmtpSettings};
///
/// let sender = SmtpEmailSender::new(&SmtpSettings {
///     host: "smtp.gmail.com".into(),
///     port: 587,
///     username: Some("user@gmail.com".into()),
///     password: Some("app_password".into()),
///     from: "Relay <noreply@example.com>".into(),
/// })?;
/// ```
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpEmailSender {
    /// Create a new SMTP sender.
    ///
    /// No connection is made until the first email is sent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the host or sender address is
    /// invalid.
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from: Mailbox = settings.from.parse().map_err(|e| {
            AuthError::Configuration(format!("Invalid sender address '{}': {e}", settings.from))
        })?;

        let builder = if settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| AuthError::Configuration(format!("SMTP relay error: {e}")))?
        .port(settings.port);

        let builder = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
            host: settings.host.clone(),
        })
    }

    fn build_message(&self, email: &LoginLinkEmail) -> Result<Message> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AuthError::EmailDeliveryFailed(format!("Invalid recipient: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body())
            .map_err(|e| AuthError::EmailDeliveryFailed(format!("Failed to build email: {e}")))
    }
}

impl EmailSender for SmtpEmailSender {
    async fn send_login_link(&self, email: &LoginLinkEmail) -> Result<()> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::EmailDeliveryFailed(format!("SMTP send failed: {e}")))?;

        info!(to = %email.to, host = %self.host, "Login link email sent");
        Ok(())
    }
}

impl std::fmt::Debug for SmtpEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpEmailSender")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            username: Some("user".into()),
            password: Some("secret".into()),
            from: "Relay <noreply@example.com>".into(),
        }
    }

    #[test]
    fn test_rejects_bad_sender() {
        let mut settings = settings();
        settings.from = "not an address".into();
        assert!(matches!(
            SmtpEmailSender::new(&settings),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_builds_plain_text_message() {
        let sender = SmtpEmailSender::new(&settings()).unwrap();
        let message = sender
            .build_message(&LoginLinkEmail {
                to: "a@x.com".into(),
                display_name: None,
                link: "http://localhost/auth/verify?token=abc".into(),
                expires_in: chrono::Duration::hours(1),
            })
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Your sign-in link"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", settings());
        assert!(!debug.contains("secret"));
    }
}
