//! Email delivery providers.
//!
//! The login-link flow depends only on the [`EmailSender`] trait. Concrete
//! senders are chosen at start-up:
//!
//! - [`ConsoleEmailSender`]: prints the message (development)
//! - [`SmtpEmailSender`]: delivers over SMTP with `lettre` (production)
//! - [`Mailer`]: either of the above, picked from configuration

pub mod console_email;
pub mod email;
pub mod smtp_email;

pub use console_email::ConsoleEmailSender;
pub use email::{EmailSender, LoginLinkEmail, Mailer};
pub use smtp_email::{SmtpEmailSender, SmtpSettings};
