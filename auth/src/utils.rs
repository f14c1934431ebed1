//! Identity helpers.

/// Longest address accepted, per RFC 5321.
const MAX_EMAIL_LEN: usize = 254;

/// Normalize an identity for storage and rate-limit keys.
///
/// Surrounding whitespace is dropped and the address is lowercased, so
/// `" Ada@Example.com"` and `"ada@example.com"` share one rate window.
///
/// # Examples
///
/// ```
/// use relay_auth::utils::normalize_identity;
///
/// assert_eq!(normalize_identity("  Ada@Example.COM "), "ada@example.com");
/// ```
#[must_use]
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Check that `email` looks like a deliverable address.
///
/// This is a shape check, not full RFC 5322 parsing: one `@`, a non-empty
/// local part, and a dotted domain whose labels are non-empty and do not
/// start or end with a hyphen.
///
/// # Examples
///
/// ```
/// use relay_auth::utils::is_valid_email;
///
/// assert!(is_valid_email("user+tag@mail.example.com"));
/// assert!(!is_valid_email("user@localhost"));
/// assert!(!is_valid_email("@example.com"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_alphanumeric() || "._%+-'".contains(c));

    let mut labels = domain.split('.');
    let label_ok = |label: &str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    };

    let domain_ok = domain.contains('.') && labels.all(label_ok);

    local_ok && domain_ok
}
