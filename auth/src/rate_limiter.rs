//! Fixed-window rate limiter.
//!
//! Each `(action, key)` pair owns one [`RateWindow`]. The first request opens a
//! window of the action's length; requests are admitted until the window's
//! ceiling is reached, and the next request after the window closes opens a
//! fresh one. Every decision is a single [`ExpiringStore::mutate_with`] call, so
//! concurrent callers on one key never overshoot the ceiling.
//!
//! # Example
//!
//! ```
//! use relay_auth::rate_limiter::{Decision, RateLimitPolicy, RateLimiter};
//! use relay_core::environment::SystemClock;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(
//!     Arc::new(SystemClock),
//!     RateLimitPolicy::new(Duration::from_secs(60), 100),
//! )
//! .with_policy("login_link", RateLimitPolicy::new(Duration::from_secs(600), 2));
//!
//! assert!(limiter.try_admit("login_link", "1.2.3.4").is_admitted());
//! assert!(limiter.try_admit("login_link", "1.2.3.4").is_admitted());
//! assert!(matches!(
//!     limiter.try_admit("login_link", "1.2.3.4"),
//!     Decision::Rejected { .. }
//! ));
//! ```

use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};
use relay_core::environment::Clock;
use relay_core::store::ExpiringStore;
use relay_core::sweeper::Sweepable;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests admitted in this window; at least 1.
    pub count: u32,

    /// When the window closes.
    pub reset_at: DateTime<Utc>,
}

/// Window length and ceiling for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Window length.
    pub window: Duration,

    /// Requests admitted per window.
    pub max_requests: u32,
}

impl RateLimitPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

/// Outcome of [`RateLimiter::try_admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request counted and allowed.
    Admitted {
        /// Requests still available in the current window.
        remaining: u32,
    },

    /// Ceiling reached; nothing was counted.
    Rejected {
        /// Time until the current window resets.
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns `true` for [`Decision::Admitted`].
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Admitted { .. } => "admitted",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Per-action fixed-window limiter over a shared expiring store.
///
/// Policies are fixed once the limiter is built. Actions without a registered
/// policy use the default policy.
pub struct RateLimiter {
    windows: ExpiringStore<RateWindow>,
    default_policy: RateLimitPolicy,
    policies: HashMap<String, RateLimitPolicy>,
}

impl RateLimiter {
    /// Create a limiter that applies `default_policy` to every action.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, default_policy: RateLimitPolicy) -> Self {
        Self {
            windows: ExpiringStore::new("rate_windows", clock),
            default_policy,
            policies: HashMap::new(),
        }
    }

    /// Register the policy for `action`.
    #[must_use]
    pub fn with_policy(mut self, action: impl Into<String>, policy: RateLimitPolicy) -> Self {
        self.policies.insert(action.into(), policy);
        self
    }

    /// Policy applied to `action`.
    #[must_use]
    pub fn policy(&self, action: &str) -> RateLimitPolicy {
        self.policies
            .get(action)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Count one request for `key` under `action` if the ceiling allows it.
    pub fn try_admit(&self, action: &str, key: &str) -> Decision {
        let policy = self.policy(action);
        if policy.max_requests == 0 {
            return Decision::Rejected {
                retry_after: policy.window,
            };
        }

        let window = chrono::Duration::from_std(policy.window).unwrap_or(chrono::Duration::MAX);
        let store_key = composite_key(&[action, key]);

        let decision = self.windows.mutate_with(&store_key, |current, now| {
            match current {
                // Still open with room left
                Some(open) if open.count < policy.max_requests => {
                    let next = RateWindow {
                        count: open.count + 1,
                        reset_at: open.reset_at,
                    };
                    let remaining = policy.max_requests - next.count;
                    (next, open.reset_at - now, Decision::Admitted { remaining })
                }
                // Still open and full
                Some(open) => {
                    let retry_after = (open.reset_at - now).to_std().unwrap_or_default();
                    (*open, open.reset_at - now, Decision::Rejected { retry_after })
                }
                // Absent or rolled over
                None => {
                    let fresh = RateWindow {
                        count: 1,
                        reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
                    };
                    let remaining = policy.max_requests - 1;
                    (fresh, window, Decision::Admitted { remaining })
                }
            }
        });

        metrics::counter!(
            "relay_rate_limit_decisions_total",
            "action" => action.to_owned(),
            "decision" => decision.label()
        )
        .increment(1);

        match decision {
            Decision::Admitted { remaining } => {
                debug!(action = %action, key = %key, remaining, "Rate limit admitted");
            }
            Decision::Rejected { retry_after } => {
                warn!(
                    action = %action,
                    key = %key,
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "Rate limit exceeded"
                );
            }
        }

        decision
    }

    /// Like [`RateLimiter::try_admit`], as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RateLimited`] when the request is rejected.
    pub fn check(&self, action: &str, key: &str) -> Result<u32> {
        match self.try_admit(action, key) {
            Decision::Admitted { remaining } => Ok(remaining),
            Decision::Rejected { retry_after } => Err(AuthError::RateLimited { retry_after }),
        }
    }

    /// Number of windows held, including closed ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns `true` if no windows are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl Sweepable for RateLimiter {
    fn name(&self) -> &str {
        self.windows.name()
    }

    fn sweep_expired(&self) -> usize {
        self.windows.sweep_expired()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("default_policy", &self.default_policy)
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

/// Join key parts into one store key.
///
/// Each part is prefixed with its byte length, so no two distinct part lists
/// produce the same key even when parts contain the separator.
///
/// # Examples
///
/// ```
/// use relay_auth::rate_limiter::composite_key;
///
/// assert_eq!(composite_key(&["127.0.0.1", "a@x.com"]), "9:127.0.0.1|7:a@x.com");
/// assert_ne!(composite_key(&["a|1:b"]), composite_key(&["a", "b"]));
/// ```
#[must_use]
pub fn composite_key(parts: &[&str]) -> String {
    let mut key = String::with_capacity(parts.iter().map(|p| p.len() + 4).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push('|');
        }
        // Writing to a String cannot fail
        let _ = write!(key, "{}:{part}", part.len());
    }
    key
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use relay_core::environment::SystemClock;

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(
            Arc::new(SystemClock),
            RateLimitPolicy::new(Duration::from_secs(600), max),
        )
    }

    #[test]
    fn test_admits_up_to_ceiling_then_rejects() {
        let limiter = limiter(3);

        assert_eq!(limiter.try_admit("a", "k"), Decision::Admitted { remaining: 2 });
        assert_eq!(limiter.try_admit("a", "k"), Decision::Admitted { remaining: 1 });
        assert_eq!(limiter.try_admit("a", "k"), Decision::Admitted { remaining: 0 });

        let decision = limiter.try_admit("a", "k");
        assert!(matches!(
            decision,
            Decision::Rejected { retry_after }
                if retry_after <= Duration::from_secs(600) && retry_after > Duration::from_secs(590)
        ));
    }

    #[test]
    fn test_keys_and_actions_are_independent() {
        let limiter = limiter(1);

        assert!(limiter.try_admit("a", "k1").is_admitted());
        assert!(limiter.try_admit("a", "k2").is_admitted());
        assert!(limiter.try_admit("b", "k1").is_admitted());
        assert!(!limiter.try_admit("a", "k1").is_admitted());
    }

    #[test]
    fn test_registered_policy_overrides_default() {
        let limiter = limiter(100).with_policy(
            "login_link",
            RateLimitPolicy::new(Duration::from_secs(600), 1),
        );

        assert_eq!(limiter.policy("login_link").max_requests, 1);
        assert_eq!(limiter.policy("unknown").max_requests, 100);

        assert!(limiter.try_admit("login_link", "k").is_admitted());
        assert!(!limiter.try_admit("login_link", "k").is_admitted());
    }

    #[test]
    fn test_zero_ceiling_rejects_everything() {
        let limiter = limiter(0);
        assert_eq!(
            limiter.try_admit("a", "k"),
            Decision::Rejected {
                retry_after: Duration::from_secs(600)
            }
        );
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_check_maps_rejection_to_error() {
        let limiter = limiter(1);

        assert_eq!(limiter.check("a", "k"), Ok(0));
        assert!(matches!(
            limiter.check("a", "k"),
            Err(AuthError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_composite_key_is_unambiguous() {
        assert_eq!(composite_key(&[]), "");
        assert_eq!(composite_key(&["x"]), "1:x");
        assert_ne!(composite_key(&["ab", "c"]), composite_key(&["a", "bc"]));
        assert_ne!(composite_key(&["a:b"]), composite_key(&["a", "b"]));
    }
}
