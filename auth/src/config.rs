//! Login-link configuration.
//!
//! Values are supplied by the application; nothing here reads the environment.
//! Token lifetime belongs to the [`TokenStore`](crate::token_store::TokenStore).

/// Login-link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLinkConfig {
    /// Base URL of the client application (e.g., "https://app.example.com").
    ///
    /// Links are formatted as: `{base_url}{verify_path}?token={token}`
    pub base_url: String,

    /// Path of the client page that redeems the token.
    ///
    /// Default: `/auth/verify`
    pub verify_path: String,
}

impl LoginLinkConfig {
    /// Create new login-link configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the client application
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verify_path: "/auth/verify".to_string(),
        }
    }

    /// Set the verification page path.
    #[must_use]
    pub fn with_verify_path(mut self, path: impl Into<String>) -> Self {
        self.verify_path = path.into();
        self
    }

    /// Build the link that redeems `token`.
    ///
    /// # Examples
    ///
    /// ```
    /// use relay_auth::config::LoginLinkConfig;
    ///
    /// let config = LoginLinkConfig::new("https://app.example.com/");
    /// assert_eq!(
    ///     config.link_for("abc"),
    ///     "https://app.example.com/auth/verify?token=abc"
    /// );
    /// ```
    #[must_use]
    pub fn link_for(&self, token: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.verify_path.trim_start_matches('/');
        format!("{base}/{path}?token={token}")
    }
}

impl Default for LoginLinkConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoginLinkConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.verify_path, "/auth/verify");
    }

    #[test]
    fn test_link_joins_without_double_slash() {
        let config = LoginLinkConfig::new("http://localhost:3000")
            .with_verify_path("login/confirm");

        assert_eq!(
            config.link_for("t0k"),
            "http://localhost:3000/login/confirm?token=t0k"
        );
    }
}
