//! Workflow configuration.
//!
//! A plain value threaded through the service constructor; there is no
//! global configuration singleton anywhere in the workspace.

use registrar_types::RecordId;
use std::env;

/// Configuration for the approval workflow.
#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    /// The approver set every change falls back to when a revision declares
    /// none, and whose approval is sequenced last. Seeded by bootstrap.
    pub default_approver_set_id: RecordId,

    /// Domain appended to bare usernames when deriving actor emails.
    pub default_user_domain: String,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            default_approver_set_id: 1,
            default_user_domain: "example.com".to_string(),
        }
    }
}

impl RegistrarConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REGISTRAR_DEFAULT_APPROVER_SET_ID`: fallback approver set (default: 1)
    /// - `REGISTRAR_DEFAULT_USER_DOMAIN`: actor email domain (default: example.com)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_approver_set_id: env::var("REGISTRAR_DEFAULT_APPROVER_SET_ID")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.default_approver_set_id),
            default_user_domain: env::var("REGISTRAR_DEFAULT_USER_DOMAIN")
                .unwrap_or(defaults.default_user_domain),
        }
    }

    /// Derive the acting email for a bare username.
    pub fn actor_email(&self, username: &str) -> String {
        if username.contains('@') {
            username.to_string()
        } else {
            format!("{username}@{}", self.default_user_domain)
        }
    }
}
