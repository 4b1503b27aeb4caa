//! Cached identity record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user record returned by the identity endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    pub email: String,
    /// Display name. The server sends an empty string when unset.
    #[serde(default)]
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Name to show a human, falling back to the email address.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}
