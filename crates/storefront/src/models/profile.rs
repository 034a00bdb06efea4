//! User profile types (`user_profiles` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quardcube_core::{Email, UserId};

use super::session::AuthUser;

/// A stored user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile row created on first authentication or sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub user_id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
}

impl From<&AuthUser> for NewProfile {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            country: None,
        }
    }
}

/// Editable profile fields.
///
/// Also sent to the auth backend as user metadata, so unset fields are
/// skipped when serializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Drop blank values and trim the rest.
    #[must_use]
    pub fn trimmed(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            name: keep(self.name),
            avatar_url: keep(self.avatar_url),
            country: keep(self.country),
            street: keep(self.street),
            city: keep(self.city),
            state: keep(self.state),
            postal_code: keep(self.postal_code),
            phone: keep(self.phone),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_drops_blank_fields() {
        let update = ProfileUpdate {
            name: Some("  Amani  ".to_string()),
            city: Some("   ".to_string()),
            phone: Some(String::new()),
            ..ProfileUpdate::default()
        }
        .trimmed();

        assert_eq!(update.name.as_deref(), Some("Amani"));
        assert_eq!(update.city, None);
        assert_eq!(update.phone, None);
    }

    #[test]
    fn test_metadata_json_skips_unset() {
        let update = ProfileUpdate {
            country: Some("Tanzania".to_string()),
            ..ProfileUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "country": "Tanzania" }));
        assert!(ProfileUpdate::default().is_empty());
    }
}
