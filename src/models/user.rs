//! User model for storage and API.

use serde::{Deserialize, Serialize};

use crate::services::google::ProviderProfile;

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal identifier, assigned on creation (also the document ID)
    pub id: String,
    /// Display name, taken from the Google profile on first sign-in
    pub name: String,
    /// Optional student PIN
    pub pin_number: Option<String>,
    /// Email address
    pub email: String,
    /// Google subject identifier; unique per user when present
    pub provider_id: Option<String>,
    /// When the user first signed in (RFC 3339)
    pub created_at: String,
}

impl User {
    /// Build a new User from a verified Google profile.
    ///
    /// Profile fields are copied once at first sign-in; later sign-ins do
    /// not refresh them.
    pub fn from_profile(id: String, profile: &ProviderProfile, now: &str) -> Self {
        Self {
            id,
            name: profile.given_name.clone(),
            pin_number: profile.family_name.clone(),
            email: profile.primary_email().to_string(),
            provider_id: Some(profile.subject_id.clone()),
            created_at: now.to_string(),
        }
    }
}

/// Index document mapping a Google subject identifier to an internal
/// user id. Keyed by the subject id, so each subject can point at only
/// one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> ProviderProfile {
        ProviderProfile {
            subject_id: "g123".to_string(),
            given_name: "Ana".to_string(),
            family_name: Some("Lee".to_string()),
            emails: vec!["ana@x.com".to_string()],
        }
    }

    #[test]
    fn test_from_profile_maps_fields() {
        let user = User::from_profile(
            "u-1".to_string(),
            &sample_profile(),
            "2026-01-01T00:00:00Z",
        );

        assert_eq!(user.id, "u-1");
        assert_eq!(user.name, "Ana");
        assert_eq!(user.pin_number.as_deref(), Some("Lee"));
        assert_eq!(user.email, "ana@x.com");
        assert_eq!(user.provider_id.as_deref(), Some("g123"));
    }

    #[test]
    fn test_from_profile_without_family_name() {
        let mut profile = sample_profile();
        profile.family_name = None;

        let user = User::from_profile("u-2".to_string(), &profile, "2026-01-01T00:00:00Z");

        assert_eq!(user.name, "Ana");
        assert!(user.pin_number.is_none());
    }
}
