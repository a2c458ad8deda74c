//! User identity records and their public projections.

use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::error::SquirrelError;

pub type UserId = i64;

/// A registered identity.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Absent for accounts created through a federated login.
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub admin: bool,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("bio", &self.bio)
            .field("admin", &self.admin)
            .finish()
    }
}

impl User {
    pub fn has_local_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// Fields needed to insert a user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
}

/// Column changes applied by a single update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.bio.is_none()
    }
}

/// Link between an external provider account and a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: String,
    pub provider_user_id: String,
    pub user_id: UserId,
}

/// Profile handed back by an identity provider after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    pub provider: String,
    pub provider_user_id: String,
    pub display_name: String,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PrivateProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicProfile {
    pub id: UserId,
    pub username: String,
    pub bio: Option<String>,
}

/// Listing projection. Same columns as the public profile today.
pub type SummaryProfile = PublicProfile;

impl From<&User> for PrivateProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
        }
    }
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            bio: user.bio.clone(),
        }
    }
}

/// Summary projection, or an empty object when there is no user.
pub fn summary_or_empty(user: Option<&User>) -> Value {
    match user {
        Some(u) => serde_json::to_value(SummaryProfile::from(u)).unwrap_or_else(|_| json!({})),
        None => json!({}),
    }
}

/// Parse a `userId` path segment: one to ten ASCII digits, at most `u32::MAX`.
pub fn parse_user_id(raw: &str) -> Result<UserId, SquirrelError> {
    if raw.is_empty() || raw.len() > 10 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SquirrelError::MalformedId);
    }
    let value: u64 = raw.parse().map_err(|_| SquirrelError::MalformedId)?;
    if value > u64::from(u32::MAX) {
        return Err(SquirrelError::MalformedId);
    }
    Ok(value as UserId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            bio: Some("hi".to_string()),
            admin: false,
        }
    }

    #[test]
    fn private_profile_includes_email_public_does_not() {
        let user = sample_user();
        let private = serde_json::to_value(PrivateProfile::from(&user)).unwrap();
        let public = serde_json::to_value(PublicProfile::from(&user)).unwrap();

        assert_eq!(private, json!({"id": 7, "username": "alice", "email": "a@x.com", "bio": "hi"}));
        assert_eq!(public, json!({"id": 7, "username": "alice", "bio": "hi"}));
    }

    #[test]
    fn summary_of_nobody_is_empty_object() {
        assert_eq!(summary_or_empty(None), json!({}));
    }

    #[test]
    fn debug_redacts_password_hash() {
        let rendered = format!("{:?}", sample_user());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn parse_user_id_boundaries() {
        assert_eq!(parse_user_id("0").unwrap(), 0);
        assert_eq!(parse_user_id("99999999").unwrap(), 99_999_999);
        assert_eq!(parse_user_id("4294967295").unwrap(), 4_294_967_295);
        assert!(matches!(parse_user_id("4294967296"), Err(SquirrelError::MalformedId)));
        assert!(matches!(parse_user_id("12345678901"), Err(SquirrelError::MalformedId)));
        assert!(matches!(parse_user_id("zero"), Err(SquirrelError::MalformedId)));
        assert!(matches!(parse_user_id(""), Err(SquirrelError::MalformedId)));
        assert!(matches!(parse_user_id("-1"), Err(SquirrelError::MalformedId)));
        assert!(matches!(parse_user_id("+1"), Err(SquirrelError::MalformedId)));
    }

    proptest! {
        #[test]
        fn parse_user_id_accepts_every_u32(n in any::<u32>()) {
            prop_assert_eq!(parse_user_id(&n.to_string()).unwrap(), i64::from(n));
        }

        #[test]
        fn parse_user_id_rejects_non_digits(s in "[0-9]{0,4}[^0-9][0-9]{0,4}") {
            prop_assert!(parse_user_id(&s).is_err());
        }
    }
}
