//! Google sign-in via the OAuth 2.0 authorization-code flow.

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::domain::error::SquirrelError;
use crate::domain::settings::GoogleSettings;
use crate::domain::user::FederatedProfile;
use crate::ports::identity_provider::{IdentityProvider, ProfileFuture};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

pub struct GoogleProvider {
    client: Client,
    settings: GoogleSettings,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

impl UserInfo {
    fn into_profile(self) -> FederatedProfile {
        // Unverified addresses are not trusted as account emails.
        let emails = match (self.email, self.email_verified) {
            (Some(email), Some(true)) => vec![email],
            _ => Vec::new(),
        };
        FederatedProfile {
            provider: "google".to_string(),
            provider_user_id: self.sub,
            display_name: self.name.unwrap_or_default(),
            emails,
        }
    }
}

fn provider_error(reason: impl std::fmt::Display) -> SquirrelError {
    SquirrelError::Provider {
        reason: reason.to_string(),
    }
}

impl GoogleProvider {
    pub fn new(settings: GoogleSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    async fn fetch_profile(&self, code: &str) -> Result<FederatedProfile, SquirrelError> {
        let token: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("redirect_uri", self.settings.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(provider_error)?
            .json()
            .await
            .map_err(provider_error)?;

        let info: UserInfo = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(provider_error)?
            .json()
            .await
            .map_err(provider_error)?;

        Ok(info.into_profile())
    }
}

impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorize_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.callback_url.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("access_type", "offline"),
            ("state", state),
        ];
        match Url::parse_with_params(AUTHORIZE_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => AUTHORIZE_URL.to_string(),
        }
    }

    fn exchange<'a>(&'a self, code: &'a str) -> ProfileFuture<'a> {
        Box::pin(self.fetch_profile(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        GoogleProvider::new(GoogleSettings {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
            callback_url: "http://localhost:3000/auth/google/callback".to_string(),
            success_redirect: "/".to_string(),
        })
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let url = Url::parse(&provider().authorize_url("abc123")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&("state".to_string(), "abc123".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:3000/auth/google/callback".to_string()
        )));
    }

    #[test]
    fn unverified_email_is_dropped() {
        let info = UserInfo {
            sub: "42".to_string(),
            name: Some("Nutty".to_string()),
            email: Some("n@x.com".to_string()),
            email_verified: Some(false),
        };
        let profile = info.into_profile();
        assert_eq!(profile.provider_user_id, "42");
        assert!(profile.emails.is_empty());
    }

    #[test]
    fn verified_email_is_kept() {
        let info = UserInfo {
            sub: "42".to_string(),
            name: None,
            email: Some("n@x.com".to_string()),
            email_verified: Some(true),
        };
        let profile = info.into_profile();
        assert_eq!(profile.emails, vec!["n@x.com".to_string()]);
        assert_eq!(profile.display_name, "");
    }
}
