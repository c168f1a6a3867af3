// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth client for the sign-in flow.
//!
//! Handles:
//! - Building the authorization redirect URL
//! - Exchanging the callback code for an access token
//! - Fetching the OpenID userinfo profile
//!
//! The protocol itself is Google's documented authorization-code flow;
//! nothing here is reimplemented beyond the two HTTP calls.

use crate::error::AppError;
use serde::Deserialize;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: String,
    callback_url: String,
}

impl GoogleOAuthClient {
    /// Create a new client with OAuth credentials and the registered
    /// callback URL.
    pub fn new(client_id: String, client_secret: String, callback_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
            client_id,
            client_secret,
            callback_url,
        }
    }

    /// Override the Google endpoint URLs (for tests against a local stub).
    pub fn with_endpoints(
        mut self,
        auth_url: String,
        token_url: String,
        userinfo_url: String,
    ) -> Self {
        self.auth_url = auth_url;
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    /// Build the consent-screen redirect URL for the given state value.
    ///
    /// Requests the `profile` and `email` scopes.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode("profile email"),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for a verified profile.
    ///
    /// Two round trips: the code is traded for an access token, then the
    /// userinfo endpoint is queried with it. A payload missing the subject,
    /// given name, or an email address is treated as a provider error.
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderApi(format!("Token exchange request failed: {}", e)))?;

        let token: TokenResponse = self.check_response_json(response).await?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::ProviderApi(format!("Userinfo request failed: {}", e)))?;

        let info: UserInfo = self.check_response_json(response).await?;
        ProviderProfile::from_userinfo(info)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ProviderApi(format!("JSON parse error: {}", e)))
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenID userinfo payload.
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    email: Option<String>,
}

/// Verified profile returned by the provider after a completed handshake.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Google subject identifier, stable per account
    pub subject_id: String,
    pub given_name: String,
    pub family_name: Option<String>,
    /// Email addresses, at least one
    pub emails: Vec<String>,
}

impl ProviderProfile {
    fn from_userinfo(info: UserInfo) -> Result<Self, AppError> {
        let subject_id = info
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::ProviderApi("Profile missing subject".to_string()))?;
        let given_name = info
            .given_name
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::ProviderApi("Profile missing given name".to_string()))?;
        let emails: Vec<String> = info.email.into_iter().filter(|e| !e.is_empty()).collect();
        if emails.is_empty() {
            return Err(AppError::ProviderApi(
                "Profile contains no email address".to_string(),
            ));
        }

        Ok(Self {
            subject_id,
            given_name,
            family_name: info.family_name.filter(|s| !s.is_empty()),
            emails,
        })
    }

    /// First (primary) email address.
    pub fn primary_email(&self) -> &str {
        &self.emails[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GoogleOAuthClient {
        GoogleOAuthClient::new(
            "client-123".to_string(),
            "secret".to_string(),
            "http://localhost:5000/auth/google/callback".to_string(),
        )
    }

    #[test]
    fn test_authorize_url_contents() {
        let url = test_client().authorize_url("signed-state");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=profile%20email"));
        assert!(url.contains("state=signed-state"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fauth%2Fgoogle%2Fcallback"
        ));
    }

    #[test]
    fn test_profile_from_complete_userinfo() {
        let info = UserInfo {
            sub: Some("g123".to_string()),
            given_name: Some("Ana".to_string()),
            family_name: Some("Lee".to_string()),
            email: Some("ana@x.com".to_string()),
        };

        let profile = ProviderProfile::from_userinfo(info).unwrap();
        assert_eq!(profile.subject_id, "g123");
        assert_eq!(profile.given_name, "Ana");
        assert_eq!(profile.family_name.as_deref(), Some("Lee"));
        assert_eq!(profile.primary_email(), "ana@x.com");
    }

    #[test]
    fn test_profile_requires_email() {
        let info = UserInfo {
            sub: Some("g123".to_string()),
            given_name: Some("Ana".to_string()),
            family_name: None,
            email: None,
        };

        assert!(matches!(
            ProviderProfile::from_userinfo(info),
            Err(AppError::ProviderApi(_))
        ));
    }

    #[test]
    fn test_profile_requires_subject() {
        let info = UserInfo {
            sub: Some(String::new()),
            given_name: Some("Ana".to_string()),
            family_name: None,
            email: Some("ana@x.com".to_string()),
        };

        assert!(matches!(
            ProviderProfile::from_userinfo(info),
            Err(AppError::ProviderApi(_))
        ));
    }
}
