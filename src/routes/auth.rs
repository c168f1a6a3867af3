// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::session_user;
use crate::services::session::SESSION_COOKIE;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Callbacks carrying a state older than this are treated as handshake
/// failures.
const STATE_MAX_AGE_MILLIS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/auth/status", get(auth_status))
        .route("/logout", get(logout))
}

/// Start the sign-in flow - redirect to the Google consent screen.
async fn auth_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = make_oauth_state(&state.config.session_signing_key)?;
    let auth_url = state.google.authorize_url(&oauth_state);

    tracing::info!(
        client_id = %state.config.google_client_id,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - complete the handshake and establish a session.
///
/// Every handshake failure (provider error, missing code, bad state,
/// failed exchange) falls back to the login page without surfacing any
/// detail to the browser. Store failures do surface as server errors.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return Ok(Redirect::to("/").into_response());
    }

    let (Some(code), Some(callback_state)) = (params.code, params.state) else {
        tracing::warn!("OAuth callback missing code or state");
        return Ok(Redirect::to("/").into_response());
    };

    if !verify_oauth_state(&callback_state, &state.config.session_signing_key) {
        tracing::warn!("Invalid or stale OAuth state parameter");
        return Ok(Redirect::to("/").into_response());
    }

    let profile = match state.google.exchange_code(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Code exchange with Google failed");
            return Ok(Redirect::to("/").into_response());
        }
    };

    let user = state.db.find_or_create_user(&profile).await?;

    tracing::info!(
        user_id = %user.id,
        provider_id = %profile.subject_id,
        "Sign-in successful"
    );

    let cookie_value = state.sessions.establish(&user.id);
    let cookie = Cookie::build((SESSION_COOKIE, cookie_value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((jar.add(cookie), Redirect::to("/success")).into_response())
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(rename = "isAuthenticated")]
    is_authenticated: bool,
}

/// Report whether the request carries a valid authenticated session.
///
/// Side-effect-free; safe to poll.
async fn auth_status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<StatusResponse>> {
    let is_authenticated = session_user(&state, &jar).await?.is_some();
    Ok(Json(StatusResponse { is_authenticated }))
}

/// Destroy the session and clear the cookie.
///
/// Cleanup is best-effort; the browser always ends at the login page.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !state.sessions.destroy(cookie.value()) {
            tracing::debug!("Logout without a live server-side session");
        }
        let removal = Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        jar.remove(removal)
    } else {
        jar
    };

    (jar, Redirect::to("/"))
}

/// Build a signed OAuth state value: "nonce|timestamp_hex|signature_hex",
/// base64 encoded for the URL.
fn make_oauth_state(secret: &[u8]) -> Result<String> {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let payload = format!("{}|{:x}", hex::encode(nonce), timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", payload, hex::encode(signature));

    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify the HMAC signature and freshness of an OAuth state parameter.
fn verify_oauth_state(state: &str, secret: &[u8]) -> bool {
    verify_oauth_state_at(state, secret, now_millis())
}

fn verify_oauth_state_at(state: &str, secret: &[u8], now: u128) -> bool {
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(state) else {
        return false;
    };
    let Ok(state_str) = String::from_utf8(bytes) else {
        return false;
    };

    // Format is "nonce|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return false;
    }

    let nonce = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", nonce, timestamp_hex);

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::warn!("OAuth state signature mismatch");
        return false;
    }

    let Ok(timestamp) = u128::from_str_radix(timestamp_hex, 16) else {
        return false;
    };

    if now.saturating_sub(timestamp) > STATE_MAX_AGE_MILLIS {
        tracing::warn!("OAuth state expired");
        return false;
    }

    true
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_state(nonce: &str, timestamp: u128, secret: &[u8]) -> String {
        let payload = format!("{}|{:x}", nonce, timestamp);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes())
    }

    #[test]
    fn test_make_then_verify_state() {
        let secret = b"secret_key";
        let state = make_oauth_state(secret).unwrap();
        assert!(verify_oauth_state(&state, secret));
    }

    #[test]
    fn test_verify_state_invalid_signature() {
        let secret = b"secret_key";
        let payload = format!("{}|{:x}", "abcd", now_millis());
        let state = URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, "bogus").as_bytes());

        assert!(!verify_oauth_state(&state, secret));
    }

    #[test]
    fn test_verify_state_wrong_secret() {
        let state = sign_state("abcd", now_millis(), b"secret_key");
        assert!(!verify_oauth_state(&state, b"wrong_key"));
    }

    #[test]
    fn test_verify_state_malformed() {
        let secret = b"secret_key";
        let state = URL_SAFE_NO_PAD.encode("invalid|format");
        assert!(!verify_oauth_state(&state, secret));
        assert!(!verify_oauth_state("not base64 at all!!", secret));
    }

    #[test]
    fn test_verify_state_expired() {
        let secret = b"secret_key";
        let issued = 1_000_000u128;
        let state = sign_state("abcd", issued, secret);

        // Fresh enough
        assert!(verify_oauth_state_at(
            &state,
            secret,
            issued + STATE_MAX_AGE_MILLIS
        ));
        // One past the limit
        assert!(!verify_oauth_state_at(
            &state,
            secret,
            issued + STATE_MAX_AGE_MILLIS + 1
        ));
    }
}
