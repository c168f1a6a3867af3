// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session management.
//!
//! A session maps an opaque random id to an in-process record referencing
//! a user id. The browser only ever holds the signed cookie form of the
//! id; the record itself never leaves the server. Records live for the
//! process lifetime (no expiry policy) and are dropped on logout.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the signed session id.
pub const SESSION_COOKIE: &str = "studentlife_session";

const SESSION_ID_BYTES: usize = 32;

/// Server-held session record.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Internal id of the authenticated user
    pub user_id: String,
    /// When the session was established (RFC 3339)
    pub created_at: String,
}

/// In-process session store with signed-cookie encoding.
pub struct SessionManager {
    signing_key: Vec<u8>,
    sessions: DashMap<String, SessionRecord>,
}

impl SessionManager {
    pub fn new(signing_key: Vec<u8>) -> Self {
        Self {
            signing_key,
            sessions: DashMap::new(),
        }
    }

    /// Establish a session for a user and return the signed cookie value.
    pub fn establish(&self, user_id: &str) -> String {
        let mut raw = [0u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let session_id = URL_SAFE_NO_PAD.encode(raw);

        self.sessions.insert(
            session_id.clone(),
            SessionRecord {
                user_id: user_id.to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        );

        self.sign(&session_id)
    }

    /// Resolve a cookie value to the referenced user id.
    ///
    /// Returns None for tampered values and for ids with no live record.
    pub fn resolve(&self, cookie_value: &str) -> Option<String> {
        let session_id = self.verify(cookie_value)?;
        self.sessions
            .get(&session_id)
            .map(|record| record.user_id.clone())
    }

    /// Destroy the session referenced by a cookie value.
    ///
    /// Returns true if a record was removed.
    pub fn destroy(&self, cookie_value: &str) -> bool {
        let Some(session_id) = self.verify(cookie_value) else {
            return false;
        };
        self.sessions.remove(&session_id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Encode "session_id|signature_hex" as URL-safe base64.
    fn sign(&self, session_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC accepts keys of any length");
        mac.update(session_id.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        URL_SAFE_NO_PAD.encode(format!("{}|{}", session_id, signature).as_bytes())
    }

    /// Verify a cookie value's signature and return the session id.
    fn verify(&self, cookie_value: &str) -> Option<String> {
        let bytes = URL_SAFE_NO_PAD.decode(cookie_value).ok()?;
        let decoded = String::from_utf8(bytes).ok()?;

        let (session_id, signature_hex) = decoded.split_once('|')?;

        let mut mac = HmacSha256::new_from_slice(&self.signing_key).ok()?;
        mac.update(session_id.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if signature_hex != expected {
            tracing::warn!("Session cookie signature mismatch");
            return None;
        }

        Some(session_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(b"test_session_key_32_bytes_min!!".to_vec())
    }

    #[test]
    fn test_establish_then_resolve() {
        let sessions = manager();
        let cookie = sessions.establish("user-1");

        assert_eq!(sessions.resolve(&cookie), Some("user-1".to_string()));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_destroy_removes_record() {
        let sessions = manager();
        let cookie = sessions.establish("user-1");

        assert!(sessions.destroy(&cookie));
        assert_eq!(sessions.resolve(&cookie), None);
        assert!(sessions.is_empty());

        // Second destroy is a no-op
        assert!(!sessions.destroy(&cookie));
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let sessions = manager();
        let cookie = sessions.establish("user-1");

        let mut tampered = cookie.clone();
        tampered.pop();
        tampered.push('A');
        assert_eq!(sessions.resolve(&tampered), None);

        assert_eq!(sessions.resolve("not-even-base64!!"), None);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sessions = manager();
        let cookie = sessions.establish("user-1");

        let other = SessionManager::new(b"another_key_entirely_1234567890".to_vec());
        assert_eq!(other.resolve(&cookie), None);
    }

    #[test]
    fn test_sessions_are_independent() {
        let sessions = manager();
        let first = sessions.establish("user-1");
        let second = sessions.establish("user-2");

        assert!(sessions.destroy(&first));
        assert_eq!(sessions.resolve(&second), Some("user-2".to_string()));
    }
}
