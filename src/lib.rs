// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! StudentLife API: Google sign-in and session-backed auth for the
//! StudentLife portal.
//!
//! This crate provides the backend that authenticates users with Google,
//! keeps a User document per person in Firestore, and tracks signed-in
//! browsers with server-side sessions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use services::{GoogleOAuthClient, SessionManager};

/// Shared application state, constructed once at startup.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub sessions: SessionManager,
    pub google: GoogleOAuthClient,
}
