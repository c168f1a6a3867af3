// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Landing pages.

use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::services::ServeFile;

use crate::middleware::auth::CurrentUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route_service("/", ServeFile::new("public/login.html"))
}

/// Routes that require a signed-in session (gated in the router).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/success", get(success))
}

/// Post-login landing page.
async fn success(Extension(CurrentUser(user)): Extension<CurrentUser>) -> &'static str {
    tracing::debug!(user_id = %user.id, "Serving success page");
    "Hello World"
}
