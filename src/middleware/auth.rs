// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware.

use crate::error::AppError;
use crate::models::User;
use crate::services::session::SESSION_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated user attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the authenticated user for a request, if any.
///
/// Re-expands the session's user id into a full User from the store. A
/// store error propagates to the caller; a session whose user record no
/// longer exists reads as unauthenticated rather than resolving to a
/// stale identity. Read-only, so status polling never mutates anything;
/// the dangling record itself is cleaned up by logout.
pub async fn session_user(state: &AppState, jar: &CookieJar) -> Result<Option<User>, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    let Some(user_id) = state.sessions.resolve(cookie.value()) else {
        return Ok(None);
    };

    match state.db.get_user(&user_id).await? {
        Some(user) => Ok(Some(user)),
        None => {
            tracing::warn!(user_id = %user_id, "Session references a missing user");
            Ok(None)
        }
    }
}

/// Middleware gating routes that require a signed-in user.
///
/// Unauthenticated requests are redirected to the login page, never
/// rejected with an error status.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match session_user(&state, &jar).await? {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        None => Ok(Redirect::to("/").into_response()),
    }
}
