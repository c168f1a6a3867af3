// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod google;
pub mod session;

pub use google::{GoogleOAuthClient, ProviderProfile};
pub use session::SessionManager;
