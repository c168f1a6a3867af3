// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, keyed by internal id)
//! - User identities (Google subject -> user id index)
//!
//! The identity index exists so that lookup-or-create can be enforced
//! transactionally: a User document and its identity document are written
//! in one transaction, keyed by the Google subject, so two concurrent
//! first sign-ins for the same subject collapse to a single record.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{User, UserIdentity};
use crate::services::google::ProviderProfile;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by internal id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user by Google subject identifier.
    ///
    /// Resolves through the identity index, then loads the user document.
    pub async fn find_user_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<User>, AppError> {
        let identity: Option<UserIdentity> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_IDENTITIES)
            .obj()
            .one(provider_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(identity) = identity else {
            return Ok(None);
        };

        let user = self.get_user(&identity.user_id).await?;
        if user.is_none() {
            // Index points at a deleted user; treat as absent so the next
            // sign-in recreates the record.
            tracing::warn!(
                provider_id,
                user_id = %identity.user_id,
                "Dangling identity index entry"
            );
        }
        Ok(user)
    }

    /// Look up a user by the profile's subject id, creating one from the
    /// profile if absent.
    ///
    /// Existing users are returned unchanged; profile fields are not
    /// refreshed on later sign-ins. Creation writes the User document and
    /// the identity index document in one transaction, so concurrent first
    /// sign-ins for the same subject produce exactly one user.
    pub async fn find_or_create_user(&self, profile: &ProviderProfile) -> Result<User, AppError> {
        if let Some(user) = self.find_user_by_provider_id(&profile.subject_id).await? {
            return Ok(user);
        }

        let user = User::from_profile(
            uuid::Uuid::new_v4().to_string(),
            profile,
            &chrono::Utc::now().to_rfc3339(),
        );

        match self.create_user_atomic(&user, &profile.subject_id).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %user.id,
                    provider_id = %profile.subject_id,
                    "Created user"
                );
                Ok(user)
            }
            Err(e) => {
                // A concurrent first sign-in may have won the transaction;
                // re-check before surfacing the failure.
                if let Some(existing) =
                    self.find_user_by_provider_id(&profile.subject_id).await?
                {
                    tracing::debug!(
                        provider_id = %profile.subject_id,
                        "Concurrent sign-in created the user first"
                    );
                    return Ok(existing);
                }
                Err(e)
            }
        }
    }

    /// Write a user and its identity index document in one transaction.
    async fn create_user_atomic(&self, user: &User, provider_id: &str) -> Result<(), AppError> {
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read the identity doc within the transaction so it is registered
        // for conflict detection against a racing creator.
        let identity: Option<UserIdentity> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_IDENTITIES)
            .obj()
            .one(provider_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read identity in transaction: {}", e))
            })?;

        if identity.is_some() {
            let _ = transaction.rollback().await;
            return Err(AppError::Database(format!(
                "Identity already registered: {}",
                provider_id
            )));
        }

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        let index_entry = UserIdentity {
            user_id: user.id.clone(),
        };
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_IDENTITIES)
            .document_id(provider_id)
            .object(&index_entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add identity to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }
}
