// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides storage for:
//! - Credentials (Strava OAuth tokens, keyed by athlete)
//! - Activities (cached Strava activities, keyed by activity)

use crate::db::{collections, ActivityStore, UpsertOutcome};
use crate::error::AppError;
use crate::models::{ActivityRecord, Credential};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
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

        Ok(Self { client })
    }

    /// Fetch an activity regardless of owner.
    async fn find_activity(&self, activity_id: u64) -> Result<Option<ActivityRecord>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(&activity_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_activity(&self, record: &ActivityRecord) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(record.id.to_string())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for FirestoreDb {
    // ─── Credential Operations ───────────────────────────────────

    async fn get_credential(&self, athlete_id: u64) -> Result<Option<Credential>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn save_credential(&self, credential: &Credential) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(credential.athlete_id.to_string())
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_athlete_ids(&self) -> Result<Vec<u64>, AppError> {
        let credentials: Vec<Credential> = self
            .client
            .fluent()
            .select()
            .from(collections::CREDENTIALS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(credentials.into_iter().map(|c| c.athlete_id).collect())
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<Option<ActivityRecord>, AppError> {
        Ok(self
            .find_activity(activity_id)
            .await?
            .filter(|r| r.athlete_id == athlete_id))
    }

    async fn activity_exists(&self, activity_id: u64) -> Result<bool, AppError> {
        Ok(self.find_activity(activity_id).await?.is_some())
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), AppError> {
        let _: ActivityRecord = self
            .client
            .fluent()
            .insert()
            .into(collections::ACTIVITIES)
            .document_id(record.id.to_string())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_activity(&self, record: &ActivityRecord) -> Result<(), AppError> {
        if self.find_activity(record.id).await?.is_none() {
            return Err(AppError::Database(format!(
                "Activity {} does not exist",
                record.id
            )));
        }
        self.write_activity(record).await
    }

    async fn rename_activity(
        &self,
        activity_id: u64,
        athlete_id: u64,
        name: &str,
    ) -> Result<(), AppError> {
        let mut record = self
            .get_activity(activity_id, athlete_id)
            .await?
            .ok_or_else(|| {
                AppError::Database(format!(
                    "Activity {} does not exist for athlete {}",
                    activity_id, athlete_id
                ))
            })?;
        record.name = name.to_string();

        // Field mask keeps every other stored field untouched.
        let _: () = self
            .client
            .fluent()
            .update()
            .fields(["name"])
            .in_col(collections::ACTIVITIES)
            .document_id(activity_id.to_string())
            .object(&record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Existence check and write committed in one Firestore transaction.
    async fn upsert_activity(&self, record: &ActivityRecord) -> Result<UpsertOutcome, AppError> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let outcome = match self.find_activity(record.id).await? {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };

        self.client
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(record.id.to_string())
            .object(record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add activity to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(outcome)
    }
}
