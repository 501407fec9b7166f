//! Workflow-scoped secret repository functions.
//!
//! Encryption at rest is the caller's responsibility (an out-of-scope KMS
//! collaborator); this layer stores and returns whatever ciphertext it is
//! given, keyed by `(workflow_id, key)`.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::SecretRow, DbError};

pub async fn put_secret(
    pool: &PgPool,
    workflow_id: Uuid,
    key: &str,
    encrypted_value: &str,
) -> Result<SecretRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        SecretRow,
        r#"
        INSERT INTO secrets (id, workflow_id, key, encrypted_value)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (workflow_id, key) DO UPDATE SET encrypted_value = $4
        RETURNING id, workflow_id, key, encrypted_value
        "#,
        id,
        workflow_id,
        key,
        encrypted_value,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch every secret scoped to a workflow, keyed by name.
pub async fn list_secrets(pool: &PgPool, workflow_id: Uuid) -> Result<HashMap<String, String>, DbError> {
    let rows = sqlx::query_as!(
        SecretRow,
        r#"SELECT id, workflow_id, key, encrypted_value FROM secrets WHERE workflow_id = $1"#,
        workflow_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| (r.key, r.encrypted_value)).collect())
}
