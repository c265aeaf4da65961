//! Sequential document codes
//!
//! Each document kind has one counter row. Incrementing it inside the
//! creating transaction holds the row lock until commit, so concurrent
//! creators never receive the same number, and a rolled-back creation gives
//! its number back.

use shared::DocumentKind;
use sqlx::PgConnection;

use crate::error::AppResult;

/// Reserve the next code for `kind` within the caller's transaction
pub async fn next_code(conn: &mut PgConnection, kind: DocumentKind) -> AppResult<String> {
    let sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (kind, last_value)
        VALUES ($1, 1)
        ON CONFLICT (kind)
        DO UPDATE SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind.as_str())
    .fetch_one(conn)
    .await?;

    Ok(kind.format_code(sequence))
}
