use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{ser, user_id_from_i64, user_id_to_i64};
use crate::repository::{StorageError, TokenRecord, TokenRepository};

fn map_token_row(row: &SqliteRow) -> Result<TokenRecord, StorageError> {
    Ok(TokenRecord {
        token: row.try_get("token").map_err(ser)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        issued_at: row.try_get("issued_at").map_err(ser)?,
        expires_at: row.try_get("expires_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl TokenRepository for SqliteRepository {
    async fn store_token(&self, token: &TokenRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO auth_tokens (token, user_id, issued_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(&token.token)
        .bind(user_id_to_i64(token.user_id)?)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<TokenRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT token, user_id, issued_at, expires_at
            FROM auth_tokens
            WHERE token = ?1
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_token_row).transpose()
    }

    async fn delete_token(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM auth_tokens WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
