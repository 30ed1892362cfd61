use aptitude_core::model::UserId;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{ser, user_id_from_i64, user_id_to_i64};
use crate::repository::{NewUser, StorageError, UserRecord, UserRepository};

fn map_user_row(row: &SqliteRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        id: user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        username: row.try_get("username").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        password_hash: row.try_get("password_hash").map_err(ser)?,
        full_name: row.try_get("full_name").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (username, email, password_hash, full_name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StorageError::Conflict
            } else {
                StorageError::Connection(e.to_string())
            }
        })?;

        Ok(UserRecord {
            id: user_id_from_i64(res.last_insert_rowid())?,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
        })
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, password_hash, full_name, created_at
            FROM users
            WHERE username = ?1 OR email = ?1
            ",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, password_hash, full_name, created_at
            FROM users
            WHERE id = ?1
            ",
        )
        .bind(user_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_user_row).transpose()
    }
}
