use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, sqlite::SqliteRow, FromRow, Row, SqlitePool};

/// The signed-in student, kept between runs. At most one row exists.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn save(&self, user_id: &str, username: &str) -> Result<()> {
        query(
            r#"INSERT OR REPLACE INTO credentials (slot, user_id, username, logged_in_at)
                VALUES (1, ?1, ?2, CURRENT_TIMESTAMP)"#,
        )
        .bind(user_id)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<StoredCredentials>> {
        let row = query_as::<_, StoredCredentials>(
            r#"SELECT user_id, username, logged_in_at FROM credentials WHERE slot = 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn clear(&self) -> Result<bool> {
        let affected = query(r#"DELETE FROM credentials"#)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredentials {
    pub user_id: String,
    pub username: String,
    pub logged_in_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for StoredCredentials {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            logged_in_at: row.try_get("logged_in_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_pool;

    async fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(&dir.path().join("test.db")).await.unwrap();
        (dir, CredentialStore::new(pool))
    }

    #[tokio::test]
    async fn empty_store_has_no_credentials() {
        let (_dir, store) = store().await;
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.clear().await.unwrap());
    }

    #[tokio::test]
    async fn save_replaces_previous_login() {
        let (_dir, store) = store().await;
        store.save("7", "andi").await.unwrap();
        store.save("9", "budi").await.unwrap();

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.user_id, "9");
        assert_eq!(stored.username, "budi");
    }

    #[tokio::test]
    async fn clear_removes_login() {
        let (_dir, store) = store().await;
        store.save("7", "andi").await.unwrap();
        assert!(store.clear().await.unwrap());
        assert!(store.load().await.unwrap().is_none());
        store.close().await;
    }
}
