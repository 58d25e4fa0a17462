//! User persistence
//!
//! `UserRepository` is the storage capability consumed by the service layer.
//! `SqlUserRepository` is the production implementation backed by SQLite
//! through SQLx. Every statement runs under the configured query timeout;
//! dropping the calling future abandons the in-flight query.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::{DatabaseConfig, NewUser, Role, StoreError, StoreResult, User};

/// Trait for user storage operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return the stored record with id and timestamps.
    /// Fails with `Conflict` when the email is already taken.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Get user by id
    async fn find_by_id(&self, id: i64) -> StoreResult<User>;

    /// Get user by exact email
    async fn find_by_email(&self, email: &str) -> StoreResult<User>;

    /// All users, newest first
    async fn find_all(&self) -> StoreResult<Vec<User>>;

    /// Overwrite the mutable fields of user `id` and bump `updated_at`
    async fn update(&self, id: i64, user: &User) -> StoreResult<User>;

    /// Hard delete
    async fn delete(&self, id: i64) -> StoreResult<()>;

    /// Number of stored users
    async fn count(&self) -> StoreResult<i64>;

    /// Connectivity check used by the health endpoint
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// SQLite-backed user store
#[derive(Clone)]
pub struct SqlUserRepository {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqlUserRepository {
    /// Open a pool for the configured database URL.
    ///
    /// In-memory databases are pinned to a single long-lived connection,
    /// since every SQLite connection gets its own private memory database.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
                }
            }
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        debug!(url = %config.url, "Connected to user database");

        Ok(Self::from_pool(
            pool,
            Duration::from_secs(config.query_timeout_secs),
        ))
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the `users` table and its email index if they do not exist
    pub async fn init_schema(&self) -> StoreResult<()> {
        self.bounded(
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    name          TEXT    NOT NULL,
                    email         TEXT    NOT NULL UNIQUE,
                    password_hash TEXT    NOT NULL,
                    age           INTEGER NOT NULL DEFAULT 0,
                    role          TEXT    NOT NULL DEFAULT 'user',
                    created_at    TEXT    NOT NULL,
                    updated_at    TEXT    NOT NULL
                )
                "#,
            )
            .execute(&self.pool),
        )
        .await?;

        self.bounded(
            sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Database(other),
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    age: i32,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            age: row.age,
            role: Role::parse(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, age, role, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO users
                        (name, email, password_hash, age, role, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.age)
                .bind(user.role.as_str())
                .bind(now)
                .bind(now)
                .execute(&self.pool),
            )
            .await?;

        self.find_by_id(result.last_insert_rowid()).await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row: Option<UserRow> = self
            .bounded(
                sqlx::query_as(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row: Option<UserRow> = self
            .bounded(
                sqlx::query_as(&sql)
                    .bind(email)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn find_all(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let rows: Vec<UserRow> = self
            .bounded(sqlx::query_as(&sql).fetch_all(&self.pool))
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(&self, id: i64, user: &User) -> StoreResult<User> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE users
                    SET name = ?, email = ?, password_hash = ?, age = ?, role = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.age)
                .bind(user.role.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.find_by_id(id).await
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn count(&self) -> StoreResult<i64> {
        self.bounded(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool))
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqlUserRepository {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let store = SqlUserRepository::connect(&config).await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            age: 30,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = store().await;
        let user = store.create(new_user("Alice", "alice@example.com")).await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.name, "Alice");
        assert_eq!(user.password_hash, "hash");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = store().await;
        let first = store.create(new_user("Alice", "dup@example.com")).await.unwrap();

        let err = store
            .create(new_user("Bob", "dup@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let still_there = store.find_by_id(first.id).await.unwrap();
        assert_eq!(still_there, first);
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let store = store().await;
        assert!(matches!(store.find_by_id(42).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.find_by_email("ghost@example.com").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_all_empty_and_newest_first() {
        let store = store().await;
        assert!(store.find_all().await.unwrap().is_empty());

        let a = store.create(new_user("A", "a@example.com")).await.unwrap();
        let b = store.create(new_user("B", "b@example.com")).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b.id);
        assert_eq!(all[1].id, a.id);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = store().await;
        let mut user = store.create(new_user("A", "a@example.com")).await.unwrap();

        user.age = 31;
        user.role = Role::Admin;
        let updated = store.update(user.id, &user).await.unwrap();
        assert_eq!(updated.age, 31);
        assert_eq!(updated.role, Role::Admin);
        assert!(updated.updated_at >= updated.created_at);

        store.delete(user.id).await.unwrap();
        assert!(matches!(store.delete(user.id).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.update(user.id, &user).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_to_taken_email_is_conflict() {
        let store = store().await;
        store.create(new_user("A", "a@example.com")).await.unwrap();
        let mut b = store.create(new_user("B", "b@example.com")).await.unwrap();

        b.email = "a@example.com".to_string();
        assert!(matches!(
            store.update(b.id, &b).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_query_past_deadline_is_timeout() {
        let store = store().await;
        let stalled = SqlUserRepository::from_pool(store.pool().clone(), Duration::ZERO);

        assert!(matches!(stalled.find_all().await, Err(StoreError::Timeout)));
        assert!(matches!(
            stalled.find_by_email("a@example.com").await,
            Err(StoreError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let store = store().await;
        store.init_schema().await.unwrap();
        store.ping().await.unwrap();
    }
}
