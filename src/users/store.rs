//! `SQLite` storage for user records.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, Row};
use tokio_rusqlite::Connection;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::users::error::{UserError, UserResult};
use crate::users::model::{NewUser, User};
use crate::users::password::hash_password;

/// Boxed future type for user store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const USER_COLUMNS: &str =
    "id, username, email, subscriber, ai_personality, created_at, updated_at";

/// User record store.
pub trait UserStore: Send + Sync {
    /// Create a user, hashing its password.
    ///
    /// # Errors
    /// Returns `InvalidInput`, `DuplicateEmail`, or a storage error.
    fn create(&self, user: NewUser) -> StoreFuture<'_, UserResult<User>>;

    /// List every user, oldest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list(&self) -> StoreFuture<'_, UserResult<Vec<User>>>;

    /// Look a user up by email.
    ///
    /// # Errors
    /// Returns `NotFound` when no user has this email.
    fn get_by_email(&self, email: &str) -> StoreFuture<'_, UserResult<User>>;
}

/// `SQLite` implementation of the user store.
pub struct SqliteUserStore {
    conn: Connection,
}

impl SqliteUserStore {
    /// Open the database file and create the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &DatabaseConfig) -> UserResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        info!(path = %config.sqlite_path.display(), "opened user database");
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open_in_memory() -> UserResult<Self> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> UserResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    subscriber INTEGER NOT NULL DEFAULT 0,
                    password_hash TEXT NOT NULL,
                    ai_personality TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

fn read_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: i64 = row.get(5)?;
    let updated_at: i64 = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        subscriber: row.get(3)?,
        ai_personality: row.get(4)?,
        created_at: from_millis(created_at),
        updated_at: from_millis(updated_at),
    })
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

impl UserStore for SqliteUserStore {
    fn create(&self, user: NewUser) -> StoreFuture<'_, UserResult<User>> {
        Box::pin(async move {
            let user = user.normalized()?;
            // Argon2 is CPU-bound; keep it off the async workers.
            let password = user.password.clone();
            let password_hash =
                tokio::task::spawn_blocking(move || hash_password(&password)).await??;
            let now = Utc::now();
            let millis = now.timestamp_millis();
            let email = user.email.clone();
            let username = user.username.clone();
            let ai_personality = user.ai_personality.clone();
            let subscriber = user.subscriber;

            let inserted = self
                .conn
                .call(move |conn| {
                    let result = conn.execute(
                        "INSERT INTO users (username, email, subscriber, password_hash, ai_personality, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                        rusqlite::params![
                            username,
                            email,
                            subscriber,
                            password_hash,
                            ai_personality,
                            millis
                        ],
                    );
                    match result {
                        Ok(_) => Ok(Some(conn.last_insert_rowid())),
                        Err(rusqlite::Error::SqliteFailure(err, _))
                            if err.code == ErrorCode::ConstraintViolation =>
                        {
                            Ok(None)
                        }
                        Err(err) => Err(err.into()),
                    }
                })
                .await?;

            let Some(id) = inserted else {
                return Err(UserError::DuplicateEmail(user.email));
            };
            info!(user_id = id, "created user");

            Ok(User {
                id,
                username: user.username,
                email: user.email,
                subscriber: user.subscriber,
                ai_personality: user.ai_personality,
                created_at: from_millis(millis),
                updated_at: from_millis(millis),
            })
        })
    }

    fn list(&self) -> StoreFuture<'_, UserResult<Vec<User>>> {
        Box::pin(async move {
            let users = self
                .conn
                .call(|conn| {
                    let mut stmt =
                        conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
                    let users = stmt
                        .query_map([], read_user)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(users)
                })
                .await?;
            Ok(users)
        })
    }

    fn get_by_email(&self, email: &str) -> StoreFuture<'_, UserResult<User>> {
        let email = email.trim().to_ascii_lowercase();
        Box::pin(async move {
            let lookup = email.clone();
            let user = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
                    ))?;
                    let mut rows = stmt.query_map(rusqlite::params![lookup], read_user)?;
                    Ok(rows.next().transpose()?)
                })
                .await?;
            user.ok_or(UserError::NotFound(email))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::users::password::verify_password;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            subscriber: true,
            password: "s3cret-pass".to_string(),
            ai_personality: Some("friendly".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();

        let created = store.create(new_user("ada", "ada@example.com")).await.unwrap();
        assert_eq!(created.id, 1);
        assert!(created.subscriber);

        let fetched = store.get_by_email("ADA@example.com").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();
        store.create(new_user("ada", "ada@example.com")).await.unwrap();

        let err = store
            .create(new_user("other", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail(email) if email == "ada@example.com"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_user() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();
        let err = store.get_by_email("nobody@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "User with email nobody@example.com not found");
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();
        store.create(new_user("ada", "ada@example.com")).await.unwrap();
        store.create(new_user("bob", "bob@example.com")).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.username)
            .collect();
        assert_eq!(names, vec!["ada", "bob"]);
    }

    #[tokio::test]
    async fn test_password_stored_hashed() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();
        store.create(new_user("ada", "ada@example.com")).await.unwrap();

        let stored: String = store
            .conn
            .call(|conn| {
                Ok(conn.query_row("SELECT password_hash FROM users", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_ne!(stored, "s3cret-pass");
        assert!(verify_password("s3cret-pass", &stored).unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_runtime_responsive() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let ticker = tokio::spawn({
            let done = Arc::clone(&done);
            async move {
                let mut worst = Duration::ZERO;
                let mut last = Instant::now();
                while !done.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    let now = Instant::now();
                    worst = worst.max(now - last);
                    last = now;
                }
                worst
            }
        });

        for index in 0..5 {
            store
                .create(new_user("ada", &format!("ada{index}@example.com")))
                .await
                .unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let worst = ticker.await.unwrap();
        assert!(worst < Duration::from_millis(100), "runtime stalled for {worst:?}");
    }

    #[tokio::test]
    async fn test_invalid_input_not_stored() {
        let store = SqliteUserStore::open_in_memory().await.unwrap();
        let err = store.create(new_user("ada", "not-an-email")).await.unwrap_err();
        assert!(matches!(err, UserError::InvalidInput(_)));
        assert!(store.list().await.unwrap().is_empty());
    }
}
