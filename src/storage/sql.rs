//! Relational backend
//!
//! Two tables in SQLite, driven through `sqlx` on a private current-thread
//! runtime. Each call blocks the caller until its statements complete.
//!
//! ## Schema
//! ```text
//! users(user_name PK, comment_karma, post_karma, total_karma, user_cakeday)
//! posts(unique_id PK, post_url, post_date, post_category,
//!       comments_number, votes_number,
//!       user_name FK -> users.user_name ON UPDATE CASCADE)
//! ```
//!
//! Every value is bound as a parameter; no statement text is built from
//! record contents.

use std::str::FromStr;

use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::runtime::{Builder, Runtime};

use crate::error::{Result, VaultError};
use crate::record::Record;

use super::{parse_line, StorageExecutor, User};

const DROP_TABLES: [&str; 2] = ["DROP TABLE IF EXISTS posts", "DROP TABLE IF EXISTS users"];

const CREATE_TABLES: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS users (
        user_name     TEXT NOT NULL,
        comment_karma TEXT NOT NULL,
        post_karma    TEXT NOT NULL,
        total_karma   TEXT NOT NULL,
        user_cakeday  TEXT NOT NULL,
        CONSTRAINT pk_users PRIMARY KEY (user_name)
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        unique_id       TEXT NOT NULL,
        post_url        TEXT NOT NULL,
        post_date       TEXT NOT NULL,
        post_category   TEXT NOT NULL,
        comments_number TEXT NOT NULL,
        votes_number    TEXT NOT NULL,
        user_name       TEXT NOT NULL REFERENCES users (user_name) ON UPDATE CASCADE,
        CONSTRAINT pk_posts PRIMARY KEY (unique_id)
    )",
];

const SELECT_RECORDS: &str = "SELECT
        posts.unique_id       AS unique_id,
        posts.post_url        AS post_url,
        posts.user_name       AS user_name,
        users.comment_karma   AS comment_karma,
        users.post_karma      AS post_karma,
        users.total_karma     AS total_karma,
        users.user_cakeday    AS user_cakeday,
        posts.post_date       AS post_date,
        posts.comments_number AS comments_number,
        posts.votes_number    AS votes_number,
        posts.post_category   AS post_category
    FROM posts
    JOIN users ON users.user_name = posts.user_name";

/// SQLite storage executor
pub struct SqlExecutor {
    // Declared before the runtime so it is dropped first
    conn: SqliteConnection,
    runtime: Runtime,
}

impl SqlExecutor {
    /// Connect to `url`, creating the database file if needed
    ///
    /// With `clean_slate`, both tables are dropped before being created.
    pub fn open(url: &str, clean_slate: bool) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let conn = runtime.block_on(async {
            let mut conn = options.connect().await?;

            if clean_slate {
                tracing::info!("Dropping outdated tables");
                for statement in DROP_TABLES {
                    sqlx::query(statement).execute(&mut conn).await?;
                }
            }
            for statement in CREATE_TABLES {
                sqlx::query(statement).execute(&mut conn).await?;
            }

            Ok::<_, VaultError>(conn)
        })?;

        tracing::debug!("Connected to {}", url);
        Ok(Self { conn, runtime })
    }

    /// Every row of the users table, ordered by name
    pub fn list_users(&mut self) -> Result<Vec<User>> {
        let conn = &mut self.conn;
        let users = self.runtime.block_on(async move {
            sqlx::query_as::<_, User>(
                "SELECT user_name, comment_karma, post_karma, total_karma, user_cakeday
                 FROM users ORDER BY user_name",
            )
            .fetch_all(conn)
            .await
        })?;
        Ok(users)
    }

    async fn insert_record(conn: &mut SqliteConnection, record: &Record) -> sqlx::Result<String> {
        let mut tx = conn.begin().await?;

        sqlx::query(
            "INSERT INTO users (user_name, comment_karma, post_karma, total_karma, user_cakeday)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_name) DO NOTHING",
        )
        .bind(&record.user_name)
        .bind(&record.comment_karma)
        .bind(&record.post_karma)
        .bind(&record.total_karma)
        .bind(&record.user_cakeday)
        .execute(&mut *tx)
        .await?;

        let id: String = sqlx::query_scalar(
            "INSERT INTO posts (unique_id, post_url, post_date, post_category,
                                comments_number, votes_number, user_name)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING unique_id",
        )
        .bind(&record.unique_id)
        .bind(&record.post_url)
        .bind(&record.post_date)
        .bind(&record.post_category)
        .bind(&record.comments_number)
        .bind(&record.votes_number)
        .bind(&record.user_name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn update_record(
        conn: &mut SqliteConnection,
        record: &Record,
        id: &str,
    ) -> sqlx::Result<bool> {
        let mut tx = conn.begin().await?;

        // Renaming the user cascades to every post referencing it
        sqlx::query(
            "UPDATE users SET
                user_name = ?, comment_karma = ?, post_karma = ?,
                total_karma = ?, user_cakeday = ?
             WHERE user_name IN (SELECT user_name FROM posts WHERE unique_id = ?)",
        )
        .bind(&record.user_name)
        .bind(&record.comment_karma)
        .bind(&record.post_karma)
        .bind(&record.total_karma)
        .bind(&record.user_cakeday)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated: Option<String> = sqlx::query_scalar(
            "UPDATE posts SET
                post_url = ?, post_date = ?, post_category = ?,
                comments_number = ?, votes_number = ?
             WHERE unique_id = ?
             RETURNING unique_id",
        )
        .bind(&record.post_url)
        .bind(&record.post_date)
        .bind(&record.post_category)
        .bind(&record.comments_number)
        .bind(&record.votes_number)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated.is_some())
    }

    async fn delete_record(conn: &mut SqliteConnection, id: &str) -> sqlx::Result<bool> {
        let mut tx = conn.begin().await?;

        let user_name: Option<String> =
            sqlx::query_scalar("DELETE FROM posts WHERE unique_id = ? RETURNING user_name")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(user_name) = user_name else {
            return Ok(false);
        };

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_name = ?")
            .bind(&user_name)
            .fetch_one(&mut *tx)
            .await?;

        if remaining == 0 {
            sqlx::query("DELETE FROM users WHERE user_name = ?")
                .bind(&user_name)
                .execute(&mut *tx)
                .await?;
            tracing::debug!("Removed user {} with its last post", user_name);
        }

        tx.commit().await?;
        Ok(true)
    }
}

/// Constraint violations fail the statement, not the backend
fn is_constraint_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ),
        _ => false,
    }
}

impl StorageExecutor for SqlExecutor {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn insert(&mut self, lines: &[String]) -> Result<Vec<String>> {
        let conn = &mut self.conn;
        self.runtime.block_on(async move {
            let mut ids = Vec::with_capacity(lines.len());
            for line in lines {
                let record = match parse_line(line) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!("Skipping record: {}", e);
                        continue;
                    }
                };

                match Self::insert_record(conn, &record).await {
                    Ok(id) => ids.push(id),
                    Err(e) if is_constraint_violation(&e) => {
                        tracing::warn!("Skipping record {}: {}", record.unique_id, e);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok::<_, VaultError>(ids)
        })
    }

    fn find(&mut self, id: &str) -> Result<Option<Record>> {
        let conn = &mut self.conn;
        let record = self.runtime.block_on(async move {
            sqlx::query_as::<_, Record>(&format!("{} WHERE posts.unique_id = ?", SELECT_RECORDS))
                .bind(id)
                .fetch_optional(conn)
                .await
        })?;
        Ok(record)
    }

    fn find_all(&mut self) -> Result<Vec<Record>> {
        let conn = &mut self.conn;
        let records = self.runtime.block_on(async move {
            sqlx::query_as::<_, Record>(&format!("{} ORDER BY posts.unique_id", SELECT_RECORDS))
                .fetch_all(conn)
                .await
        })?;
        Ok(records)
    }

    fn update(&mut self, record: &Record, id: &str) -> Result<bool> {
        let conn = &mut self.conn;
        match self
            .runtime
            .block_on(async move { Self::update_record(conn, record, id).await })
        {
            Ok(updated) => Ok(updated),
            Err(e) if is_constraint_violation(&e) => {
                tracing::warn!("Update of {} rejected: {}", id, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let conn = &mut self.conn;
        let deleted = self
            .runtime
            .block_on(async move { Self::delete_record(conn, id).await })?;
        Ok(deleted)
    }
}
