use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::core::errors::ApiError;

const SCHEMA_VERSION: i64 = 1;
const MAX_HISTORY_LIMIT: i64 = 1000;
const MAX_SESSION_LIST: i64 = 200;
const MAX_TITLE_LEN: usize = 80;
const PREVIEW_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    Human,
    Ai,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Human => "human",
            MessageRole::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub metadata: Value,
    pub created_at: String,
}

/// SQLite-backed store of chat sessions and their messages.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db_path: PathBuf,
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let connect_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { db_path, pool };
        store.init_db().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_db(&self) -> Result<(), ApiError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        if version != SCHEMA_VERSION {
            tracing::info!(
                "Rebuilding chat history schema (found v{}, want v{})",
                version,
                SCHEMA_VERSION
            );
            self.rebuild_schema().await?;
        }

        Ok(())
    }

    async fn rebuild_schema(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("DROP TABLE IF EXISTS messages")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("DROP TABLE IF EXISTS sessions")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "\
            CREATE TABLE sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK(length(trim(title)) > 0),
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "\
            CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('human', 'ai')),
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX idx_sessions_updated_at ON sessions(updated_at DESC)")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("CREATE INDEX idx_messages_session_id_id ON messages(session_id, id)")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        let pragma = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
        sqlx::query(&pragma)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, ApiError> {
        let rows = sqlx::query(
            "\
            SELECT s.id, s.title, s.created_at, s.updated_at,
                   (SELECT COUNT(*) FROM messages WHERE session_id = s.id) as message_count,
                   (SELECT content FROM messages WHERE session_id = s.id ORDER BY id DESC LIMIT 1) as last_message
            FROM sessions s
            ORDER BY s.updated_at DESC
            LIMIT ?1",
        )
        .bind(MAX_SESSION_LIST)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(session_info_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn create_session(&self, title: Option<String>) -> Result<String, ApiError> {
        let session_id = Uuid::new_v4().to_string();
        let title = normalize_title(title.as_deref());

        sqlx::query("INSERT INTO sessions (id, title) VALUES (?1, ?2)")
            .bind(&session_id)
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(session_id)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionDetail>, ApiError> {
        let row =
            sqlx::query("SELECT id, title, created_at, updated_at FROM sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        row.map(session_detail_from_row)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_history(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<HistoryMessage>, ApiError> {
        let limit = sanitize_limit(limit);

        let rows = sqlx::query(
            "\
            SELECT id, role, content, metadata, created_at
            FROM (
                SELECT id, role, content, metadata, created_at
                FROM messages
                WHERE session_id = ?1
                ORDER BY id DESC
                LIMIT ?2
            )
            ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(history_message_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn get_total_message_count(&self) -> Result<i64, ApiError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)
    }

    /// Appends a message, creating the session on first use. `title_hint`
    /// names a newly created session and is ignored for existing ones.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        metadata: &Value,
        title_hint: Option<&str>,
    ) -> Result<i64, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        ensure_session(&mut tx, session_id, title_hint).await?;
        let id = insert_message_tx(&mut tx, session_id, role, content, metadata).await?;
        touch_session_tx(&mut tx, session_id).await?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(id)
    }

    /// Stores a question and its answer together: either both turns are
    /// written or neither is. A new session is titled after the question.
    pub async fn add_exchange(
        &self,
        session_id: &str,
        question: &str,
        question_metadata: &Value,
        answer: &str,
        answer_metadata: &Value,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        ensure_session(&mut tx, session_id, Some(question)).await?;
        insert_message_tx(&mut tx, session_id, MessageRole::Human, question, question_metadata)
            .await?;
        insert_message_tx(&mut tx, session_id, MessageRole::Ai, answer, answer_metadata).await?;
        touch_session_tx(&mut tx, session_id).await?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }
}

async fn insert_message_tx(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &str,
    role: MessageRole,
    content: &str,
    metadata: &Value,
) -> Result<i64, ApiError> {
    let payload = serde_json::to_string(metadata).map_err(ApiError::internal)?;

    let result = sqlx::query(
        "\
        INSERT INTO messages (session_id, role, content, metadata)
        VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(payload)
    .execute(&mut **tx)
    .await
    .map_err(ApiError::internal)?;

    Ok(result.last_insert_rowid())
}

fn session_info_from_row(row: sqlx::sqlite::SqliteRow) -> Result<SessionInfo, sqlx::Error> {
    let last_message: Option<String> = row.try_get("last_message")?;
    let preview = last_message
        .unwrap_or_default()
        .chars()
        .take(PREVIEW_LEN)
        .collect();

    Ok(SessionInfo {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        message_count: row.try_get("message_count")?,
        preview,
    })
}

fn session_detail_from_row(row: sqlx::sqlite::SqliteRow) -> Result<SessionDetail, sqlx::Error> {
    Ok(SessionDetail {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_message_from_row(row: sqlx::sqlite::SqliteRow) -> Result<HistoryMessage, sqlx::Error> {
    let raw_metadata: String = row.try_get("metadata")?;
    let metadata =
        serde_json::from_str(&raw_metadata).unwrap_or(Value::Object(serde_json::Map::new()));

    Ok(HistoryMessage {
        id: row.try_get("id")?,
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

async fn ensure_session(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &str,
    title_hint: Option<&str>,
) -> Result<(), ApiError> {
    sqlx::query("INSERT OR IGNORE INTO sessions (id, title) VALUES (?1, ?2)")
        .bind(session_id)
        .bind(normalize_title(title_hint))
        .execute(&mut **tx)
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}

async fn touch_session_tx(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &str,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE sessions SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
    )
    .bind(session_id)
    .execute(&mut **tx)
    .await
    .map_err(ApiError::internal)?;
    Ok(())
}

fn sanitize_limit(limit: i64) -> i64 {
    if limit <= 0 {
        return 1;
    }
    limit.min(MAX_HISTORY_LIMIT)
}

fn normalize_title(title: Option<&str>) -> String {
    let fallback = || format!("Session {}", Utc::now().format("%Y-%m-%d %H:%M"));

    let Some(raw) = title else {
        return fallback();
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback();
    }

    trimmed.chars().take(MAX_TITLE_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn add_message_creates_session_named_after_first_question() {
        let (_dir, store) = test_store().await;

        store
            .add_message(
                "s1",
                MessageRole::Human,
                "What is a spendthrift clause?",
                &json!({}),
                Some("What is a spendthrift clause?"),
            )
            .await
            .unwrap();
        store
            .add_message(
                "s1",
                MessageRole::Ai,
                "It restricts transfers.",
                &json!({"citations": ["Uniform Trust Code"]}),
                Some("ignored for existing session"),
            )
            .await
            .unwrap();

        let session = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.title, "What is a spendthrift clause?");

        let history = store.get_history("s1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "human");
        assert_eq!(history[1].role, "ai");
        assert_eq!(history[1].metadata["citations"][0], "Uniform Trust Code");
        assert_eq!(store.get_total_message_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn exchange_writes_both_turns() {
        let (_dir, store) = test_store().await;

        store
            .add_exchange(
                "s2",
                "Who can revoke a trust?",
                &json!({}),
                "The settlor, if revocable.",
                &json!({"citations": ["Restatement (Third) of Trusts"]}),
            )
            .await
            .unwrap();

        let session = store.get_session("s2").await.unwrap().unwrap();
        assert_eq!(session.title, "Who can revoke a trust?");
        let history = store.get_history("s2", 10).await.unwrap();
        let roles: Vec<&str> = history.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["human", "ai"]);
    }

    #[tokio::test]
    async fn failed_answer_write_rolls_back_question() {
        let (_dir, store) = test_store().await;
        sqlx::query(
            "\
            CREATE TRIGGER reject_ai BEFORE INSERT ON messages
            WHEN NEW.role = 'ai'
            BEGIN SELECT RAISE(ABORT, 'ai turn rejected'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store
            .add_exchange("s3", "Orphan?", &json!({}), "never stored", &json!({}))
            .await;

        assert!(matches!(result, Err(ApiError::Internal(_))));
        assert!(store.get_history("s3", 10).await.unwrap().is_empty());
        assert!(store.get_session("s3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_limit_keeps_most_recent_in_order() {
        let (_dir, store) = test_store().await;
        for i in 0..5 {
            store
                .add_message("s", MessageRole::Human, &format!("m{}", i), &json!({}), None)
                .await
                .unwrap();
        }

        let history = store.get_history("s", 2).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);

        assert_eq!(store.get_history("s", 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_and_delete_sessions() {
        let (_dir, store) = test_store().await;
        let id = store.create_session(Some("  Estate planning  ".to_string())).await.unwrap();
        store
            .add_message(&id, MessageRole::Human, "hello", &json!({}), None)
            .await
            .unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Estate planning");
        assert_eq!(sessions[0].message_count, 1);
        assert_eq!(sessions[0].preview, "hello");

        assert!(store.delete_session(&id).await.unwrap());
        assert!(!store.delete_session(&id).await.unwrap());
        assert!(store.get_session(&id).await.unwrap().is_none());
        assert_eq!(store.get_total_message_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reopening_keeps_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = HistoryStore::new(path.clone()).await.unwrap();
            store
                .add_message("keep", MessageRole::Human, "persisted", &json!({}), None)
                .await
                .unwrap();
        }

        let reopened = HistoryStore::new(path).await.unwrap();
        assert_eq!(reopened.get_history("keep", 10).await.unwrap().len(), 1);
    }

    #[test]
    fn titles_are_trimmed_and_bounded() {
        assert_eq!(normalize_title(Some("  Trust  ")), "Trust");
        assert!(normalize_title(Some("   ")).starts_with("Session "));
        assert!(normalize_title(None).starts_with("Session "));
        assert_eq!(normalize_title(Some(&"x".repeat(200))).chars().count(), MAX_TITLE_LEN);
    }
}
