use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::agents::{Content, Event};
use crate::config::SessionLocation;

// ── Session types ───────────────────────────────────────────────

/// A persisted conversation with the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    /// Arbitrary JSON object supplied at creation.
    pub state: serde_json::Value,
    /// Empty in listings; populated by [`SessionStore::get_session`].
    pub events: Vec<Event>,
    pub last_update_time: DateTime<Utc>,
}

/// Outcome of creating a session with a caller-chosen id.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Session),
    AlreadyExists,
}

// ── SQLite store ────────────────────────────────────────────────

pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    pub fn open(location: &SessionLocation) -> Result<Self> {
        let conn = match location {
            SessionLocation::Memory => {
                Connection::open_in_memory().context("Failed to open in-memory session DB")?
            }
            SessionLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create session dir: {}", parent.display())
                    })?;
                }
                let conn = Connection::open(path)
                    .with_context(|| format!("Failed to open session DB: {}", path.display()))?;
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous  = NORMAL;",
                )?;
                conn
            }
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                app_name     TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                id           TEXT NOT NULL,
                state        TEXT NOT NULL DEFAULT '{}',
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                PRIMARY KEY (app_name, user_id, id)
            );
            CREATE TABLE IF NOT EXISTS events (
                seq           INTEGER PRIMARY KEY AUTOINCREMENT,
                id            TEXT NOT NULL,
                app_name      TEXT NOT NULL,
                user_id       TEXT NOT NULL,
                session_id    TEXT NOT NULL,
                invocation_id TEXT NOT NULL,
                author        TEXT NOT NULL,
                content       TEXT NOT NULL,
                timestamp     TEXT NOT NULL,
                FOREIGN KEY (app_name, user_id, session_id)
                    REFERENCES sessions (app_name, user_id, id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON events(app_name, user_id, session_id);",
        )?;
        Ok(())
    }

    /// Create a session. A missing id gets a fresh UUID.
    pub fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
        state: Option<serde_json::Value>,
    ) -> Result<CreateOutcome> {
        let id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let state = state.unwrap_or_else(|| serde_json::json!({}));
        if !state.is_object() {
            anyhow::bail!("Session state must be a JSON object");
        }
        let now = Utc::now();

        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sessions (app_name, user_id, id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![app_name, user_id, id, state.to_string(), now.to_rfc3339()],
        )?;
        if inserted == 0 {
            return Ok(CreateOutcome::AlreadyExists);
        }

        Ok(CreateOutcome::Created(Session {
            id,
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state,
            events: Vec::new(),
            last_update_time: now,
        }))
    }

    /// Fetch a session with all its events, oldest first.
    pub fn get_session(&self, app_name: &str, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        let Some(mut session) = conn
            .query_row(
                "SELECT id, state, updated_at FROM sessions
                 WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
                params![app_name, user_id, session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .map(|(id, state, updated)| row_to_session(app_name, user_id, id, &state, &updated))
            .transpose()?
        else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, invocation_id, author, content, timestamp FROM events
             WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![app_name, user_id, session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        for row in rows {
            let (id, invocation_id, author, content, timestamp) = row?;
            let content: Content = serde_json::from_str(&content)
                .with_context(|| format!("Corrupt content for event {id}"))?;
            session.events.push(Event {
                id,
                invocation_id,
                author,
                content,
                timestamp: parse_timestamp(&timestamp)?,
            });
        }

        Ok(Some(session))
    }

    /// List a user's sessions without events, most recently updated first.
    pub fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, state, updated_at FROM sessions
             WHERE app_name = ?1 AND user_id = ?2
             ORDER BY updated_at DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![app_name, user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, state, updated) = row?;
            sessions.push(row_to_session(app_name, user_id, id, &state, &updated)?);
        }
        Ok(sessions)
    }

    /// Delete a session and its events. Returns false when it did not exist.
    pub fn delete_session(&self, app_name: &str, user_id: &str, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
            params![app_name, user_id, session_id],
        )?;
        Ok(deleted > 0)
    }

    /// Append events atomically and bump the session's update time.
    pub fn append_events(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        events: &[Event],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let touched = tx.execute(
            "UPDATE sessions SET updated_at = ?4
             WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
            params![app_name, user_id, session_id, Utc::now().to_rfc3339()],
        )?;
        if touched == 0 {
            anyhow::bail!("Session not found: {app_name}/{user_id}/{session_id}");
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO events
                    (id, app_name, user_id, session_id, invocation_id, author, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.id,
                    app_name,
                    user_id,
                    session_id,
                    event.invocation_id,
                    event.author,
                    serde_json::to_string(&event.content)?,
                    event.timestamp.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in session DB: {raw}"))?
        .with_timezone(&Utc))
}

fn row_to_session(
    app_name: &str,
    user_id: &str,
    id: String,
    state: &str,
    updated: &str,
) -> Result<Session> {
    Ok(Session {
        state: serde_json::from_str(state)
            .with_context(|| format!("Corrupt state for session {id}"))?,
        id,
        app_name: app_name.to_string(),
        user_id: user_id.to_string(),
        events: Vec::new(),
        last_update_time: parse_timestamp(updated)?,
    })
}
