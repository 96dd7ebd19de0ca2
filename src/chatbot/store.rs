//! Persistent SQLite store for users, chat history and the dedup log.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

/// One exchange, appended after the reply went out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRecord {
    pub user_id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub message_type: String,
    pub function_used: Option<String>,
    pub timestamp: String,
}

impl ChatRecord {
    pub fn now(
        user_id: i64,
        user_message: &str,
        bot_response: &str,
        message_type: &str,
        function_used: Option<&str>,
    ) -> Self {
        Self {
            user_id,
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            message_type: message_type.to_string(),
            function_used: function_used.map(str::to_string),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub first_name: String,
    pub username: Option<String>,
    pub created_at: String,
    pub last_active: String,
    pub total_messages: u64,
    pub last_location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: u64,
    pub total_chats: u64,
}

/// What the bot needs from persistence. Failures are logged by the implementation
/// and never reach the caller.
pub trait Store: Send + Sync {
    fn is_connected(&self) -> bool;
    /// Insert on first contact; refresh name, username and last activity afterwards.
    fn upsert_user(&self, user_id: i64, first_name: &str, username: Option<&str>);
    fn append_chat(&self, record: &ChatRecord);
    /// Most recent first.
    fn get_recent_chats(&self, user_id: i64, limit: usize) -> Vec<ChatRecord>;
    fn get_user(&self, user_id: i64) -> Option<UserProfile>;
    fn is_processed(&self, chat_id: i64, message_id: i64) -> bool;
    fn mark_processed(&self, chat_id: i64, message_id: i64);
    fn set_location(&self, user_id: i64, lat: f64, lon: f64);
    fn stats(&self) -> Option<StoreStats>;
}

/// Stand-in when the database can't be opened. Every read is empty.
pub struct NullStore;

impl Store for NullStore {
    fn is_connected(&self) -> bool {
        false
    }
    fn upsert_user(&self, _: i64, _: &str, _: Option<&str>) {}
    fn append_chat(&self, _: &ChatRecord) {}
    fn get_recent_chats(&self, _: i64, _: usize) -> Vec<ChatRecord> {
        Vec::new()
    }
    fn get_user(&self, _: i64) -> Option<UserProfile> {
        None
    }
    fn is_processed(&self, _: i64, _: i64) -> bool {
        false
    }
    fn mark_processed(&self, _: i64, _: i64) {}
    fn set_location(&self, _: i64, _: f64, _: f64) {}
    fn stats(&self) -> Option<StoreStats> {
        None
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;

        if let Some(stats) = db.stats() {
            info!("💾 Loaded database from {:?} ({} users, {} chats)", path, stats.users, stats.total_chats);
        }
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        self.lock().execute_batch(r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                username TEXT,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                total_messages INTEGER NOT NULL DEFAULT 0,
                last_lat REAL,
                last_lon REAL,
                last_location_at TEXT
            );

            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                user_message TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                message_type TEXT NOT NULL,
                function_used TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS processed_messages (
                chat_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL,
                processed_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, message_id)
            );

            CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(user_id, id);
        "#)
    }
}

impl Store for Database {
    fn is_connected(&self) -> bool {
        true
    }

    fn upsert_user(&self, user_id: i64, first_name: &str, username: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO users (user_id, first_name, username, created_at, last_active, total_messages)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)
             ON CONFLICT(user_id) DO UPDATE SET
                first_name = ?2,
                username = ?3,
                last_active = ?4",
            params![user_id, first_name, username, now]
        ).unwrap_or_else(|e| {
            warn!("Failed to upsert user {user_id}: {e}");
            0
        });
    }

    fn append_chat(&self, record: &ChatRecord) {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO chat_history (user_id, user_message, bot_response, message_type, function_used, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.user_id,
                record.user_message,
                record.bot_response,
                record.message_type,
                record.function_used,
                record.timestamp
            ]
        ).unwrap_or_else(|e| {
            warn!("Failed to append chat for {}: {e}", record.user_id);
            0
        });

        conn.execute(
            "UPDATE users SET total_messages = total_messages + 1 WHERE user_id = ?1",
            params![record.user_id]
        ).unwrap_or_else(|e| {
            warn!("Failed to bump message count for {}: {e}", record.user_id);
            0
        });
    }

    fn get_recent_chats(&self, user_id: i64, limit: usize) -> Vec<ChatRecord> {
        let conn = self.lock();
        let mut stmt = match conn.prepare(
            "SELECT user_id, user_message, bot_response, message_type, function_used, timestamp
             FROM chat_history WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
        ) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to prepare history query: {e}");
                return Vec::new();
            }
        };

        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok(ChatRecord {
                user_id: row.get(0)?,
                user_message: row.get(1)?,
                bot_response: row.get(2)?,
                message_type: row.get(3)?,
                function_used: row.get(4)?,
                timestamp: row.get(5)?,
            })
        });

        match rows {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                warn!("Failed to load history for {user_id}: {e}");
                Vec::new()
            }
        }
    }

    fn get_user(&self, user_id: i64) -> Option<UserProfile> {
        self.lock().query_row(
            "SELECT user_id, first_name, username, created_at, last_active, total_messages,
                    last_lat, last_lon, last_location_at
             FROM users WHERE user_id = ?1",
            params![user_id],
            |row| {
                let lat: Option<f64> = row.get(6)?;
                let lon: Option<f64> = row.get(7)?;
                let at: Option<String> = row.get(8)?;
                let last_location = match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(Location { lat, lon, timestamp: at.unwrap_or_default() }),
                    _ => None,
                };
                Ok(UserProfile {
                    user_id: row.get(0)?,
                    first_name: row.get(1)?,
                    username: row.get(2)?,
                    created_at: row.get(3)?,
                    last_active: row.get(4)?,
                    total_messages: row.get::<_, i64>(5)?.max(0) as u64,
                    last_location,
                })
            },
        )
        .optional()
        .unwrap_or_else(|e| {
            warn!("Failed to load user {user_id}: {e}");
            None
        })
    }

    fn is_processed(&self, chat_id: i64, message_id: i64) -> bool {
        self.lock().query_row(
            "SELECT 1 FROM processed_messages WHERE chat_id = ?1 AND message_id = ?2",
            params![chat_id, message_id],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .unwrap_or_else(|e| {
            warn!("Failed to check dedup log: {e}");
            false
        })
    }

    fn mark_processed(&self, chat_id: i64, message_id: i64) {
        self.lock().execute(
            "INSERT OR IGNORE INTO processed_messages (chat_id, message_id, processed_at) VALUES (?1, ?2, ?3)",
            params![chat_id, message_id, Utc::now().to_rfc3339()]
        ).unwrap_or_else(|e| {
            warn!("Failed to mark message {chat_id}/{message_id} processed: {e}");
            0
        });
    }

    fn set_location(&self, user_id: i64, lat: f64, lon: f64) {
        self.lock().execute(
            "UPDATE users SET last_lat = ?2, last_lon = ?3, last_location_at = ?4 WHERE user_id = ?1",
            params![user_id, lat, lon, Utc::now().to_rfc3339()]
        ).unwrap_or_else(|e| {
            warn!("Failed to save location for {user_id}: {e}");
            0
        });
    }

    fn stats(&self) -> Option<StoreStats> {
        let conn = self.lock();
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)).ok()?;
        let chats: i64 = conn.query_row("SELECT COUNT(*) FROM chat_history", [], |row| row.get(0)).ok()?;
        Some(StoreStats { users: users as u64, total_chats: chats as u64 })
    }
}
