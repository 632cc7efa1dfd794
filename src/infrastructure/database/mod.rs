//! SQLite-backed directory of users, vinebots, edges and invites

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::application::errors::StoreError;
use crate::domain::entities::{Broadcast, Conversation, Edge, Invite, User};
use crate::domain::traits::{
    ConversationStore, EdgeStore, InviteStore, LockOwner, Locked, UserStore,
};

pub struct Database {
    conn: Mutex<Connection>,
    locks: Mutex<HashSet<String>>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
            locks: Mutex::new(HashSet::new()),
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                stage TEXT,
                online INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS vinebots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT UNIQUE NOT NULL
            );
            CREATE TABLE IF NOT EXISTS participants (
                vinebot_id INTEGER NOT NULL,
                user_name TEXT NOT NULL,
                PRIMARY KEY (vinebot_id, user_name),
                FOREIGN KEY (vinebot_id) REFERENCES vinebots(id)
            );
            CREATE TABLE IF NOT EXISTS edges (
                from_user TEXT NOT NULL,
                to_user TEXT NOT NULL,
                vinebot_id INTEGER NOT NULL,
                PRIMARY KEY (from_user, to_user),
                FOREIGN KEY (vinebot_id) REFERENCES vinebots(id)
            );
            CREATE TABLE IF NOT EXISTS invites (
                code TEXT PRIMARY KEY,
                sender TEXT NOT NULL,
                invitee TEXT
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vinebot_id INTEGER NOT NULL,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                sent_on TEXT NOT NULL,
                recipients TEXT NOT NULL,
                FOREIGN KEY (vinebot_id) REFERENCES vinebots(id)
            );
            CREATE INDEX IF NOT EXISTS idx_messages_vinebot ON messages(vinebot_id, sender);",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn acquire(&self, key: &str) -> Result<(), StoreError> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::Poisoned)?;
        if !locks.insert(key.to_string()) {
            return Err(StoreError::Locked(key.to_string()));
        }
        tracing::debug!("Acquired lock {}", key);
        Ok(())
    }

    /// Lock `key` and fetch its record, releasing again if the fetch fails
    fn lock_with<T>(
        &self,
        key: String,
        fetch: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<Locked<'_, T>, StoreError> {
        self.acquire(&key)?;
        match fetch() {
            Ok(record) => Ok(Locked::new(record, key, self)),
            Err(e) => {
                self.release_lock(&key);
                Err(e)
            }
        }
    }

    pub fn held_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    // Seeding

    pub fn add_user(&self, name: &str, stage: Option<&str>) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (name, stage) VALUES (?1, ?2)",
            rusqlite::params![name, stage],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_online(&self, name: &str, online: bool) -> Result<(), StoreError> {
        let rows = self.conn()?.execute(
            "UPDATE users SET online = ?1 WHERE name = ?2",
            rusqlite::params![online, name],
        )?;
        if rows == 0 {
            return Err(StoreError::UserNotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn add_conversation(&self, address: &str, participants: &[&str]) -> Result<i64, StoreError> {
        let id = {
            let conn = self.conn()?;
            conn.execute("INSERT INTO vinebots (address) VALUES (?1)", [address])?;
            conn.last_insert_rowid()
        };
        self.set_participants(id, participants)?;
        Ok(id)
    }

    pub fn set_participants(&self, conversation_id: i64, participants: &[&str]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM participants WHERE vinebot_id = ?1", [conversation_id])?;
        for name in participants {
            tx.execute(
                "INSERT INTO participants (vinebot_id, user_name) VALUES (?1, ?2)",
                rusqlite::params![conversation_id, name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn add_edge(&self, from: &str, to: &str, conversation_id: i64) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO edges (from_user, to_user, vinebot_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![from, to, conversation_id],
        )?;
        Ok(())
    }

    pub fn add_invite(&self, code: &str, sender: &str, invitee: Option<&str>) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO invites (code, sender, invitee) VALUES (?1, ?2, ?3)",
            rusqlite::params![code, sender, invitee],
        )?;
        Ok(())
    }

    /// Close the connection once no more work is scheduled
    pub fn close(self) -> Result<(), StoreError> {
        let held = self.held_locks();
        if held > 0 {
            tracing::warn!("Closing database with {} locks still held", held);
        }
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Database(e))?;
        tracing::info!("Database closed");
        Ok(())
    }

    fn load_conversation(conn: &Connection, id: i64, address: String) -> Result<Conversation, StoreError> {
        let mut stmt = conn.prepare("SELECT user_name FROM participants WHERE vinebot_id = ?1")?;
        let participants = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut stmt = conn.prepare("SELECT from_user, to_user FROM edges WHERE vinebot_id = ?1")?;
        let mut edge_users = BTreeSet::new();
        let rows = stmt.query_map([id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (from, to) = row?;
            edge_users.insert(from);
            edge_users.insert(to);
        }

        Ok(Conversation {
            id,
            address,
            participants,
            edge_users,
        })
    }

    fn conversation_id(&self, address: &str) -> Result<i64, StoreError> {
        self.conn()?
            .query_row("SELECT id FROM vinebots WHERE address = ?1", [address], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StoreError::ConversationNotFound(address.to_string()))
    }

    fn conversation_by_id(&self, id: i64) -> Result<Conversation, StoreError> {
        let conn = self.conn()?;
        let address: Option<String> = conn
            .query_row("SELECT address FROM vinebots WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        let address = address.ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
        Self::load_conversation(&conn, id, address)
    }
}

impl LockOwner for Database {
    fn release_lock(&self, key: &str) {
        match self.locks.lock() {
            Ok(mut locks) => {
                if !locks.remove(key) {
                    tracing::warn!("Released lock {} that was not held", key);
                }
            }
            Err(_) => tracing::error!("Lock table poisoned while releasing {}", key),
        }
    }
}

impl UserStore for Database {
    fn fetch_user(&self, name: &str) -> Result<User, StoreError> {
        self.conn()?
            .query_row(
                "SELECT id, name, stage, online FROM users WHERE name = ?1",
                [name],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        stage: row.get(2)?,
                        online: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))
    }

    fn lock_user(&self, name: &str) -> Result<Locked<'_, User>, StoreError> {
        self.lock_with(format!("user:{}", name), || self.fetch_user(name))
    }

    fn set_stage(&self, user_id: i64, stage: Option<&str>) -> Result<(), StoreError> {
        let rows = self.conn()?.execute(
            "UPDATE users SET stage = ?1 WHERE id = ?2",
            rusqlite::params![stage, user_id],
        )?;
        if rows == 0 {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }
}

impl ConversationStore for Database {
    fn lock_conversation(&self, address: &str) -> Result<Locked<'_, Conversation>, StoreError> {
        let id = self.conversation_id(address)?;
        self.lock_with(format!("vinebot:{}", id), || self.conversation_by_id(id))
    }

    fn lock_conversation_by_id(&self, id: i64) -> Result<Locked<'_, Conversation>, StoreError> {
        self.lock_with(format!("vinebot:{}", id), || self.conversation_by_id(id))
    }

    fn last_message_from(&self, conversation_id: i64, sender: &str) -> Result<Option<Broadcast>, StoreError> {
        let row: Option<(String, String, String, String)> = self
            .conn()?
            .query_row(
                "SELECT sender, body, sent_on, recipients FROM messages
                 WHERE vinebot_id = ?1 AND sender = ?2
                 ORDER BY id DESC LIMIT 1",
                rusqlite::params![conversation_id, sender],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((sender, body, sent_on, recipients)) = row else {
            return Ok(None);
        };
        let sent_on = DateTime::parse_from_rfc3339(&sent_on)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .with_timezone(&Utc);
        let recipients: BTreeSet<String> =
            serde_json::from_str(&recipients).map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Some(Broadcast {
            sender,
            body,
            sent_on,
            recipients,
        }))
    }

    fn record_message(&self, conversation_id: i64, sender: &str, body: &str) -> Result<(), StoreError> {
        let recipients = self.conversation_by_id(conversation_id)?.participants;
        let recipients =
            serde_json::to_string(&recipients).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.conn()?.execute(
            "INSERT INTO messages (vinebot_id, sender, body, sent_on, recipients) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![conversation_id, sender, body, Utc::now().to_rfc3339(), recipients],
        )?;
        Ok(())
    }
}

impl EdgeStore for Database {
    fn edge(&self, from: &str, to: &str) -> Result<Edge, StoreError> {
        let conversation_id: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT vinebot_id FROM edges WHERE from_user = ?1 AND to_user = ?2",
                [from, to],
                |row| row.get(0),
            )
            .optional()?;

        conversation_id
            .map(|conversation_id| Edge {
                from: from.to_string(),
                to: to.to_string(),
                conversation_id,
            })
            .ok_or_else(|| StoreError::EdgeNotFound {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}

impl InviteStore for Database {
    fn invite_for(&self, invitee: &str) -> Result<Invite, StoreError> {
        self.conn()?
            .query_row(
                "SELECT code, sender, invitee FROM invites WHERE invitee = ?1",
                [invitee],
                |row| {
                    Ok(Invite {
                        code: row.get(0)?,
                        sender: row.get(1)?,
                        invitee: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::InviteNotFound(invitee.to_string()))
    }

    fn invites_sent_by(&self, sender: &str) -> Result<Vec<Invite>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, sender, invitee FROM invites WHERE sender = ?1 ORDER BY code",
        )?;
        let invites = stmt
            .query_map([sender], |row| {
                Ok(Invite {
                    code: row.get(0)?,
                    sender: row.get(1)?,
                    invitee: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(invites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.add_user("helpbot", None).unwrap();
        db.add_user("alice", Some("welcome")).unwrap();
        db.add_user("bob", None).unwrap();
        let id = db.add_conversation("abc123", &["helpbot", "alice"]).unwrap();
        db.add_edge("helpbot", "alice", id).unwrap();
        db.add_edge("alice", "helpbot", id).unwrap();
        db.add_invite("code1", "bob", Some("alice")).unwrap();
        db.add_invite("code2", "bob", None).unwrap();
        db
    }

    #[test]
    fn test_user_round_trip() {
        let db = seeded();
        db.set_online("bob", true).unwrap();

        let alice = db.fetch_user("alice").unwrap();
        assert_eq!(alice.stage.as_deref(), Some("welcome"));
        assert!(!alice.online);
        assert!(db.fetch_user("bob").unwrap().online);

        db.set_stage(alice.id, Some("roster_groups")).unwrap();
        assert_eq!(db.fetch_user("alice").unwrap().stage.as_deref(), Some("roster_groups"));

        assert!(matches!(db.fetch_user("nobody"), Err(StoreError::UserNotFound(_))));
    }

    #[test]
    fn test_user_lock_is_exclusive_until_dropped() {
        let db = seeded();
        let alice = db.lock_user("alice").unwrap();
        assert!(matches!(db.lock_user("alice"), Err(StoreError::Locked(_))));
        assert_eq!(db.held_locks(), 1);

        drop(alice);
        assert_eq!(db.held_locks(), 0);
        assert!(db.lock_user("alice").is_ok());
    }

    #[test]
    fn test_failed_lock_fetch_releases() {
        let db = seeded();
        assert!(matches!(db.lock_user("nobody"), Err(StoreError::UserNotFound(_))));
        assert!(matches!(
            db.lock_conversation_by_id(99),
            Err(StoreError::ConversationNotFound(_))
        ));
        assert_eq!(db.held_locks(), 0);
    }

    #[test]
    fn test_conversation_lookup() {
        let db = seeded();
        let convo = db.lock_conversation("abc123").unwrap();
        assert_eq!(convo.participants.len(), 2);
        assert!(convo.edge_users.contains("alice"));
        assert!(matches!(
            db.lock_conversation_by_id(convo.id),
            Err(StoreError::Locked(_))
        ));
        drop(convo);

        assert!(matches!(
            db.lock_conversation("missing"),
            Err(StoreError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_lock_by_address_resolves_current_address() {
        let db = seeded();
        let id = db.lock_conversation("abc123").unwrap().id;
        db.conn()
            .unwrap()
            .execute("UPDATE vinebots SET address = 'def456' WHERE id = ?1", [id])
            .unwrap();

        let convo = db.lock_conversation("def456").unwrap();
        assert_eq!(convo.id, id);
        assert_eq!(convo.address, "def456");
        assert!(matches!(
            db.lock_conversation("abc123"),
            Err(StoreError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_last_message_from_sender() {
        let db = seeded();
        let id = db.lock_conversation("abc123").unwrap().id;
        assert!(db.last_message_from(id, "helpbot").unwrap().is_none());

        db.record_message(id, "helpbot", "first").unwrap();
        db.record_message(id, "alice", "hi").unwrap();
        db.record_message(id, "helpbot", "second").unwrap();

        let last = db.last_message_from(id, "helpbot").unwrap().unwrap();
        assert_eq!(last.body, "second");
        let expected: BTreeSet<String> = ["alice", "helpbot"].iter().map(|s| s.to_string()).collect();
        assert_eq!(last.recipients, expected);
    }

    #[test]
    fn test_edges_and_invites() {
        let db = seeded();
        assert!(db.edge("helpbot", "alice").is_ok());
        assert!(matches!(
            db.edge("helpbot", "bob"),
            Err(StoreError::EdgeNotFound { .. })
        ));

        assert_eq!(db.invite_for("alice").unwrap().sender, "bob");
        assert!(db.invite_for("bob").is_err());

        let sent = db.invites_sent_by("bob").unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].is_used());
        assert!(!sent[1].is_used());
    }
}
