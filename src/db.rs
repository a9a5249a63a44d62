use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::protocol::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub code: String,
    pub admin_id: String,
    pub admin_name: String,

    // unique: code
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    NotOwner,
    Missing,
}

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS rooms (
        code TEXT PRIMARY KEY NOT NULL,
        admin_id TEXT NOT NULL,
        admin_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room TEXT NOT NULL,
        username TEXT NOT NULL,
        message TEXT NOT NULL,
        time TEXT NOT NULL,
        sent_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room, id)",
];

/// Durable rooms and messages. Every write that depends on a precondition is a
/// single conditional statement, so concurrent handlers cannot interleave
/// between the check and the write.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(url: &str) -> Result<Db, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;
        let db = Db { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// A private database that lives as long as this handle.
    pub async fn in_memory() -> Result<Db, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Db { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Inserts the room unless its code is taken. Returns whether it was inserted.
    pub async fn create_room(&self, room: &Room) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT INTO rooms (code,admin_id,admin_name) VALUES (?,?,?) ON CONFLICT(code) DO NOTHING")
            .bind(&room.code)
            .bind(&room.admin_id)
            .bind(&room.admin_name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_room(&self, code: &str) -> Result<Option<Room>, sqlx::Error> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT code,admin_id,admin_name FROM rooms WHERE code=?")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(code, admin_id, admin_name)| Room { code, admin_id, admin_name }))
    }

    /// Deletes the room and its messages, but only on behalf of its admin.
    pub async fn delete_room(&self, code: &str, admin_id: &str) -> Result<Deletion, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM rooms WHERE code=? AND admin_id=?")
            .bind(code)
            .bind(admin_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            let exists = sqlx::query("SELECT 1 FROM rooms WHERE code=?")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;
            return Ok(if exists { Deletion::NotOwner } else { Deletion::Missing });
        }

        sqlx::query("DELETE FROM messages WHERE room=?")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Deletion::Deleted)
    }

    /// Appends a message to an existing room. Returns false, writing nothing,
    /// when the room does not exist.
    pub async fn insert_message(&self, msg: &ChatMessage, sent_at: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO messages (room,username,message,time,sent_at)
             SELECT ?,?,?,?,? WHERE EXISTS (SELECT 1 FROM rooms WHERE code=?)",
        )
            .bind(&msg.room)
            .bind(&msg.username)
            .bind(&msg.message)
            .bind(&msg.time)
            .bind(sent_at)
            .bind(&msg.room)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Full history of a room, oldest first.
    pub async fn messages(&self, room: &str) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> =
            sqlx::query_as("SELECT room,username,message,time FROM messages WHERE room=? ORDER BY id")
                .bind(room)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(room, username, message, time)| ChatMessage { room, username, message, time })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(code: &str, admin: &str) -> Room {
        Room { code: code.to_owned(), admin_id: admin.to_owned(), admin_name: admin.to_owned() }
    }

    fn msg(room: &str, text: &str) -> ChatMessage {
        ChatMessage {
            room: room.to_owned(),
            username: "Alice".to_owned(),
            message: text.to_owned(),
            time: "1:00:00 PM".to_owned(),
        }
    }

    #[tokio::test]
    async fn second_create_with_same_code_is_refused() {
        let db = Db::in_memory().await.unwrap();

        assert!(db.create_room(&room("abc123", "alice")).await.unwrap());
        assert!(!db.create_room(&room("abc123", "bob")).await.unwrap());

        let stored = db.find_room("abc123").await.unwrap().unwrap();
        assert_eq!(stored.admin_id, "alice");
    }

    #[tokio::test]
    async fn history_comes_back_in_insertion_order() {
        let db = Db::in_memory().await.unwrap();
        db.create_room(&room("abc123", "alice")).await.unwrap();

        for text in ["one", "two", "three"] {
            assert!(db.insert_message(&msg("abc123", text), 0).await.unwrap());
        }

        let texts: Vec<String> = db.messages("abc123").await.unwrap().into_iter().map(|m| m.message).collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn message_for_missing_room_is_not_written() {
        let db = Db::in_memory().await.unwrap();

        assert!(!db.insert_message(&msg("nowhere", "hello?"), 0).await.unwrap());
        assert!(db.messages("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_admin_deletes_and_messages_go_with_the_room() {
        let db = Db::in_memory().await.unwrap();
        db.create_room(&room("abc123", "alice")).await.unwrap();
        db.insert_message(&msg("abc123", "hi"), 0).await.unwrap();

        assert_eq!(db.delete_room("abc123", "bob").await.unwrap(), Deletion::NotOwner);
        assert_eq!(db.messages("abc123").await.unwrap().len(), 1);

        assert_eq!(db.delete_room("abc123", "alice").await.unwrap(), Deletion::Deleted);
        assert!(db.find_room("abc123").await.unwrap().is_none());
        assert!(db.messages("abc123").await.unwrap().is_empty());

        assert_eq!(db.delete_room("abc123", "alice").await.unwrap(), Deletion::Missing);
    }

    #[tokio::test]
    async fn closed_store_reports_errors() {
        let db = Db::in_memory().await.unwrap();
        db.close().await;

        assert!(db.find_room("abc123").await.is_err());
    }
}
