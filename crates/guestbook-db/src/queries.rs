use crate::Database;
use crate::models::{MessageRow, ReplyRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};

const USER_COLUMNS: &str = "id, name, email, password, is_admin, created_at";
const MESSAGE_COLUMNS: &str = "id, user_id, message, created_at, updated_at";
const REPLY_COLUMNS: &str = "id, message_id, user_id, reply, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, name: &str, email: &str, password_hash: &str, is_admin: bool) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, password, is_admin) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, email, password_hash, is_admin],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Like [`Database::create_user`], but `Ok(None)` when the email is
    /// already registered.
    pub fn try_create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<Option<i64>> {
        match self.create_user(name, email, password_hash, is_admin) {
            Ok(id) => Ok(Some(id)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Grants or revokes admin. Returns false when the user does not exist.
    pub fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_admin = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![is_admin, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, user_id: i64, message: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (user_id, message) VALUES (?1, ?2)",
                rusqlite::params![user_id, message],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_messages_by_user(&self, user_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE user_id = ?1 AND deleted_at IS NULL
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_all_messages(&self) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE deleted_at IS NULL ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Fetches a live message only if `user_id` owns it.
    pub fn get_owned_message(&self, id: i64, user_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL"
            );
            conn.query_row(&sql, [id, user_id], message_from_row).optional()
        })
    }

    /// Returns the number of rows changed; zero when the message is missing,
    /// archived or owned by someone else.
    pub fn update_owned_message(&self, id: i64, user_id: i64, message: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET message = ?1, updated_at = datetime('now')
                 WHERE id = ?2 AND user_id = ?3 AND deleted_at IS NULL",
                rusqlite::params![message, id, user_id],
            )?;
            Ok(changed)
        })
    }

    pub fn archive_owned_message(&self, id: i64, user_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET deleted_at = datetime('now')
                 WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
                [id, user_id],
            )?;
            Ok(changed)
        })
    }

    pub fn message_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1 AND deleted_at IS NULL)",
                [id],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    pub fn message_owned_by(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM messages WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL
                 )",
                [id, user_id],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    // -- Replies --

    pub fn insert_reply(&self, message_id: i64, user_id: i64, reply: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO replies (message_id, user_id, reply) VALUES (?1, ?2, ?3)",
                rusqlite::params![message_id, user_id, reply],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_replies(&self, message_id: i64) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REPLY_COLUMNS} FROM replies
                 WHERE message_id = ?1 AND deleted_at IS NULL
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([message_id], reply_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Scoped by `message_id` only; the reply's author is not consulted.
    pub fn update_reply(&self, message_id: i64, reply_id: i64, reply: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE replies SET reply = ?1, updated_at = datetime('now')
                 WHERE id = ?2 AND message_id = ?3 AND deleted_at IS NULL",
                rusqlite::params![reply, reply_id, message_id],
            )?;
            Ok(changed)
        })
    }

    pub fn archive_reply(&self, message_id: i64, reply_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE replies SET deleted_at = datetime('now')
                 WHERE id = ?1 AND message_id = ?2 AND deleted_at IS NULL",
                [reply_id, message_id],
            )?;
            Ok(changed)
        })
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, predicate: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    conn.query_row(&sql, [value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            is_admin: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        reply: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("Alice", "alice@example.com", "hash", false).unwrap();
        let bob = db.create_user("Bob", "bob@example.com", "hash", false).unwrap();
        (db, alice, bob)
    }

    #[test]
    fn duplicate_email_is_reported_not_raised() {
        let (db, alice, _) = db_with_users();
        assert_eq!(
            db.try_create_user("Alice two", "alice@example.com", "hash", false).unwrap(),
            None
        );
        assert!(db.create_user("Alice two", "alice@example.com", "hash", false).is_err());

        let carol = db.try_create_user("Carol", "carol@example.com", "hash", false).unwrap();
        assert!(carol.is_some_and(|id| id != alice));
    }

    #[test]
    fn messages_are_scoped_to_owner() {
        let (db, alice, bob) = db_with_users();
        let m1 = db.insert_message(alice, "Hello world").unwrap();
        db.insert_message(bob, "Hi from Bob").unwrap();

        let own = db.list_messages_by_user(alice).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, m1);
        assert_eq!(own[0].message, "Hello world");

        assert_eq!(db.list_all_messages().unwrap().len(), 2);
        assert!(db.get_owned_message(m1, alice).unwrap().is_some());
        assert!(db.get_owned_message(m1, bob).unwrap().is_none());
    }

    #[test]
    fn update_and_archive_require_ownership() {
        let (db, alice, bob) = db_with_users();
        let m1 = db.insert_message(alice, "Hello").unwrap();

        assert_eq!(db.update_owned_message(m1, bob, "hijacked").unwrap(), 0);
        assert_eq!(db.archive_owned_message(m1, bob).unwrap(), 0);

        assert_eq!(db.update_owned_message(m1, alice, "Hello again").unwrap(), 1);
        let row = db.get_owned_message(m1, alice).unwrap().unwrap();
        assert_eq!(row.message, "Hello again");
    }

    #[test]
    fn archive_is_not_repeatable() {
        let (db, alice, _) = db_with_users();
        let m1 = db.insert_message(alice, "Hello").unwrap();

        assert_eq!(db.archive_owned_message(m1, alice).unwrap(), 1);
        assert_eq!(db.archive_owned_message(m1, alice).unwrap(), 0);
        assert!(!db.message_exists(m1).unwrap());
        assert!(db.list_messages_by_user(alice).unwrap().is_empty());
        assert!(db.list_all_messages().unwrap().is_empty());
    }

    #[test]
    fn message_existence_and_ownership_checks() {
        let (db, alice, bob) = db_with_users();
        let m1 = db.insert_message(alice, "Hello").unwrap();

        assert!(db.message_exists(m1).unwrap());
        assert!(!db.message_exists(m1 + 100).unwrap());
        assert!(db.message_owned_by(m1, alice).unwrap());
        assert!(!db.message_owned_by(m1, bob).unwrap());
    }

    #[test]
    fn replies_are_scoped_by_message_not_author() {
        let (db, alice, bob) = db_with_users();
        let m1 = db.insert_message(alice, "Hello").unwrap();
        let m2 = db.insert_message(alice, "Other").unwrap();

        let r1 = db.insert_reply(m1, bob, "from bob").unwrap();
        db.insert_reply(m2, bob, "elsewhere").unwrap();

        let replies = db.list_replies(m1).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].user_id, bob);

        // Wrong parent message matches nothing.
        assert_eq!(db.update_reply(m2, r1, "moved?").unwrap(), 0);
        assert_eq!(db.archive_reply(m2, r1).unwrap(), 0);

        assert_eq!(db.update_reply(m1, r1, "edited").unwrap(), 1);
        assert_eq!(db.list_replies(m1).unwrap()[0].reply, "edited");

        assert_eq!(db.archive_reply(m1, r1).unwrap(), 1);
        assert_eq!(db.archive_reply(m1, r1).unwrap(), 0);
        assert!(db.list_replies(m1).unwrap().is_empty());
    }

    #[test]
    fn users_lookup_and_admin_flag() {
        let (db, alice, _) = db_with_users();

        let row = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(row.id, alice);
        assert!(!row.is_admin);

        assert!(db.set_admin(alice, true).unwrap());
        assert!(db.get_user_by_id(alice).unwrap().unwrap().is_admin);
        assert!(!db.set_admin(9999, true).unwrap());
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (db, _, _) = db_with_users();
        assert!(db.create_user("Again", "alice@example.com", "hash", false).is_err());
    }
}
