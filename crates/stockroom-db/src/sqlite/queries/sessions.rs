use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use stockroom_core::user::Session;

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}

impl SqliteDatabase {
    /// Only the token's hash is stored; the raw token never touches disk.
    pub fn create_session_sync(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (user_id, token_hash, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, token_hash, Utc::now(), expires_at],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![conn.last_insert_rowid()],
                row_to_session,
            )
            .to_db()
        })
    }

    pub fn find_session_sync(&self, token_hash: &str) -> Result<Option<Session>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                row_to_session,
            )
            .optional()
            .to_db()
        })
    }

    pub fn delete_session_sync(&self, token_hash: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )
            .to_db()?;
            Ok(())
        })
    }

    pub fn purge_expired_sessions_sync(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let purged = conn
                .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
                .to_db()?;
            Ok(purged as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::SqliteDatabase;
    use stockroom_core::user::CreateUser;

    #[test]
    fn test_session_lifecycle() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let user = db
            .create_user_sync(
                &CreateUser {
                    name: "Ana".into(),
                    lastname: "Quispe".into(),
                    dni: "1".into(),
                    username: "ana".into(),
                    password: "unused-here".into(),
                    role_id: 1,
                    status_id: 1,
                },
                "h",
            )
            .unwrap();

        let now = Utc::now();
        db.create_session_sync(user.id, "live", now + Duration::hours(1))
            .unwrap();
        db.create_session_sync(user.id, "stale", now - Duration::hours(1))
            .unwrap();

        let live = db.find_session_sync("live").unwrap().unwrap();
        assert_eq!(live.user_id, user.id);
        assert!(!live.is_expired(now));

        assert_eq!(db.purge_expired_sessions_sync(now).unwrap(), 1);
        assert!(db.find_session_sync("stale").unwrap().is_none());

        db.delete_session_sync("live").unwrap();
        assert!(db.find_session_sync("live").unwrap().is_none());
    }
}
