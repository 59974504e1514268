use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use stockroom_core::page::{Page, PageQuery};
use stockroom_core::user::{CreateUser, Role, UpdateUser, User, UserCredentials, UserStatus};

use super::super::{not_found, SqliteDatabase, SqliteResultExt};
use super::{apply_update, fetch_page, push_set, PageSql};
use crate::DbError;

const SELECT: &str = "SELECT u.*, r.name AS role_name, s.name AS status_name";
const FROM: &str = "FROM users u
     JOIN roles r ON r.id = u.role_id
     JOIN user_statuses s ON s.id = u.status_id";

const PAGE: PageSql<'static> = PageSql {
    select: SELECT,
    from: FROM,
    search: &["u.name", "u.lastname", "u.dni", "u.username"],
    order_by: "u.lastname, u.name, u.id",
};

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        lastname: row.get("lastname")?,
        dni: row.get("dni")?,
        username: row.get("username")?,
        role_id: row.get("role_id")?,
        role_name: row.get("role_name")?,
        status_id: row.get("status_id")?,
        status_name: row.get("status_name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn fetch(conn: &Connection, id: i64) -> Result<User, DbError> {
    conn.query_row(
        &format!("{SELECT} {FROM} WHERE u.id = ?1"),
        params![id],
        row_to_user,
    )
    .map_err(not_found(format!("user {id}")))
}

impl SqliteDatabase {
    pub fn create_user_sync(&self, input: &CreateUser, password_hash: &str) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users
                     (name, lastname, dni, username, password_hash, role_id, status_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    input.name.trim(),
                    input.lastname.trim(),
                    input.dni.trim(),
                    input.username,
                    password_hash,
                    input.role_id,
                    input.status_id,
                    now,
                    now
                ],
            )
            .to_db()?;
            fetch(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_user_sync(&self, id: i64) -> Result<User, DbError> {
        self.with_conn(|conn| fetch(conn, id))
    }

    pub fn find_user_credentials_sync(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT} {FROM} WHERE u.username = ?1"),
                params![username],
                |row| {
                    Ok(UserCredentials {
                        user: row_to_user(row)?,
                        password_hash: row.get("password_hash")?,
                    })
                },
            )
            .optional()
            .to_db()
        })
    }

    pub fn page_users_sync(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<User>, DbError> {
        self.with_conn(|conn| fetch_page(conn, &PAGE, page, pattern, row_to_user))
    }

    pub fn update_user_sync(
        &self,
        id: i64,
        update: &UpdateUser,
        password_hash: Option<&str>,
    ) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let trimmed = |v: &Option<String>| v.as_deref().map(|s| s.trim().to_string());
            push_set(&mut sets, &mut values, "name = ?", &trimmed(&update.name));
            push_set(&mut sets, &mut values, "lastname = ?", &trimmed(&update.lastname));
            push_set(&mut sets, &mut values, "dni = ?", &trimmed(&update.dni));
            push_set(&mut sets, &mut values, "username = ?", &update.username);
            push_set(&mut sets, &mut values, "role_id = ?", &update.role_id);
            push_set(&mut sets, &mut values, "status_id = ?", &update.status_id);
            let password_hash = password_hash.map(str::to_string);
            push_set(&mut sets, &mut values, "password_hash = ?", &password_hash);

            if !sets.is_empty() && apply_update(conn, "users", id, sets, values)? == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            fetch(conn, id)
        })
    }

    pub fn reset_password_sync(&self, dni: &str, password_hash: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE dni = ?3",
                    params![password_hash, Utc::now(), dni.trim()],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user with dni '{dni}'")));
            }
            Ok(())
        })
    }

    pub fn delete_user_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM users WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }

    pub fn list_roles_sync(&self) -> Result<Vec<Role>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM roles ORDER BY id").to_db()?;
            let roles = stmt
                .query_map([], |row| {
                    Ok(Role {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                })
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(roles)
        })
    }

    pub fn list_user_statuses_sync(&self) -> Result<Vec<UserStatus>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name FROM user_statuses ORDER BY id")
                .to_db()?;
            let statuses = stmt
                .query_map([], |row| {
                    Ok(UserStatus {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                })
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(statuses)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{DbError, SqliteDatabase};
    use stockroom_core::page::PageQuery;
    use stockroom_core::user::{CreateUser, UpdateUser};

    fn user(dni: &str, username: &str) -> CreateUser {
        CreateUser {
            name: "Ana".into(),
            lastname: "Quispe".into(),
            dni: dni.into(),
            username: username.into(),
            password: "not-stored-here".into(),
            role_id: 1,
            status_id: 1,
        }
    }

    #[test]
    fn test_user_crud_joins_role_and_status() {
        let db = SqliteDatabase::open_in_memory().unwrap();

        let ana = db.create_user_sync(&user("44556677", "ana"), "hash-1").unwrap();
        assert_eq!(ana.role_name, "admin");
        assert_eq!(ana.status_name, "active");

        let updated = db
            .update_user_sync(
                ana.id,
                &UpdateUser {
                    role_id: Some(2),
                    status_id: Some(2),
                    ..Default::default()
                },
                Some("hash-2"),
            )
            .unwrap();
        assert_eq!(updated.role_name, "operator");
        assert_eq!(updated.status_name, "inactive");

        let creds = db.find_user_credentials_sync("ana").unwrap().unwrap();
        assert_eq!(creds.password_hash, "hash-2");
        assert_eq!(creds.user.id, ana.id);

        db.delete_user_sync(ana.id).unwrap();
        assert!(db.find_user_credentials_sync("ana").unwrap().is_none());
    }

    #[test]
    fn dni_and_username_are_unique() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.create_user_sync(&user("1", "ana"), "h").unwrap();
        assert!(matches!(
            db.create_user_sync(&user("1", "other"), "h"),
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            db.create_user_sync(&user("2", "ana"), "h"),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn reset_password_by_dni() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.create_user_sync(&user("44556677", "ana"), "old").unwrap();

        db.reset_password_sync("44556677", "new").unwrap();
        let creds = db.find_user_credentials_sync("ana").unwrap().unwrap();
        assert_eq!(creds.password_hash, "new");

        assert!(matches!(
            db.reset_password_sync("00000000", "new"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn lookups_and_paging() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.create_user_sync(&user("1", "ana"), "h").unwrap();
        db.create_user_sync(&user("2", "bruno"), "h").unwrap();

        let page = db
            .page_users_sync(&PageQuery::default(), Some("%brun%"))
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.rows[0].username, "bruno");

        assert_eq!(db.list_roles_sync().unwrap().len(), 2);
        let statuses: Vec<_> = db
            .list_user_statuses_sync()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(statuses, ["active", "inactive"]);
    }
}
