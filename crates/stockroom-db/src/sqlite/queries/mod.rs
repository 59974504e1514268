pub mod categories;
pub mod images;
pub mod invoices;
pub mod inventory;
pub mod providers;
pub mod sessions;
pub mod users;

use rusqlite::{Connection, Row, ToSql};

use stockroom_core::page::{Page, PageQuery};

use super::{map_sqlite_err, SqliteResultExt};
use crate::DbError;

/// The pieces of a paginated listing. `select` and `from` are spliced in
/// verbatim; `search` names the columns an optional filter is matched against.
pub(crate) struct PageSql<'a> {
    pub select: &'a str,
    pub from: &'a str,
    pub search: &'a [&'a str],
    pub order_by: &'a str,
}

/// Count and fetch one page. `pattern` is a ready-made `LIKE` pattern whose
/// wildcards are escaped with `\`.
pub(crate) fn fetch_page<T, F>(
    conn: &Connection,
    sql: &PageSql<'_>,
    page: &PageQuery,
    pattern: Option<&str>,
    map: F,
) -> Result<Page<T>, DbError>
where
    F: FnMut(&Row) -> rusqlite::Result<T>,
{
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    let filter = match pattern {
        Some(pattern) if !sql.search.is_empty() => {
            values.push(Box::new(pattern.to_string()));
            let clauses: Vec<String> = sql
                .search
                .iter()
                .map(|column| format!("{column} LIKE ?1 ESCAPE '\\'"))
                .collect();
            format!("WHERE ({})", clauses.join(" OR "))
        }
        _ => String::new(),
    };

    let count_sql = format!("SELECT count(*) {} {filter}", sql.from);
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count: i64 = conn
        .query_row(&count_sql, params.as_slice(), |row| row.get(0))
        .to_db()?;
    if count == 0 {
        return Ok(Page::empty());
    }

    let next = values.len() + 1;
    let rows_sql = format!(
        "{} {} {filter} ORDER BY {} LIMIT ?{} OFFSET ?{}",
        sql.select,
        sql.from,
        sql.order_by,
        next,
        next + 1
    );
    values.push(Box::new(page.limit()));
    values.push(Box::new(page.offset()));
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

    let mut stmt = conn.prepare(&rows_sql).to_db()?;
    let rows = stmt
        .query_map(params.as_slice(), map)
        .to_db()?
        .collect::<Result<Vec<_>, _>>()
        .to_db()?;
    Ok(Page { count, rows })
}

/// Queue `set` (a `column = ?` fragment) when the partial update supplies a value.
pub(crate) fn push_set<T: ToSql + Clone + 'static>(
    sets: &mut Vec<&'static str>,
    values: &mut Vec<Box<dyn ToSql>>,
    set: &'static str,
    value: &Option<T>,
) {
    if let Some(value) = value {
        sets.push(set);
        values.push(Box::new(value.clone()));
    }
}

/// Run `UPDATE <table> SET ... WHERE id = ?`, stamping `updated_at`.
/// Returns the number of rows changed; zero means the id does not exist.
pub(crate) fn apply_update(
    conn: &Connection,
    table: &str,
    id: i64,
    mut sets: Vec<&'static str>,
    mut values: Vec<Box<dyn ToSql>>,
) -> Result<usize, DbError> {
    sets.push("updated_at = ?");
    values.push(Box::new(chrono::Utc::now()));
    values.push(Box::new(id));

    let sql = format!("UPDATE {table} SET {} WHERE id = ?", sets.join(", "));
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, params.as_slice()).to_db()
}

/// Map a foreign-key refusal on delete to a `Conflict` carrying `message`.
pub(crate) fn still_referenced(
    message: impl Into<String>,
) -> impl FnOnce(rusqlite::Error) -> DbError {
    let message = message.into();
    move |e| match map_sqlite_err(e) {
        DbError::Conflict(_) => DbError::Conflict(message),
        other => other,
    }
}
