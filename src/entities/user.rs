// Users - only the admin role unlocks anything today

use crate::db::StoreResult;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            role: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| ROLE_USER.to_string()),
        })
    }
}

/// Look a user up by name and stored password digest.
pub fn find_by_credentials(
    conn: &Connection,
    username: &str,
    password_hash: &str,
) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, role FROM users WHERE username = ?1 AND password_hash = ?2",
            params![username, password_hash],
            User::from_row,
        )
        .optional()?;

    Ok(user)
}

pub fn get_user(conn: &Connection, user_id: i64) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, role FROM users WHERE id = ?1",
            [user_id],
            User::from_row,
        )
        .optional()?;

    Ok(user)
}

/// Create a user with an already hashed password. Returns the new id.
pub fn create_user(conn: &Connection, username: &str, password_hash: &str, role: &str) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
        params![username, password_hash, role],
    )?;
    Ok(conn.last_insert_rowid())
}
