// Authentication - password digests, session tokens, per-request auth context
//
// A session is a random bearer token handed to the client in a cookie. The
// database only ever sees sha256(secret ":" token), so a copied database
// cannot be replayed and rotating the secret ends every session.

use crate::db::StoreResult;
use crate::entities::user::{self, User};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE: &str = "snowflake_session";

/// Lowercase hex SHA-256 of the password, the format stored in `users`.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 244 random bits from two v4 UUIDs, as 64 hex characters.
pub fn generate_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub fn token_digest(secret: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// SESSIONS
// ============================================================================

/// A freshly opened session.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub user: User,
    /// Bearer token for the cookie; not stored anywhere server-side
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Check credentials and open a session. `Ok(None)` means the username or
/// password did not match.
pub fn login(
    conn: &Connection,
    secret: &str,
    username: &str,
    password: &str,
    ttl: Duration,
) -> StoreResult<Option<LoginSession>> {
    let Some(user) = user::find_by_credentials(conn, username, &hash_password(password))? else {
        tracing::info!(username, "Rejected login");
        return Ok(None);
    };

    let token = generate_token();
    let now = Utc::now();
    let expires_at = now + ttl;

    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            token_digest(secret, &token),
            user.id,
            timestamp(now),
            timestamp(expires_at)
        ],
    )?;

    tracing::info!(user_id = user.id, role = %user.role, "Opened session");
    Ok(Some(LoginSession {
        user,
        token,
        expires_at,
    }))
}

/// The user behind a live session token, if any. Expired sessions are
/// removed on sight.
pub fn resolve_session(conn: &Connection, secret: &str, token: &str) -> StoreResult<Option<User>> {
    let digest = token_digest(secret, token);

    let session: Option<(i64, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
            [&digest],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((user_id, expires_at)) = session else {
        return Ok(None);
    };

    let expired = DateTime::parse_from_rfc3339(&expires_at)
        .map(|at| at.with_timezone(&Utc) <= Utc::now())
        .unwrap_or(true);
    if expired {
        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [&digest])?;
        return Ok(None);
    }

    user::get_user(conn, user_id)
}

/// End a session. Unknown tokens are ignored.
pub fn logout(conn: &Connection, secret: &str, token: &str) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        [token_digest(secret, token)],
    )?;
    Ok(())
}

/// Drop every expired session; returns how many were removed.
pub fn purge_expired_sessions(conn: &Connection) -> StoreResult<usize> {
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        [timestamp(Utc::now())],
    )?;
    Ok(removed)
}

// ============================================================================
// AUTH CONTEXT
// ============================================================================

/// Who is making the current request. Built once per request from the
/// session cookie and handed to handlers explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    user: Option<User>,
    token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        AuthContext::default()
    }

    pub fn authenticated(user: User, token: String) -> Self {
        AuthContext {
            user: Some(user),
            token: Some(token),
        }
    }

    /// Resolve a (possibly absent) session token against the store.
    pub fn from_token(conn: &Connection, secret: &str, token: Option<&str>) -> StoreResult<Self> {
        let Some(token) = token else {
            return Ok(Self::anonymous());
        };
        Ok(match resolve_session(conn, secret, token)? {
            Some(user) => Self::authenticated(user, token.to_string()),
            None => Self::anonymous(),
        })
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

// ============================================================================
// COOKIES
// ============================================================================

/// Pull the session token out of a `Cookie` request header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; {}",
        SESSION_COOKIE,
        token,
        max_age.num_seconds().max(0),
        same_site(secure)
    )
}

/// `Set-Cookie` value that makes the browser forget the session.
pub fn expired_session_cookie(secure: bool) -> String {
    format!(
        "{}=; HttpOnly; Path=/; Max-Age=0; {}",
        SESSION_COOKIE,
        same_site(secure)
    )
}

fn same_site(secure: bool) -> &'static str {
    if secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    }
}
