// 🔐 Authentication - users, password hashes, sessions
//
// Passwords are stored as `pbkdf2_sha256$<iterations>$<salt>$<base64 digest>`.
// Sessions live in memory only; restarting the server logs everyone out.

use crate::error::{CertError, FieldError, Result};
use crate::routing::EntityKind;
use crate::store::Stores;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

const HASH_SCHEME: &str = "pbkdf2_sha256";
#[cfg(not(test))]
const HASH_ITERATIONS: u32 = 100_000;
#[cfg(test)]
const HASH_ITERATIONS: u32 = 1_000;
const DIGEST_LEN: usize = 32;

// ============================================================================
// PASSWORD HASHING
// ============================================================================

pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt, HASH_ITERATIONS);
    format!("{}${}${}${}", HASH_SCHEME, HASH_ITERATIONS, salt, digest)
}

pub fn verify_password(password: &str, encoded: &str) -> bool {
    let parts: Vec<&str> = encoded.split('$').collect();
    let [scheme, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };

    if *scheme != HASH_SCHEME {
        return false;
    }

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    let actual = derive(password, salt, iterations);
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

/// PBKDF2-HMAC-SHA256, base64 encoded
fn derive(password: &str, salt: &str, iterations: u32) -> String {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut digest);
    STANDARD.encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

pub fn create_user(stores: &Stores, username: &str, password: &str) -> Result<User> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(CertError::Validation(vec![FieldError::new(
            "username",
            "Username and password are required.",
        )]));
    }

    let created_at = Utc::now();
    let password_hash = hash_password(password);

    let id = stores.for_entity(EntityKind::User).with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    })?;

    info!(username, id, "user created");
    Ok(User {
        id,
        username: username.to_string(),
        created_at,
    })
}

/// Check credentials. Unknown user and wrong password both fail with
/// `AuthFailure` after the same amount of hashing work.
pub fn authenticate(stores: &Stores, username: &str, password: &str) -> Result<User> {
    let row = stores.for_entity(EntityKind::User).with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                [username.trim()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?)
    })?;

    let Some((id, username, password_hash, created_at)) = row else {
        // Burn the same derivation a real check would
        let decoy = format!("{}${}$unknown-user$", HASH_SCHEME, HASH_ITERATIONS);
        verify_password(password, &decoy);
        warn!(username = username.trim(), "login attempt for unknown user");
        return Err(CertError::AuthFailure);
    };

    if !verify_password(password, &password_hash) {
        warn!(username = %username, "login attempt with wrong password");
        return Err(CertError::AuthFailure);
    }

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(User {
        id,
        username,
        created_at,
    })
}

// ============================================================================
// SESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a session for `user`, returning its id
    pub fn login(&self, user: &User) -> Result<String> {
        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id,
            username: user.username.clone(),
            created_at: Utc::now(),
        };
        let session_id = session.session_id.clone();

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| CertError::SessionUnavailable)?;
        sessions.retain(|_, s| !is_expired(s, self.ttl));
        sessions.insert(session_id.clone(), session);

        info!(username = %user.username, "session started");
        Ok(session_id)
    }

    /// Live session for `session_id`, if any
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().ok()?;
        sessions
            .get(session_id)
            .filter(|s| !is_expired(s, self.ttl))
            .cloned()
    }

    /// End a session; returns whether one existed
    pub fn logout(&self, session_id: &str) -> bool {
        match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(session_id).is_some(),
            Err(_) => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .map(|sessions| sessions.values().filter(|s| !is_expired(s, self.ttl)).count())
            .unwrap_or(0)
    }
}

fn is_expired(session: &Session, ttl: Duration) -> bool {
    Utc::now() - session.created_at > ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let encoded = hash_password("s3cret");

        assert!(encoded.starts_with(&format!("pbkdf2_sha256${}$", HASH_ITERATIONS)));
        assert!(verify_password("s3cret", &encoded));
        assert!(!verify_password("wrong", &encoded));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_verify_rejects_malformed_hashes() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$salt$abc"));
        assert!(!verify_password("x", "pbkdf2_sha256$many$salt$abc"));
        assert!(!verify_password("x", "pbkdf2_sha256$0$salt$abc"));
    }

    #[test]
    fn test_authenticate() {
        let stores = Stores::in_memory().unwrap();
        create_user(&stores, "clerk", "pa55word").unwrap();

        let user = authenticate(&stores, "clerk", "pa55word").unwrap();
        assert_eq!(user.username, "clerk");

        assert!(matches!(
            authenticate(&stores, "clerk", "nope"),
            Err(CertError::AuthFailure)
        ));
        assert!(matches!(
            authenticate(&stores, "ghost", "pa55word"),
            Err(CertError::AuthFailure)
        ));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let stores = Stores::in_memory().unwrap();
        create_user(&stores, "clerk", "a").unwrap();

        let err = create_user(&stores, "clerk", "b").unwrap_err();
        assert!(matches!(err, CertError::Store(_)));
    }

    #[test]
    fn test_session_lifecycle() {
        let sessions = SessionStore::new(Duration::minutes(10));
        let user = User {
            id: 1,
            username: "clerk".to_string(),
            created_at: Utc::now(),
        };

        let id = sessions.login(&user).unwrap();
        assert_eq!(sessions.get(&id).unwrap().username, "clerk");
        assert_eq!(sessions.active_count(), 1);

        assert!(sessions.logout(&id));
        assert!(sessions.get(&id).is_none());
        assert!(!sessions.logout(&id));
    }

    #[test]
    fn test_expired_session_is_ignored() {
        let sessions = SessionStore::new(Duration::zero() - Duration::seconds(1));
        let user = User {
            id: 1,
            username: "clerk".to_string(),
            created_at: Utc::now(),
        };

        let id = sessions.login(&user).unwrap();
        assert!(sessions.get(&id).is_none());
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn test_known_pbkdf2_vector() {
        // RFC 7914 section 11 PBKDF2-HMAC-SHA256 vector, first 32 bytes
        let mut digest = [0u8; DIGEST_LEN];
        pbkdf2_hmac::<Sha256>(b"passwd", b"salt", 1, &mut digest);
        assert_eq!(
            digest[..8],
            [0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]
        );
    }

    #[test]
    fn test_login_fails_on_poisoned_session_lock() {
        let sessions = SessionStore::new(Duration::minutes(10));
        let user = User {
            id: 1,
            username: "clerk".to_string(),
            created_at: Utc::now(),
        };

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = sessions.sessions.write().unwrap();
            panic!("poison the lock");
        }));

        assert!(matches!(sessions.login(&user), Err(CertError::SessionUnavailable)));
        assert_eq!(sessions.active_count(), 0);
    }
}
