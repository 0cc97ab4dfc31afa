#![cfg(feature = "web")]
use crate::config::AuthConfig;
use crate::error::{DashboardError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// Credential data for login
///
/// Used to receive login form data from the client.
#[derive(Debug, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// Fixed single-user credential check.
///
/// The configured password is hashed once at startup; only the hash is
/// kept.
pub struct AccessGate {
    username: String,
    password_hash: String,
}

impl AccessGate {
    /// Create a gate for one username/password pair.
    ///
    /// # Arguments
    /// * `username` - The only accepted username
    /// * `password` - Plain password, hashed with Argon2 here
    ///
    /// # Returns
    /// * `Result<AccessGate>` - The gate, or a config error when either
    ///   value is empty or hashing fails
    pub fn new(username: &str, password: &str) -> Result<Self> {
        if username.is_empty() || password.is_empty() {
            return Err(DashboardError::Config(
                "Username and password cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            password_hash: hash_password(password)?,
        })
    }

    pub fn from_config(auth: &AuthConfig) -> Result<Self> {
        if auth.uses_default_credentials() {
            log::warn!("Dashboard login uses the default credentials; set [auth] in the config");
        }
        Self::new(&auth.username, &auth.password)
    }

    /// Check a username/password pair.
    pub fn verify(&self, credentials: &UserCredentials) -> bool {
        // Always run the hash check so a wrong username costs the same time
        let password_ok = verify_password(&credentials.password, &self.password_hash);
        password_ok && credentials.username == self.username
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DashboardError::Config(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// An authenticated login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub expires_at: SystemTime,
}

/// Active sessions, owned by the application state.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(Duration::from_secs(auth.session_hours * 60 * 60))
    }

    /// Create a new session and return its id.
    ///
    /// # Arguments
    /// * `username` - The authenticated user
    ///
    /// # Returns
    /// * `String` - A fresh UUID v4 to store in the session cookie
    pub fn create(&self, username: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            user_id: username.to_string(),
            expires_at: SystemTime::now() + self.lifetime,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        // Drop expired entries while we hold the lock
        let now = SystemTime::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// The username for a live session, `None` when unknown or expired.
    pub fn validate(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.user_id.clone())
    }

    /// End a session. Unknown ids are ignored.
    ///
    /// # Arguments
    /// * `session_id` - Id from the session cookie
    pub fn revoke(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }

    /// Number of stored sessions, expired ones included until the next
    /// [`SessionStore::create`] prunes them.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
