//! Credential verification with uniform failure behavior.
//!
//! The store is consulted through a trait so the backing storage stays an
//! external concern. Verification hashes the presented password whether or
//! not the user exists (a fixed dummy entry stands in for missing users)
//! and compares digests in constant time, so unknown-user and
//! wrong-password failures are indistinguishable in both content and
//! timing.

use std::collections::HashMap;
use std::path::Path;
use std::{future::Future, pin::Pin};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error_handler::AppError;

/// Pluggable credential backend.
pub trait CredentialStore: Send + Sync {
    /// Returns the canonical user id on success, `None` on any failure.
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

#[derive(Clone, Debug, Deserialize)]
struct StoredUser {
    salt: String,
    /// Hex-encoded SHA-256 of `salt + password`.
    password_hash: String,
}

/// File-backed credential store (`users.json`).
pub struct FileCredentialStore {
    users: HashMap<String, StoredUser>,
    dummy: StoredUser,
}

impl FileCredentialStore {
    /// Loads users from a JSON file mapping username to
    /// `{salt, password_hash}`.
    ///
    /// # Errors
    /// Returns [`AppError::Credentials`] when the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Credentials(format!("reading {path:?}: {e}")))?;
        let users: HashMap<String, StoredUser> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Credentials(format!("parsing {path:?}: {e}")))?;

        info!(count = users.len(), "credential store loaded");
        Ok(Self {
            users,
            dummy: dummy_user(),
        })
    }

    #[cfg(test)]
    fn from_map(users: HashMap<String, StoredUser>) -> Self {
        Self {
            users,
            dummy: dummy_user(),
        }
    }

    fn verify(&self, username: &str, password: &str) -> Option<String> {
        // Missing users verify against the dummy entry so both paths do
        // the same amount of work.
        let stored = self.users.get(username).unwrap_or(&self.dummy);
        let presented = hash_password(&stored.salt, password);
        let matches = constant_time_eq(&presented, &stored.password_hash);

        if matches && self.users.contains_key(username) {
            Some(username.to_string())
        } else {
            None
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move { self.verify(username, password) })
    }
}

/// Hex SHA-256 of `salt + password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn dummy_user() -> StoredUser {
    StoredUser {
        salt: "d2f1a7c4".to_string(),
        // Digest of an unguessable throwaway value; never matches real input.
        password_hash: hash_password("d2f1a7c4", "!\u{0}dummy-credential\u{0}!"),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn store_with_user(name: &str, password: &str) -> FileCredentialStore {
        let salt = "0011aabb".to_string();
        let mut users = HashMap::new();
        users.insert(
            name.to_string(),
            StoredUser {
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        FileCredentialStore::from_map(users)
    }

    #[test]
    fn correct_password_authenticates() {
        let store = store_with_user("ada", "hunter2");
        assert_eq!(store.verify("ada", "hunter2"), Some("ada".to_string()));
    }

    #[test]
    fn wrong_password_and_unknown_user_both_fail() {
        let store = store_with_user("ada", "hunter2");
        assert_eq!(store.verify("ada", "wrong"), None);
        assert_eq!(store.verify("nobody", "hunter2"), None);
    }

    #[test]
    fn constant_time_compare() {
        assert!(constant_time_eq("abcdef", "abcdef"));
        assert!(!constant_time_eq("abcdef", "abcdeg"));
        assert!(!constant_time_eq("abc", "abcdef"));
    }

    #[test]
    fn failure_paths_take_comparable_time() {
        // Repeated-sample comparison, not a single measurement: both
        // failure paths hash and compare, so their medians should be the
        // same order of magnitude even on a noisy machine.
        let store = store_with_user("ada", "hunter2");
        const ROUNDS: usize = 200;

        let mut wrong_pw = Vec::with_capacity(ROUNDS);
        let mut no_user = Vec::with_capacity(ROUNDS);
        for _ in 0..ROUNDS {
            let t = Instant::now();
            let _ = store.verify("ada", "not-the-password");
            wrong_pw.push(t.elapsed().as_nanos());

            let t = Instant::now();
            let _ = store.verify("ghost", "not-the-password");
            no_user.push(t.elapsed().as_nanos());
        }
        wrong_pw.sort_unstable();
        no_user.sort_unstable();

        let m1 = wrong_pw[ROUNDS / 2] as f64;
        let m2 = no_user[ROUNDS / 2] as f64;
        let ratio = if m1 > m2 { m1 / m2 } else { m2 / m1 };
        assert!(ratio < 10.0, "timing ratio too large: {ratio}");
    }

    #[test]
    fn loads_users_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"{"ada": {"salt": "ff00", "password_hash": "00"}}"#,
        )
        .unwrap();
        let store = FileCredentialStore::load(&path).unwrap();
        assert!(store.users.contains_key("ada"));
    }
}
