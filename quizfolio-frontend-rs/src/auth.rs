//! Local accounts for a single browser. There is no server to talk to:
//! registration and login exist so multiple people can share a machine
//! without sharing their study history.
//!
//! Passwords are never stored. Each record keeps a random salt and an xxh3
//! digest of salt+password — not a hardened KDF, but this is device-local
//! data guarding study stats, not a remote credential.

use chrono::{DateTime, Utc};
use rand::Rng;
use xxhash_rust::xxh3::xxh3_64;

use exam_utils::account::{CurrentUser, UserRecord};
use satchel::{StorageBackend, StorageError, Table};

pub const USERS_KEY: &str = "quizfolio.users";
pub const CURRENT_USER_KEY: &str = "quizfolio.current_user";

pub type UserList = im::Vector<UserRecord>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("username `{0}` is already registered")]
    UsernameTaken(String),
    #[error("unknown user `{0}`")]
    UnknownUser(String),
    #[error("wrong password")]
    WrongPassword,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct Accounts {
    users_table: Table<UserList>,
    current_table: Table<Option<CurrentUser>>,
    users: UserList,
    current: Option<CurrentUser>,
}

fn credential_digest(salt: u64, password: &str) -> u64 {
    let mut bytes = salt.to_le_bytes().to_vec();
    bytes.extend_from_slice(password.as_bytes());
    xxh3_64(&bytes)
}

impl Accounts {
    pub fn load(backend: &dyn StorageBackend) -> Self {
        let users_table = Table::new(USERS_KEY);
        let current_table = Table::new(CURRENT_USER_KEY);
        let users = users_table.load(backend);
        let current = current_table.load(backend);
        Self {
            users_table,
            current_table,
            users,
            current,
        }
    }

    pub fn register(
        &mut self,
        backend: &dyn StorageBackend,
        username: &str,
        password: &str,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }
        if self.users.iter().any(|u| u.username == username) {
            return Err(AuthError::UsernameTaken(username.to_string()));
        }

        let salt: u64 = rng.r#gen();
        self.users.push_back(UserRecord {
            username: username.to_string(),
            salt,
            digest: credential_digest(salt, password),
            created_at: now,
        });
        self.users_table
            .save(backend, &self.users)
            .inspect_err(|e| log::error!("Error writing the user list: {e:?}"))?;
        log::info!("Registered user `{username}`");
        Ok(())
    }

    pub fn login(
        &mut self,
        backend: &dyn StorageBackend,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<CurrentUser, AuthError> {
        let user = self
            .users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()))?;

        if credential_digest(user.salt, password) != user.digest {
            return Err(AuthError::WrongPassword);
        }

        let current = CurrentUser {
            username: user.username.clone(),
            logged_in_at: now,
        };
        self.current = Some(current.clone());
        self.current_table
            .save(backend, &self.current)
            .inspect_err(|e| log::error!("Error writing the current user: {e:?}"))?;
        Ok(current)
    }

    pub fn logout(&mut self, backend: &dyn StorageBackend) {
        self.current = None;
        self.current_table.clear(backend);
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.current.as_ref()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.users.iter().map(|u| u.username.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use satchel::MemoryBackend;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    #[test]
    fn register_login_logout_round_trip() {
        let backend = MemoryBackend::new();
        let mut accounts = Accounts::load(&backend);

        accounts
            .register(&backend, "sam", "hunter2", &mut rng(), Utc::now())
            .unwrap();
        let current = accounts
            .login(&backend, "sam", "hunter2", Utc::now())
            .unwrap();
        assert_eq!(current.username, "sam");

        // Login survives a reload, logout clears it
        let reloaded = Accounts::load(&backend);
        assert_eq!(reloaded.current_user().unwrap().username, "sam");

        accounts.logout(&backend);
        assert!(accounts.current_user().is_none());
        assert!(Accounts::load(&backend).current_user().is_none());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let backend = MemoryBackend::new();
        let mut accounts = Accounts::load(&backend);
        accounts
            .register(&backend, "sam", "hunter2", &mut rng(), Utc::now())
            .unwrap();

        assert!(matches!(
            accounts.login(&backend, "sam", "hunter3", Utc::now()),
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            accounts.login(&backend, "pat", "hunter2", Utc::now()),
            Err(AuthError::UnknownUser(_))
        ));
    }

    #[test]
    fn usernames_are_unique() {
        let backend = MemoryBackend::new();
        let mut accounts = Accounts::load(&backend);
        let mut rng = rng();
        accounts
            .register(&backend, "sam", "a", &mut rng, Utc::now())
            .unwrap();

        assert!(matches!(
            accounts.register(&backend, "sam", "b", &mut rng, Utc::now()),
            Err(AuthError::UsernameTaken(_))
        ));
    }

    #[test]
    fn passwords_are_not_stored_verbatim() {
        let backend = MemoryBackend::new();
        let mut accounts = Accounts::load(&backend);
        accounts
            .register(&backend, "sam", "hunter2", &mut rng(), Utc::now())
            .unwrap();

        let raw = backend.get(USERS_KEY).unwrap();
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn same_password_different_salt_different_digest() {
        let mut rng = rng();
        let a: u64 = rng.r#gen();
        let b: u64 = rng.r#gen();
        assert_ne!(
            credential_digest(a, "hunter2"),
            credential_digest(b, "hunter2")
        );
    }
}
