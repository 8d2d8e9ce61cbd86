//! File-backed identity provider.
//!
//! Accounts and the current session live in one JSON file. Passwords are stored as
//! Argon2id PHC strings. Anonymous sessions get a fresh `anon-` uid each time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use super::password::{hash_password, validate_email, validate_password, verify_password};
use super::{AuthBackend, AuthError, Credential, Identity};
use crate::atomic::write_json_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    uid: String,
    email: String,
    display_name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl AccountRecord {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            is_anonymous: false,
            display_name: Some(self.display_name.clone()),
            email: Some(self.email.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<AccountRecord>,
    #[serde(default)]
    session: Option<Identity>,
}

impl AccountsFile {
    fn find_by_email(&self, email: &str) -> Option<&AccountRecord> {
        self.accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
    }
}

/// Identity provider persisted to a local JSON file.
#[derive(Debug)]
pub struct LocalAuthBackend {
    path: PathBuf,
    state: Mutex<AccountsFile>,
}

impl LocalAuthBackend {
    /// Open the account file, creating an empty state when it does not exist.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let state = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                AuthError::Storage(format!("{} is not a valid account file: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AccountsFile::default(),
            Err(e) => {
                return Err(AuthError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, AccountsFile>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::Storage("account state lock poisoned".to_string()))
    }

    /// Apply `f` to a copy of the state, persist it, then publish it.
    fn commit<T>(
        &self,
        f: impl FnOnce(&mut AccountsFile) -> Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let out = f(&mut next)?;
        write_json_atomic(&self.path, &next).map_err(|e| AuthError::Storage(e.to_string()))?;
        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl AuthBackend for LocalAuthBackend {
    fn current_identity(&self) -> Option<Identity> {
        match self.lock() {
            Ok(state) => state.session.clone(),
            Err(e) => {
                warn!(error = %e, "Could not read auth session");
                None
            }
        }
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let identity = Identity::anonymous(format!("anon-{}", Uuid::new_v4().simple()));
        self.commit(|state| {
            state.session = Some(identity.clone());
            Ok(())
        })?;
        info!(uid = %identity.uid, "Signed in anonymously");
        Ok(identity)
    }

    async fn sign_in_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<Identity, AuthError> {
        let Credential::EmailPassword { email, password } = credential;
        let email = email.trim();
        let identity = self.commit(|state| {
            let account = state
                .find_by_email(email)
                .filter(|a| verify_password(password.trim(), &a.password_hash))
                .ok_or(AuthError::InvalidCredential)?;
            let identity = account.identity();
            state.session = Some(identity.clone());
            Ok(identity)
        })?;
        info!(uid = %identity.uid, "Signed in with email");
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let email = email.trim();
        let password = password.trim();
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::MissingName);
        }
        validate_email(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        let identity = self.commit(|state| {
            if state.find_by_email(email).is_some() {
                return Err(AuthError::AccountExists(email.to_string()));
            }
            let record = AccountRecord {
                uid: Uuid::new_v4().simple().to_string(),
                email: email.to_string(),
                display_name: display_name.to_string(),
                password_hash,
                created_at: Utc::now(),
            };
            let identity = record.identity();
            state.accounts.push(record);
            state.session = Some(identity.clone());
            Ok(identity)
        })?;
        info!(uid = %identity.uid, "Created account");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.commit(|state| {
            state.session = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(tmp: &TempDir) -> LocalAuthBackend {
        LocalAuthBackend::open(&tmp.path().join("accounts.json")).unwrap()
    }

    #[tokio::test]
    async fn anonymous_sessions_get_fresh_uids() {
        let tmp = TempDir::new().unwrap();
        let auth = backend(&tmp);
        assert!(auth.current_identity().is_none());

        let first = auth.sign_in_anonymously().await.unwrap();
        let second = auth.sign_in_anonymously().await.unwrap();
        assert!(first.is_anonymous);
        assert!(first.uid.starts_with("anon-"));
        assert_ne!(first.uid, second.uid);
        assert_eq!(auth.current_identity(), Some(second));
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_from_new_process() {
        let tmp = TempDir::new().unwrap();
        {
            let auth = backend(&tmp);
            let created = auth
                .sign_up("Ada@Example.com", "secret1", "Ada")
                .await
                .unwrap();
            assert!(!created.is_anonymous);
            auth.sign_out().await.unwrap();
        }

        let auth = backend(&tmp);
        assert!(auth.current_identity().is_none());
        let identity = auth
            .sign_in_with_credential(&Credential::email_password("ada@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
        assert_eq!(auth.current_identity(), Some(identity));
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_current_session() {
        let tmp = TempDir::new().unwrap();
        let auth = backend(&tmp);
        auth.sign_up("ada@example.com", "secret1", "Ada")
            .await
            .unwrap();
        let anon = auth.sign_in_anonymously().await.unwrap();

        let err = auth
            .sign_in_with_credential(&Credential::email_password("ada@example.com", "wrong!!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
        assert_eq!(auth.current_identity(), Some(anon));
    }

    #[tokio::test]
    async fn duplicate_and_invalid_sign_ups_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let auth = backend(&tmp);
        auth.sign_up("ada@example.com", "secret1", "Ada")
            .await
            .unwrap();

        assert!(matches!(
            auth.sign_up("ADA@example.com", "secret2", "Other").await,
            Err(AuthError::AccountExists(_))
        ));
        assert!(matches!(
            auth.sign_up("bob@example.com", "123", "Bob").await,
            Err(AuthError::WeakPassword { .. })
        ));
        assert!(matches!(
            auth.sign_up("bob", "secret1", "Bob").await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            auth.sign_up("bob@example.com", "secret1", "  ").await,
            Err(AuthError::MissingName)
        ));
    }

    #[tokio::test]
    async fn password_is_not_stored_in_clear() {
        let tmp = TempDir::new().unwrap();
        let auth = backend(&tmp);
        auth.sign_up("ada@example.com", "plaintext-pw", "Ada")
            .await
            .unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("accounts.json")).unwrap();
        assert!(!raw.contains("plaintext-pw"));
        assert!(raw.contains("$argon2id$"));
        assert!(!raw.contains("password_salt"));
    }
}
