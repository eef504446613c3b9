//! Durable storage for the bearer credential.
//!
//! Exactly one entry survives restarts: the credential itself. Identity is
//! always re-fetched from the server.

use std::fmt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{AppError, AppResult};
use crate::paths;

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> AppResult<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AppError::validation("empty_credential", "credential must not be empty"));
        }
        Ok(Self(token))
    }

    pub fn expose(&self) -> &str { &self.0 }

    pub(crate) fn bearer(&self) -> String { format!("Bearer {}", self.0) }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Credential(<redacted>)") }
}

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> AppResult<Option<Credential>>;
    fn save(&self, credential: &Credential) -> AppResult<()>;
    fn remove(&self) -> AppResult<()>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn with_credential(credential: Credential) -> Self { Self { slot: Mutex::new(Some(credential)) } }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> AppResult<Option<Credential>> { Ok(self.slot.lock().clone()) }
    fn save(&self, credential: &Credential) -> AppResult<()> {
        *self.slot.lock() = Some(credential.clone());
        Ok(())
    }
    fn remove(&self) -> AppResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// One file under the state directory, replaced atomically on every save.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self { Self { dir: state_dir.into() } }

    pub fn path(&self) -> PathBuf { paths::credential_file(&self.dir) }

    fn write_atomic(&self, contents: &str) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = paths::credential_tmp_file(&self.dir);
        std::fs::write(&tmp, contents)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, self.path())?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> AppResult<Option<Credential>> {
        match std::fs::read_to_string(self.path()) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Credential::new(text).map(Some),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &Credential) -> AppResult<()> { self.write_atomic(credential.expose()) }

    fn remove(&self) -> AppResult<()> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> AppResult<()> { Ok(()) }
