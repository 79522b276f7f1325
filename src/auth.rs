//! Authentication context and on-disk credential storage.
//!
//! The context is constructed once — by logging in or by loading a saved
//! copy — and passed explicitly into [`crate::client::InsightClient`].
//! Nothing in this crate holds an ambient token.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::UserInfo;

/// Prefix the backend uses to mark role-granting permissions.
const ROLE_PREFIX: &str = "ROLE_";

/// Bearer token plus the user it authenticates.
///
/// Persists to `~/.sqlsight/auth.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub token: String,
    pub user: UserInfo,
}

impl AuthContext {
    /// Default path for the stored credentials file.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".sqlsight").join("auth.json")
    }

    /// Load saved credentials. Returns `None` if none are stored.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading auth file: {}", path.display()))?;
        let context: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing auth file: {}", path.display()))?;
        Ok(Some(context))
    }

    /// Save credentials to disk with restricted permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory: {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, &contents)
            .with_context(|| format!("writing auth file: {}", path.display()))?;

        // Set file permissions to 0600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Remove saved credentials, if any.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing auth file: {}", path.display())),
        }
    }

    /// The user's role, with the `ROLE_` prefix stripped.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.user
            .permissions
            .iter()
            .find_map(|p| p.strip_prefix(ROLE_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthContext {
        AuthContext {
            token: "bearer-token".to_string(),
            user: UserInfo {
                user_id: 42,
                username: "analyst".to_string(),
                permissions: vec!["ROLE_USER".to_string(), "chat:use".to_string()],
            },
        }
    }

    #[test]
    fn round_trip_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("auth.json");

        sample().save(&path).unwrap();
        let loaded = AuthContext::load(&path).unwrap().unwrap();

        assert_eq!(loaded.token, "bearer-token");
        assert_eq!(loaded.user.user_id, 42);
        assert_eq!(loaded.user.username, "analyst");
    }

    #[test]
    fn load_nonexistent_file_returns_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        assert!(AuthContext::load(&path).unwrap().is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("auth.json");

        sample().save(&path).unwrap();
        AuthContext::clear(&path).unwrap();
        AuthContext::clear(&path).unwrap();
        assert!(AuthContext::load(&path).unwrap().is_none());
    }

    #[test]
    fn role_strips_prefix() {
        assert_eq!(sample().role(), Some("USER"));
    }

    #[test]
    fn role_missing_when_no_role_permission() {
        let mut context = sample();
        context.user.permissions = vec!["chat:use".to_string()];
        assert_eq!(context.role(), None);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("auth.json");
        sample().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
