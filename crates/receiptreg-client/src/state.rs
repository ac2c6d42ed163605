use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Error as SqliteError, ffi::ErrorCode};

use crate::{ClientError, ClientResult};

const HOME_ENV_VAR: &str = "RECEIPTREG_HOME";

const DEFAULT_HOME_DIR: &str = ".receiptreg";
const DB_FILE_NAME: &str = "registry.db";
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Directory holding the registry database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryHome {
    pub root: PathBuf,
}

impl RegistryHome {
    /// An explicit override wins, then `RECEIPTREG_HOME`, then `~/.receiptreg`.
    pub fn resolve(home_override: Option<&Path>) -> ClientResult<Self> {
        let candidate = match home_override {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(HOME_ENV_VAR) {
                Some(value) => PathBuf::from(value),
                None => home::home_dir()
                    .map(|home| home.join(DEFAULT_HOME_DIR))
                    .ok_or_else(|| {
                        ClientError::store_init_failed(
                            Path::new("."),
                            "Could not resolve a home directory for the registry store.",
                        )
                    })?,
            },
        };
        let root = std::path::absolute(&candidate)
            .map_err(|error| ClientError::store_init_failed(&candidate, &error.to_string()))?;
        Ok(Self { root })
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE_NAME)
    }

    /// Creates the directory, owner-only on unix.
    pub fn prepare(&self) -> ClientResult<()> {
        fs::create_dir_all(&self.root).map_err(|error| {
            if error.kind() == std::io::ErrorKind::PermissionDenied {
                ClientError::store_init_permission_denied(&self.root, &error.to_string())
            } else {
                ClientError::store_init_failed(&self.root, &error.to_string())
            }
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(error) = fs::set_permissions(&self.root, fs::Permissions::from_mode(0o700)) {
                tracing::debug!(path = %self.root.display(), %error, "could not restrict registry permissions");
            }
        }
        Ok(())
    }
}

pub fn open_connection(db_path: &Path) -> ClientResult<Connection> {
    let connection =
        Connection::open(db_path).map_err(|error| map_sqlite_error(db_path, &error))?;
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(connection)
}

/// Maps SQLite failures onto store error codes. Unrecognized ones are
/// internal.
pub fn map_sqlite_error(path: &Path, error: &SqliteError) -> ClientError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => ClientError::store_locked(path),
        Some(ErrorCode::NotADatabase) => ClientError::store_corrupt(path),
        Some(ErrorCode::CannotOpen | ErrorCode::ReadOnly) => {
            ClientError::store_init_permission_denied(path, &error.to_string())
        }
        _ => ClientError::internal_store(&format!(
            "Registry store operation failed at `{}`: {error}",
            path.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::RegistryHome;

    #[test]
    fn explicit_home_override_wins() {
        let resolved = RegistryHome::resolve(Some(Path::new("/tmp/receiptreg-home")));
        assert!(resolved.is_ok());
        if let Ok(home) = resolved {
            assert_eq!(home.root, Path::new("/tmp/receiptreg-home"));
            assert_eq!(home.db_path(), Path::new("/tmp/receiptreg-home/registry.db"));
        }
    }

    #[test]
    fn relative_override_is_made_absolute() {
        let resolved = RegistryHome::resolve(Some(Path::new("registry-home")));
        assert!(resolved.is_ok_and(|home| home.root.is_absolute() && home.root.ends_with("registry-home")));
    }
}
