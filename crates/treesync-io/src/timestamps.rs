//! Timestamp equalization

use crate::FileCopier;
use filetime::FileTime;
use std::fs::Permissions;
use std::path::Path;
use tracing::{debug, warn};
use treesync_types::{Error, Result};

impl FileCopier {
    /// Give `older` the modification time of `newer`
    ///
    /// A read-only `older` is made writable for the update and restored
    /// afterwards.
    pub async fn touch(older: &Path, newer: &Path) -> Result<()> {
        let older_path = older.to_path_buf();
        let newer_path = newer.to_path_buf();
        tokio::task::spawn_blocking(move || touch_blocking(&older_path, &newer_path))
            .await
            .map_err(|e| Error::io(older, std::io::Error::other(e)))?
    }
}

fn touch_blocking(older: &Path, newer: &Path) -> Result<()> {
    let newer_metadata = std::fs::metadata(newer).map_err(|e| Error::io(newer, e))?;
    let mtime = FileTime::from_last_modification_time(&newer_metadata);

    let original = std::fs::metadata(older)
        .map_err(|e| Error::io(older, e))?
        .permissions();
    let toggled = original.readonly();
    if toggled {
        debug!("Temporarily granting write access to '{}'", older.display());
        std::fs::set_permissions(older, writable(&original)).map_err(|e| {
            Error::permission(older, format!("cannot grant write access: {}", e))
        })?;
    }

    let result = filetime::set_file_mtime(older, mtime).map_err(|e| Error::io(older, e));

    if toggled {
        if let Err(e) = std::fs::set_permissions(older, original) {
            warn!("Could not restore permissions of '{}': {}", older.display(), e);
            if result.is_ok() {
                return Err(Error::permission(
                    older,
                    format!("cannot restore read-only flag: {}", e),
                ));
            }
        }
    }

    result
}

#[cfg(unix)]
fn writable(permissions: &Permissions) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::from_mode(permissions.mode() | 0o200)
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn writable(permissions: &Permissions) -> Permissions {
    let mut permissions = permissions.clone();
    permissions.set_readonly(false);
    permissions
}
