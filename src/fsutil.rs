//! Small filesystem helpers editors lean on around the save path.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

/// Creates an empty file at `path`, creating missing parent directories
/// first. Fails with `AlreadyExists` when the file is already there.
pub fn create_file_with_parents(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
}

/// Adds execute permission bits, as for a build script the editor just
/// wrote.
#[cfg(unix)]
pub fn make_executable(path: impl AsRef<Path>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let path = path.as_ref();
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
}

/// Execute bits do not exist off unix; reported as success so callers can
/// stay platform-blind.
#[cfg(not(unix))]
pub fn make_executable(_path: impl AsRef<Path>) -> io::Result<()> {
    Ok(())
}
