//! Moving a (possibly still open) download file to a new path.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{DownloadFileError, Result};

use super::ConflictPolicy;

/// Fail early if `to` is occupied and the policy forbids replacing it.
///
/// Only a fast path for the common case: under `Fail` the move itself never
/// replaces a destination that appears after this check.
pub(super) fn check_destination(to: &Path, policy: ConflictPolicy) -> Result<()> {
    match std::fs::symlink_metadata(to) {
        Ok(_) if policy == ConflictPolicy::Fail => Err(conflict(to)),
        Ok(meta) if meta.is_dir() => Err(DownloadFileError::io(
            "rename",
            to,
            io::Error::new(io::ErrorKind::InvalidInput, "destination is a directory"),
        )),
        _ => Ok(()),
    }
}

/// Rename `from` to `to` while `open` (if any) stays usable for appends.
///
/// On Unix the open descriptor follows the inode, so the write offset is kept.
/// Elsewhere the handle is closed around the move and reopened in append mode.
/// Under `Fail` the move is a hard link plus unlink, which never replaces an
/// existing `to`. Across filesystems, or where links are unsupported, the
/// content is copied and the source removed only after the copy succeeded.
/// On error the file is still at `from` and `to` is untouched.
pub(super) fn move_file(
    from: &Path,
    to: &Path,
    policy: ConflictPolicy,
    open: &mut Option<File>,
) -> Result<()> {
    #[cfg(not(unix))]
    let was_open = open.take().is_some();

    let moved = move_path(from, to, policy, open);

    #[cfg(not(unix))]
    if was_open {
        let at = if moved.is_ok() { to } else { from };
        *open = Some(reopen_for_append(at)?);
    }
    moved
}

fn move_path(from: &Path, to: &Path, policy: ConflictPolicy, open: &mut Option<File>) -> Result<()> {
    let attempt = match policy {
        ConflictPolicy::Overwrite => std::fs::rename(from, to),
        ConflictPolicy::Fail => std::fs::hard_link(from, to),
    };
    match attempt {
        Ok(()) if policy == ConflictPolicy::Fail => unlink_source(from, to),
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(conflict(to)),
        Err(e) if needs_copy(&e, policy) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "rename not possible in place, copying: {}", e);
            copy_then_remove(from, to, policy, open)
        }
        Err(e) => Err(DownloadFileError::io("rename", from, e)),
    }
}

/// Drop the old name after a hard link; undo the link if that fails.
fn unlink_source(from: &Path, to: &Path) -> Result<()> {
    if let Err(e) = std::fs::remove_file(from) {
        let _ = std::fs::remove_file(to);
        return Err(DownloadFileError::io("rename", from, e));
    }
    Ok(())
}

fn needs_copy(e: &io::Error, policy: ConflictPolicy) -> bool {
    if is_cross_device(e) {
        return true;
    }
    // Some filesystems (FAT, several FUSE mounts) refuse hard links.
    policy == ConflictPolicy::Fail
        && matches!(
            e.kind(),
            io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
        )
}

fn copy_then_remove(
    from: &Path,
    to: &Path,
    policy: ConflictPolicy,
    open: &mut Option<File>,
) -> Result<()> {
    if let Some(f) = open.as_ref() {
        f.sync_data()
            .map_err(|e| DownloadFileError::io("sync", from, e))?;
    }
    let mut dest = match policy {
        ConflictPolicy::Fail => File::options().write(true).create_new(true).open(to),
        ConflictPolicy::Overwrite => File::create(to),
    }
    .map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => conflict(to),
        _ => DownloadFileError::io("copy", to, e),
    })?;

    let copied = File::open(from).and_then(|mut src| io::copy(&mut src, &mut dest));
    drop(dest);
    if let Err(e) = copied {
        let _ = std::fs::remove_file(to);
        return Err(DownloadFileError::io("copy", to, e));
    }

    let reopened = match open.as_ref().map(|_| reopen_for_append(to)).transpose() {
        Ok(f) => f,
        Err(e) => {
            let _ = std::fs::remove_file(to);
            return Err(e);
        }
    };
    if let Err(e) = std::fs::remove_file(from) {
        // Both names would hold the data; keep the original and drop the copy.
        let _ = std::fs::remove_file(to);
        return Err(DownloadFileError::io("remove", from, e));
    }
    if reopened.is_some() {
        *open = reopened;
    }
    Ok(())
}

fn reopen_for_append(path: &Path) -> Result<File> {
    File::options()
        .append(true)
        .open(path)
        .map_err(|e| DownloadFileError::io("reopen", path, e))
}

fn conflict(to: &Path) -> DownloadFileError {
    DownloadFileError::PathConflict {
        path: to.to_path_buf(),
    }
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(windows)]
fn is_cross_device(e: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    e.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn occupied_destination_conflicts_under_fail_policy() {
        let dir = tempfile::tempdir().unwrap();
        let to = dir.path().join("taken.bin");
        std::fs::write(&to, b"old").unwrap();
        let err = check_destination(&to, ConflictPolicy::Fail).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathConflict);
        assert!(check_destination(&to, ConflictPolicy::Overwrite).is_ok());
    }

    #[test]
    fn directory_destination_is_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_destination(dir.path(), ConflictPolicy::Overwrite).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn open_handle_keeps_appending_after_move() {
        for policy in [ConflictPolicy::Fail, ConflictPolicy::Overwrite] {
            let dir = tempfile::tempdir().unwrap();
            let from = dir.path().join("a.part");
            let to = dir.path().join("b.part");
            let mut open = Some(File::create(&from).unwrap());
            open.as_mut().unwrap().write_all(b"first ").unwrap();
            move_file(&from, &to, policy, &mut open).unwrap();
            open.as_mut().unwrap().write_all(b"second").unwrap();
            drop(open);
            assert!(!from.exists());
            assert_eq!(std::fs::read(&to).unwrap(), b"first second");
        }
    }

    #[test]
    fn move_never_replaces_destination_that_appeared_after_check() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("mine.part");
        let to = dir.path().join("late.bin");
        let mut open = Some(File::create(&from).unwrap());
        open.as_mut().unwrap().write_all(b"mine").unwrap();

        check_destination(&to, ConflictPolicy::Fail).unwrap();
        std::fs::write(&to, b"someone else").unwrap();

        let err = move_file(&from, &to, ConflictPolicy::Fail, &mut open).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathConflict);
        open.as_mut().unwrap().write_all(b"+more").unwrap();
        drop(open);
        assert_eq!(std::fs::read(&from).unwrap(), b"mine+more");
        assert_eq!(std::fs::read(&to).unwrap(), b"someone else");
    }

    #[test]
    fn copy_fallback_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("src.part");
        let to = dir.path().join("dst.part");
        let mut open = Some(File::create(&from).unwrap());
        open.as_mut().unwrap().write_all(b"abc").unwrap();
        copy_then_remove(&from, &to, ConflictPolicy::Fail, &mut open).unwrap();
        open.as_mut().unwrap().write_all(b"def").unwrap();
        drop(open);
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"abcdef");
    }

    #[test]
    fn copy_fallback_respects_conflict_policy() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("src.part");
        let to = dir.path().join("dst.bin");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"existing content").unwrap();

        let err = copy_then_remove(&from, &to, ConflictPolicy::Fail, &mut None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathConflict);
        assert_eq!(std::fs::read(&from).unwrap(), b"new");
        assert_eq!(std::fs::read(&to).unwrap(), b"existing content");

        copy_then_remove(&from, &to, ConflictPolicy::Overwrite, &mut None).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn copy_fallback_keeps_source_when_it_cannot_be_removed() {
        use std::os::unix::fs::PermissionsExt;

        // Root ignores directory permissions.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        let from = locked.join("src.part");
        let to = dir.path().join("dst.part");
        let mut open = Some(File::create(&from).unwrap());
        open.as_mut().unwrap().write_all(b"abc").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = copy_then_remove(&from, &to, ConflictPolicy::Fail, &mut open);
        open.as_mut().unwrap().write_all(b"def").unwrap();
        drop(open);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(result.unwrap_err().kind(), ErrorKind::IoFailure);
        assert!(!to.exists());
        assert_eq!(std::fs::read(&from).unwrap(), b"abcdef");
    }

    #[test]
    fn failed_move_leaves_source_intact() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("keep.part");
        std::fs::write(&from, b"payload").unwrap();
        let to = dir.path().join("missing-dir").join("x.bin");
        for policy in [ConflictPolicy::Fail, ConflictPolicy::Overwrite] {
            let err = move_file(&from, &to, policy, &mut None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::IoFailure);
            assert_eq!(std::fs::read(&from).unwrap(), b"payload");
        }
    }
}
