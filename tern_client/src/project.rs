//! Projects: one analysis server per root directory.

use crate::process::ServerProcess;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One analysis-server session bound to a root directory.
///
/// The project is shared by every buffer under its root. Dropping it stops
/// the server it owns.
pub struct Project {
    root: PathBuf,
    /// Last known listening port.
    pub(crate) port: Option<u16>,
    /// Server launched by this session, if any.
    pub(crate) process: Option<Box<dyn ServerProcess>>,
    /// When the last launch attempt failed.
    pub(crate) last_failed: Option<Instant>,
}

impl Project {
    /// Creates a project with no server yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            port: None,
            process: None,
            last_failed: None,
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the last known port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns true if this session launched a server that is still held.
    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    /// Returns `file` relative to the root, as the server names it.
    pub fn relative_name(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        let name = relative.to_string_lossy();
        if cfg!(windows) {
            name.replace('\\', "/")
        } else {
            name.into_owned()
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.root)
            .field("port", &self.port)
            .field("running", &self.process.is_some())
            .field("last_failed", &self.last_failed)
            .finish()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            log::info!("Stopping server for {}", self.root.display());
            if let Err(e) = process.terminate() {
                log::warn!("Failed to stop server for {}: {}", self.root.display(), e);
            }
        }
    }
}

/// Finds the project root owning `file`.
///
/// Walks up from the file's directory looking for `marker`; the first
/// directory containing it is the root. Without a marker the file's own
/// directory is used. The filesystem root itself is never probed. Returns
/// `None` if the file's directory does not exist.
pub fn find_project_root(file: &Path, marker: &str) -> Option<PathBuf> {
    let dir = file.parent()?;
    if !dir.is_dir() {
        return None;
    }

    for ancestor in dir.ancestors() {
        if ancestor.parent().is_none() {
            break;
        }
        if ancestor.join(marker).is_file() {
            return Some(ancestor.to_path_buf());
        }
    }

    Some(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_marker_in_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("app");
        let nested = root.join("src").join("views");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join(".tern-project"), "{}").unwrap();

        let found = find_project_root(&nested.join("main.js"), ".tern-project");
        assert_eq!(found, Some(root));
    }

    #[test]
    fn test_nearest_marker_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let outer = tmp.path().join("outer");
        let inner = outer.join("inner");
        fs::create_dir_all(&inner).unwrap();
        fs::write(outer.join(".tern-project"), "{}").unwrap();
        fs::write(inner.join(".tern-project"), "{}").unwrap();

        let found = find_project_root(&inner.join("a.js"), ".tern-project");
        assert_eq!(found, Some(inner));
    }

    #[test]
    fn test_fallback_to_file_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("loose");
        fs::create_dir_all(&dir).unwrap();

        let found = find_project_root(&dir.join("a.js"), "no-such-marker-file");
        assert_eq!(found, Some(dir));
    }

    #[test]
    fn test_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let found = find_project_root(&tmp.path().join("gone").join("a.js"), ".tern-project");
        assert_eq!(found, None);
    }

    #[test]
    fn test_relative_name() {
        let project = Project::new("/work/app");
        assert_eq!(project.relative_name(Path::new("/work/app/src/a.js")), "src/a.js");
        assert_eq!(project.relative_name(Path::new("/elsewhere/b.js")), "/elsewhere/b.js");
        assert!(!project.has_process());
        assert_eq!(project.port(), None);
    }
}
