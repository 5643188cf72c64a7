//! Bridge to the embedding application.
//! 與宿主應用程式之間的橋接介面。

use std::path::{Path, PathBuf};

use novelshelf_collection::ProjectInfo;

/// Capabilities the embedding application provides to the collection
/// manager. The manager owns no windows and no project model of its
/// own; everything it needs from the outside world goes through here.
pub trait HostBridge {
    /// Snapshot of the writing project currently open in the host,
    /// `None` when no project is open.
    fn current_project(&self) -> Option<ProjectInfo>;

    /// Ask the host to open the given project file.
    fn open_project(&mut self, path: &Path);

    /// Write title and description into the host's project at `path`.
    /// Returns true when the host accepted the update.
    fn push_project_metadata(&mut self, path: &Path, title: &str, desc: &str) -> bool;

    /// Yes/no question put to the user, typically before destructive
    /// operations or when unsaved changes are about to be dropped.
    fn confirm(&mut self, message: &str) -> bool;

    /// Report a failure that needs more attention than the status line.
    fn notify_error(&mut self, message: &str);

    /// Ask the host to refresh its own views, e.g. before metadata is
    /// pulled from the open project.
    fn refresh_view(&mut self);

    /// Directory where the manager may keep its configuration file.
    fn preferences_dir(&self) -> PathBuf;
}
