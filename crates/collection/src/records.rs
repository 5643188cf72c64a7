//! Metadata records held by a collection.
//! 收藏中保存的中繼資料記錄。

use std::path::{Path, PathBuf};

/// Snapshot of the writing project currently open in the host
/// application.
/// 宿主應用程式目前開啟之寫作專案的快照。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Where the project file lives, `None` for a never-saved project.
    pub file_path: Option<PathBuf>,
    pub title: String,
    pub desc: String,
}

/// A book on the shelf: the location of an external project file plus
/// the cached title and description shown in the collection.
/// 書架上的一本書：外部專案檔的位置，加上收藏中顯示的標題與描述快取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    file_path: PathBuf,
    pub title: String,
    pub desc: String,
}

impl Book {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            title: String::new(),
            desc: String::new(),
        }
    }

    /// Location of the external project file; fixed for the lifetime of
    /// the record.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Copy title and description from a project snapshot.
    /// Returns true when the stored metadata actually changed.
    pub fn pull_metadata(&mut self, project: &ProjectInfo) -> bool {
        if self.title == project.title && self.desc == project.desc {
            return false;
        }
        self.title = project.title.clone();
        self.desc = project.desc.clone();
        true
    }
}

/// A named series grouping several books.
/// 將多本書歸為一組的系列。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    pub title: String,
    pub desc: String,
}

impl Series {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            desc: String::new(),
        }
    }
}
