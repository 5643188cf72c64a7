//! Persisted manager preferences: last opened collection and window
//! layout.
//! 管理視窗的偏好設定：最後開啟的收藏與視窗配置。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PREFS_FILE_NAME: &str = "collection.json";

const DEFAULT_TREE_WIDTH: u32 = 260;
const MIN_TREE_WIDTH: u32 = 120;
const MAX_TREE_WIDTH: u32 = 2000;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare preferences directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    #[serde(default = "default_window_width")]
    pub width: u32,
    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_window_width() -> u32 {
    600
}

fn default_window_height() -> u32 {
    300
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl WindowSize {
    fn sanitize(&mut self) {
        if self.width == 0 {
            self.width = default_window_width();
        }
        if self.height == 0 {
            self.height = default_window_height();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerPrefs {
    #[serde(default)]
    pub last_open: Option<PathBuf>,
    #[serde(default = "default_tree_width")]
    pub tree_width: u32,
    #[serde(default)]
    pub window_size: WindowSize,
}

fn default_tree_width() -> u32 {
    DEFAULT_TREE_WIDTH
}

impl Default for ManagerPrefs {
    fn default() -> Self {
        Self {
            last_open: None,
            tree_width: DEFAULT_TREE_WIDTH,
            window_size: WindowSize::default(),
        }
    }
}

impl ManagerPrefs {
    pub fn sanitize(&mut self) {
        if self.tree_width == 0 {
            self.tree_width = DEFAULT_TREE_WIDTH;
        }
        self.tree_width = self.tree_width.clamp(MIN_TREE_WIDTH, MAX_TREE_WIDTH);
        self.window_size.sanitize();
    }
}

#[derive(Debug)]
pub struct ManagerPrefsStore {
    path: PathBuf,
    data: ManagerPrefs,
}

impl ManagerPrefsStore {
    pub fn new(path: impl Into<PathBuf>, data: ManagerPrefs) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                data: ManagerPrefs::default(),
            });
        }
        let raw = fs::read_to_string(&path).map_err(|source| PrefsError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: ManagerPrefs =
            serde_json::from_str(&raw).map_err(|source| PrefsError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &ManagerPrefs {
        &self.data
    }

    pub fn update<F>(&mut self, mut apply: F) -> Result<(), PrefsError>
    where
        F: FnMut(&mut ManagerPrefs),
    {
        apply(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| PrefsError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let serialized =
            serde_json::to_string_pretty(&self.data).map_err(|source| PrefsError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized).map_err(|source| PrefsError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| PrefsError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}
