//! Presentation layer for the NovelShelf collection: the manager
//! controller, host bridge, display mirror, and persisted preferences.
//! NovelShelf 收藏的呈現層：管理控制器、宿主橋接、顯示鏡像與偏好設定。

pub mod controller;
pub mod host;
pub mod prefs;
pub mod view;

pub use controller::{CollectionManager, IndexCard, StatusLine};
pub use host::HostBridge;
pub use prefs::{ManagerPrefs, ManagerPrefsStore, PrefsError, WindowSize, PREFS_FILE_NAME};
pub use view::{TreeMirror, TreeRow};
