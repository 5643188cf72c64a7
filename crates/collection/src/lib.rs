//! Book collection model for NovelShelf: series, book records, and the
//! versioned `nvcx` file format.
//! NovelShelf 的書籍收藏模型：系列、書籍記錄，以及版本化的 `nvcx` 檔案格式。

pub mod backup;
pub mod collection;
pub mod ids;
pub mod records;
pub mod tree;
pub mod xml;

pub use backup::FileBackup;
pub use collection::{Collection, CollectionError};
pub use ids::{new_id, NodeId, NodeKind, BOOK_PREFIX, SERIES_PREFIX};
pub use records::{Book, ProjectInfo, Series};
pub use tree::{CollectionTree, NodePosition, TreeChange, TreeError};
pub use xml::{strip_illegal_characters, EXTENSION, MAJOR_VERSION, MINOR_VERSION, XML_HEADER};
