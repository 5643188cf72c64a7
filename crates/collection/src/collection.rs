//! The collection engine: owns the records, the tree, and the file.
//! 收藏引擎：持有記錄、節點樹與檔案本身。

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backup::FileBackup;
use crate::ids::{new_id, NodeId, NodeKind};
use crate::records::{Book, ProjectInfo, Series};
use crate::tree::{CollectionTree, NodePosition, TreeChange, TreeError};
use crate::xml::{self, ParsedBook, ParsedItem, ParsedSeries};

/// Errors raised by collection operations.
///
/// The display strings double as user-facing status messages, so their
/// wording is part of the contract.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// 副檔名不符。
    #[error("Wrong file extension: \"{path}\".")]
    InvalidExtension { path: PathBuf },
    /// 目前專案尚未存檔。
    #[error("There is no file for the current project. Please save first.")]
    UnsavedProject,
    /// 專案檔不存在。
    #[error("\"{path}\" not found.")]
    ProjectNotFound { path: PathBuf },
    #[error("Cannot remove book: \"{0}\".")]
    BookNotFound(String),
    #[error("Cannot remove series: \"{0}\".")]
    SeriesNotFound(String),
    #[error("Unknown node: \"{0}\".")]
    UnknownNode(String),
    #[error("Invalid parent node: \"{0}\".")]
    InvalidParent(NodeId),
    #[error("Cannot process file: \"{path}\" - {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot process file: \"{path}\" - {source}")]
    ParseXml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },
    #[error("Cannot process file: \"{path}\" - missing node id.")]
    MissingNodeId { path: PathBuf },
    #[error("No collection found in file: \"{path}\".")]
    NoCollection { path: PathBuf },
    #[error("No valid version found in file: \"{path}\".")]
    NoVersion { path: PathBuf },
    /// 檔案由較新的版本建立。
    #[error("The collection was created with a newer plugin version.")]
    NewerFormat,
    /// 檔案由過舊的版本建立。
    #[error("The collection was created with an outdated plugin version.")]
    OutdatedFormat,
    #[error("The collection was created with a newer plugin version.")]
    NewerMinorFormat,
    #[error("Cannot overwrite file: \"{path}\".")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot write file: \"{path}\".")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot write file: \"{path}\".")]
    EmitXml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// A collection of books and series persisted as one `nvcx` file.
///
/// Metadata lives in the two record maps; order and parenthood live in
/// the tree. Both always describe the same set of ids. The engine also
/// tracks whether the in-memory state has unsaved changes.
#[derive(Debug)]
pub struct Collection {
    file_path: PathBuf,
    title: String,
    books: HashMap<NodeId, Book>,
    series: HashMap<NodeId, Series>,
    tree: CollectionTree,
    modified: bool,
}

impl Collection {
    /// Create an empty collection bound to the given file location.
    /// The collection title is derived from the file stem.
    pub fn new(file_path: impl Into<PathBuf>) -> Result<Self, CollectionError> {
        let file_path = file_path.into();
        let extension_ok = file_path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.eq_ignore_ascii_case(xml::EXTENSION))
            .unwrap_or(false);
        if !extension_ok {
            return Err(CollectionError::InvalidExtension { path: file_path });
        }
        let title = file_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            file_path,
            title,
            books: HashMap::new(),
            series: HashMap::new(),
            tree: CollectionTree::new(),
            modified: false,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Collection title shown in window captions.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn tree(&self) -> &CollectionTree {
        &self.tree
    }

    pub fn book(&self, id: &NodeId) -> Option<&Book> {
        self.books.get(id)
    }

    pub fn series(&self, id: &NodeId) -> Option<&Series> {
        self.series.get(id)
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Register the tree observer used by a display layer.
    pub fn observe_tree(&mut self, observer: impl FnMut(&TreeChange) + 'static) {
        self.tree.set_observer(observer);
    }

    /// Select a node, or pass `None` to clear the selection.
    pub fn select(&mut self, id: Option<&NodeId>) -> Result<(), CollectionError> {
        self.tree.select(id).map_err(CollectionError::from)
    }

    /// Add the host's project as a new book.
    ///
    /// Returns `Ok(None)` when some book already points at the same
    /// project file; such an add is suppressed without an error and the
    /// collection is not marked as changed.
    pub fn add_book(
        &mut self,
        project: &ProjectInfo,
        parent: Option<&NodeId>,
        position: NodePosition,
    ) -> Result<Option<NodeId>, CollectionError> {
        let project_path = match &project.file_path {
            Some(path) => path,
            None => return Err(CollectionError::UnsavedProject),
        };
        if !project_path.is_file() {
            return Err(CollectionError::ProjectNotFound {
                path: project_path.clone(),
            });
        }
        if let Some(parent_id) = parent {
            if parent_id.kind() != Some(NodeKind::Series) {
                return Err(CollectionError::InvalidParent(parent_id.clone()));
            }
        }
        if self
            .books
            .values()
            .any(|book| book.file_path() == project_path)
        {
            return Ok(None);
        }
        let id = new_id(&self.books, NodeKind::Book);
        let mut book = Book::new(project_path.clone());
        book.pull_metadata(project);
        self.tree.insert(parent, position, id.clone(), book.title.clone())?;
        self.books.insert(id.clone(), book);
        self.modified = true;
        Ok(Some(id))
    }

    /// Create a new series with the given title at a top-level position.
    pub fn add_series(
        &mut self,
        title: impl Into<String>,
        position: NodePosition,
    ) -> Result<NodeId, CollectionError> {
        let id = new_id(&self.series, NodeKind::Series);
        let series = Series::new(title);
        self.tree
            .insert(None, position, id.clone(), series.title.clone())?;
        self.series.insert(id.clone(), series);
        self.modified = true;
        Ok(id)
    }

    /// Remove a book record and its node.
    pub fn remove_book(&mut self, id: &NodeId) -> Result<String, CollectionError> {
        let title = match self.books.get(id) {
            Some(book) => book.title.clone(),
            None => return Err(CollectionError::BookNotFound(id.to_string())),
        };
        self.tree.remove(id)?;
        self.books.remove(id);
        self.modified = true;
        Ok(format!("Book removed from the collection: \"{title}\"."))
    }

    /// Remove a series; its books move to the end of the top level in
    /// their original order.
    pub fn remove_series(&mut self, id: &NodeId) -> Result<String, CollectionError> {
        let title = match self.series.get(id) {
            Some(series) => series.title.clone(),
            None => return Err(CollectionError::SeriesNotFound(id.to_string())),
        };
        let members: Vec<NodeId> = self.tree.children(Some(id)).to_vec();
        for member in &members {
            self.tree.move_node(member, None, NodePosition::End)?;
        }
        self.tree.remove(id)?;
        self.series.remove(id);
        self.modified = true;
        Ok(format!("Series removed from the collection: \"{title}\"."))
    }

    /// Remove a series together with all of its member book records.
    pub fn remove_series_with_books(&mut self, id: &NodeId) -> Result<String, CollectionError> {
        let title = match self.series.get(id) {
            Some(series) => series.title.clone(),
            None => return Err(CollectionError::SeriesNotFound(id.to_string())),
        };
        let members: Vec<NodeId> = self.tree.children(Some(id)).to_vec();
        self.tree.remove(id)?;
        for member in &members {
            self.books.remove(member);
        }
        self.series.remove(id);
        self.modified = true;
        Ok(format!("Series removed from the collection: \"{title}\"."))
    }

    /// Rename a book or series; the tree label follows the title.
    pub fn set_title(&mut self, id: &NodeId, title: &str) -> Result<(), CollectionError> {
        let changed = match id.kind() {
            Some(NodeKind::Book) => {
                let book = self
                    .books
                    .get_mut(id)
                    .ok_or_else(|| CollectionError::UnknownNode(id.to_string()))?;
                if book.title == title {
                    false
                } else {
                    book.title = title.to_string();
                    true
                }
            }
            Some(NodeKind::Series) => {
                let series = self
                    .series
                    .get_mut(id)
                    .ok_or_else(|| CollectionError::UnknownNode(id.to_string()))?;
                if series.title == title {
                    false
                } else {
                    series.title = title.to_string();
                    true
                }
            }
            None => return Err(CollectionError::UnknownNode(id.to_string())),
        };
        if changed {
            self.tree.set_label(id, title)?;
            self.modified = true;
        }
        Ok(())
    }

    /// Update a node's description.
    pub fn set_description(&mut self, id: &NodeId, desc: &str) -> Result<(), CollectionError> {
        match id.kind() {
            Some(NodeKind::Book) => {
                let book = self
                    .books
                    .get_mut(id)
                    .ok_or_else(|| CollectionError::UnknownNode(id.to_string()))?;
                if book.desc != desc {
                    book.desc = desc.to_string();
                    self.modified = true;
                }
            }
            Some(NodeKind::Series) => {
                let series = self
                    .series
                    .get_mut(id)
                    .ok_or_else(|| CollectionError::UnknownNode(id.to_string()))?;
                if series.desc != desc {
                    series.desc = desc.to_string();
                    self.modified = true;
                }
            }
            None => return Err(CollectionError::UnknownNode(id.to_string())),
        }
        Ok(())
    }

    /// Overwrite a book's metadata from the host project snapshot.
    /// Returns true when the stored metadata actually changed.
    pub fn update_book_from(
        &mut self,
        id: &NodeId,
        project: &ProjectInfo,
    ) -> Result<bool, CollectionError> {
        let book = self
            .books
            .get_mut(id)
            .ok_or_else(|| CollectionError::UnknownNode(id.to_string()))?;
        let changed = book.pull_metadata(project);
        if changed {
            let label = book.title.clone();
            self.tree.set_label(id, label)?;
            self.modified = true;
        }
        Ok(changed)
    }

    /// Structural move used by drag and drop. The caller decides the
    /// placement; the engine keeps the shape rule: books live at the top
    /// level or inside a series, series only at the top level.
    pub fn move_node(
        &mut self,
        id: &NodeId,
        parent: Option<&NodeId>,
        position: NodePosition,
    ) -> Result<(), CollectionError> {
        match id.kind() {
            Some(NodeKind::Book) => {
                if let Some(parent_id) = parent {
                    if parent_id.kind() != Some(NodeKind::Series) {
                        return Err(CollectionError::InvalidParent(parent_id.clone()));
                    }
                }
            }
            Some(NodeKind::Series) => {
                if let Some(parent_id) = parent {
                    return Err(CollectionError::InvalidParent(parent_id.clone()));
                }
            }
            None => return Err(CollectionError::UnknownNode(id.to_string())),
        }
        self.tree.move_node(id, parent, position)?;
        self.modified = true;
        Ok(())
    }

    /// Clear the structural nodes; the record maps stay untouched.
    pub fn reset_tree(&mut self) {
        self.tree.clear();
    }

    /// Read the collection file, replacing the in-memory state.
    ///
    /// Version gating happens during the parse, before any state is
    /// touched. A file without a version attribute is legacy data: it is
    /// accepted and rewritten in the current format right away. Books
    /// whose project file no longer exists on disk are skipped silently.
    pub fn read(&mut self) -> Result<String, CollectionError> {
        let text = fs::read_to_string(&self.file_path).map_err(|source| CollectionError::ReadFile {
            path: self.file_path.clone(),
            source,
        })?;
        let parsed = xml::parse_collection(&text, &self.file_path)?;

        self.reset_tree();
        self.books.clear();
        self.series.clear();
        for item in &parsed.items {
            match item {
                ParsedItem::Book(book) => self.restore_book(None, book)?,
                ParsedItem::Series(series) => self.restore_series(series)?,
            }
        }
        self.modified = false;
        if parsed.legacy {
            self.write()?;
        }
        Ok(format!(
            "{} Books found in \"{}\".",
            self.books.len(),
            self.file_path.display()
        ))
    }

    /// Serialize the collection to its file with backup-and-swap: the
    /// previous file is renamed aside first and brought back when the
    /// write fails, so the last good copy is never lost.
    pub fn write(&mut self) -> Result<String, CollectionError> {
        let items = self.collect_items();
        let document = xml::render_collection(&items).map_err(|source| CollectionError::EmitXml {
            path: self.file_path.clone(),
            source,
        })?;
        replace_file(&self.file_path, |path| fs::write(path, document.as_bytes()))?;
        self.modified = false;
        Ok(format!("\"{}\" written.", self.file_path.display()))
    }

    fn restore_book(&mut self, parent: Option<&NodeId>, book: &ParsedBook) -> Result<(), CollectionError> {
        let path = match &book.path {
            Some(path) if path.is_file() => path,
            _ => return Ok(()),
        };
        let title = match &book.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => format!("Untitled ({})", book.id),
        };
        self.tree
            .insert(parent, NodePosition::End, book.id.clone(), title.clone())?;
        let mut record = Book::new(path.clone());
        record.title = title;
        record.desc = book.desc.clone();
        self.books.insert(book.id.clone(), record);
        Ok(())
    }

    fn restore_series(&mut self, series: &ParsedSeries) -> Result<(), CollectionError> {
        let title = match &series.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => format!("Untitled ({})", series.id),
        };
        self.tree
            .insert(None, NodePosition::End, series.id.clone(), title.clone())?;
        let mut record = Series::new(title);
        record.desc = series.desc.clone();
        self.series.insert(series.id.clone(), record);
        for book in &series.books {
            self.restore_book(Some(&series.id), book)?;
        }
        Ok(())
    }

    fn collect_items(&self) -> Vec<ParsedItem> {
        let mut items = Vec::new();
        for id in self.tree.children(None) {
            match id.kind() {
                Some(NodeKind::Book) => {
                    if let Some(book) = self.book_item(id) {
                        items.push(ParsedItem::Book(book));
                    }
                }
                Some(NodeKind::Series) => {
                    if let Some(series) = self.series_item(id) {
                        items.push(ParsedItem::Series(series));
                    }
                }
                None => {}
            }
        }
        items
    }

    fn book_item(&self, id: &NodeId) -> Option<ParsedBook> {
        let book = self.books.get(id)?;
        Some(ParsedBook {
            id: id.clone(),
            title: Some(book.title.clone()),
            desc: book.desc.clone(),
            path: Some(book.file_path().to_path_buf()),
        })
    }

    fn series_item(&self, id: &NodeId) -> Option<ParsedSeries> {
        let series = self.series.get(id)?;
        let books = self
            .tree
            .children(Some(id))
            .iter()
            .filter_map(|child| self.book_item(child))
            .collect();
        Some(ParsedSeries {
            id: id.clone(),
            title: Some(series.title.clone()),
            desc: series.desc.clone(),
            books,
        })
    }
}

/// Replace the file at `path`, holding the previous copy aside as a
/// backup until `emit` has produced the new content.
/// 以備份保留舊檔後再寫入新內容，寫入失敗時還原舊檔。
fn replace_file(
    path: &Path,
    emit: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<(), CollectionError> {
    let backup = FileBackup::create(path).map_err(|source| CollectionError::Backup {
        path: path.to_path_buf(),
        source,
    })?;
    if let Err(source) = emit(path) {
        // keep the write error even when the backup cannot be restored
        let _ = backup.restore();
        return Err(CollectionError::WriteFile {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
