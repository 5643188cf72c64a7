//! The collection manager: presentation state around one open collection.
//! 收藏管理員：圍繞單一開啟收藏的呈現層狀態。
//!
//! The manager holds no domain logic. Every mutation goes through the
//! engine; the manager decides placement, asks the host for
//! confirmations, keeps the index card and status line, and mirrors the
//! tree for display.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use novelshelf_collection::{Collection, NodeId, NodeKind, NodePosition};

use crate::host::HostBridge;
use crate::prefs::{ManagerPrefs, ManagerPrefsStore, PrefsError, WindowSize, PREFS_FILE_NAME};
use crate::view::{TreeMirror, TreeRow};

/// One-line status display. A message starting with `!` is shown with
/// error styling; `show` sets the plain baseline text that `restore`
/// brings back after an error.
/// 單行狀態顯示。以 `!` 開頭的訊息採錯誤樣式呈現。
#[derive(Debug, Default)]
pub struct StatusLine {
    text: String,
    error: bool,
    baseline: String,
}

impl StatusLine {
    /// Display a result message; a leading `!` switches to error styling.
    pub fn set(&mut self, message: &str) {
        if let Some(rest) = message.strip_prefix('!') {
            self.error = true;
            self.text = rest.trim().to_string();
        } else {
            self.error = false;
            self.text = message.to_string();
        }
    }

    /// Display plain text and remember it as the baseline.
    pub fn show(&mut self, message: &str) {
        self.baseline = message.to_string();
        self.error = false;
        self.text = message.to_string();
    }

    /// Overwrite an error message with the baseline from before.
    pub fn restore(&mut self) {
        self.error = false;
        self.text = self.baseline.clone();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_error(&self) -> bool {
        self.error
    }
}

/// Edit buffer for the selected node's title and description.
/// 所選節點標題與描述的編輯緩衝區。
///
/// Edits stay in the buffer until `apply_changes` flushes them into the
/// engine; the description tracks its own changed flag so an untouched
/// text body is never written back.
#[derive(Debug, Default)]
pub struct IndexCard {
    title: String,
    desc: String,
    desc_changed: bool,
}

impl IndexCard {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn edit_title(&mut self, text: impl Into<String>) {
        self.title = text.into();
    }

    pub fn edit_description(&mut self, text: impl Into<String>) {
        self.desc = text.into();
        self.desc_changed = true;
    }

    fn load(&mut self, title: &str, desc: &str) {
        self.title = title.to_string();
        self.desc = desc.to_string();
        self.desc_changed = false;
    }

    fn clear(&mut self) {
        self.title.clear();
        self.desc.clear();
        self.desc_changed = false;
    }
}

/// Controller for one collection manager window.
/// 單一收藏管理視窗的控制器。
///
/// At most one collection is open at a time; opening another one closes
/// the current collection first, prompting to save unsaved changes.
pub struct CollectionManager<H: HostBridge> {
    host: H,
    prefs: ManagerPrefsStore,
    collection: Option<Collection>,
    mirror: Rc<RefCell<TreeMirror>>,
    index_card: IndexCard,
    status: StatusLine,
    current: Option<NodeId>,
}

impl<H: HostBridge> CollectionManager<H> {
    /// Create a manager with preferences loaded from the host's
    /// configuration directory.
    pub fn new(host: H) -> Result<Self, PrefsError> {
        let prefs = ManagerPrefsStore::load(host.preferences_dir().join(PREFS_FILE_NAME))?;
        Ok(Self {
            host,
            prefs,
            collection: None,
            mirror: Rc::new(RefCell::new(TreeMirror::new())),
            index_card: IndexCard::default(),
            status: StatusLine::default(),
            current: None,
        })
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.collection.is_some()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn index_card(&self) -> &IndexCard {
        &self.index_card
    }

    pub fn index_card_mut(&mut self) -> &mut IndexCard {
        &mut self.index_card
    }

    pub fn prefs(&self) -> &ManagerPrefs {
        self.prefs.data()
    }

    /// Rendered rows of the display mirror, in tree order.
    pub fn rows(&self) -> Vec<TreeRow> {
        self.mirror.borrow().rows()
    }

    /// Open a collection file, closing any current collection first.
    /// Returns true on success.
    pub fn open_collection(&mut self, path: &Path) -> bool {
        self.apply_changes();
        self.status.restore();
        if self.collection.is_some() {
            self.close_collection();
        }
        let mut collection = match Collection::new(path) {
            Ok(collection) => collection,
            Err(err) => {
                self.status.set(&format!("!{err}"));
                return false;
            }
        };
        self.remember_last_open(path);
        self.attach_mirror(&mut collection);
        match collection.read() {
            Ok(message) => {
                self.collection = Some(collection);
                self.status.show(&message);
                true
            }
            Err(err) => {
                self.mirror.borrow_mut().clear();
                self.status.set(&format!("!{err}"));
                false
            }
        }
    }

    /// Reopen the collection recorded as last open, if any.
    pub fn open_last_collection(&mut self) -> bool {
        match self.prefs.data().last_open.clone() {
            Some(path) => self.open_collection(&path),
            None => false,
        }
    }

    /// Create a fresh, empty collection bound to the given path.
    pub fn new_collection(&mut self, path: &Path) -> bool {
        self.apply_changes();
        if self.collection.is_some() {
            self.close_collection();
        }
        let mut collection = match Collection::new(path) {
            Ok(collection) => collection,
            Err(err) => {
                self.status.set(&format!("!{err}"));
                return false;
            }
        };
        self.remember_last_open(path);
        self.attach_mirror(&mut collection);
        self.collection = Some(collection);
        self.status.show(&path.display().to_string());
        true
    }

    /// Close the collection, offering to save unsaved changes first.
    pub fn close_collection(&mut self) {
        if self
            .collection
            .as_ref()
            .is_some_and(Collection::is_modified)
            && self.host.confirm("Save changes?")
        {
            self.save_collection();
        }
        self.apply_changes();
        self.index_card.clear();
        self.current = None;
        if let Some(collection) = self.collection.as_mut() {
            collection.reset_tree();
        }
        self.collection = None;
        self.status.show("");
    }

    /// Write the collection when it has unsaved changes.
    pub fn save_collection(&mut self) {
        self.apply_changes();
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        if collection.is_modified() {
            if let Err(err) = collection.write() {
                let message = err.to_string();
                self.host.notify_error(&message);
                return;
            }
        }
        self.status.set("Collection saved.");
    }

    /// Persist the window layout and offer a final save on shutdown.
    pub fn quit(&mut self, tree_width: u32, window_size: WindowSize) {
        self.apply_changes();
        let result = self.prefs.update(|prefs| {
            prefs.tree_width = tree_width;
            prefs.window_size = window_size.clone();
        });
        if let Err(err) = result {
            self.host.notify_error(&err.to_string());
        }
        if self
            .collection
            .as_ref()
            .is_some_and(Collection::is_modified)
            && self.host.confirm("Save changes?")
        {
            self.save_collection();
        }
    }

    /// Select a node and load its record into the index card. Pending
    /// edits for the previous node are applied first.
    pub fn select_node(&mut self, id: &NodeId) {
        self.apply_changes();
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        if collection.select(Some(id)).is_err() {
            return;
        }
        self.current = Some(id.clone());
        self.load_card();
    }

    /// Flush index-card edits into the engine.
    pub fn apply_changes(&mut self) {
        let Some(id) = self.current.clone() else {
            return;
        };
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        let stored_title = match id.kind() {
            Some(NodeKind::Book) => collection.book(&id).map(|book| book.title.clone()),
            Some(NodeKind::Series) => collection.series(&id).map(|series| series.title.clone()),
            None => None,
        };
        let Some(stored_title) = stored_title else {
            return;
        };
        let title = self.index_card.title.trim().to_string();
        // an emptied title only counts when there was one before
        if !title.is_empty() || !stored_title.is_empty() {
            if let Err(err) = collection.set_title(&id, &title) {
                self.status.set(&format!("!{err}"));
            }
        }
        if self.index_card.desc_changed {
            if let Err(err) = collection.set_description(&id, &self.index_card.desc) {
                self.status.set(&format!("!{err}"));
            }
            self.index_card.desc_changed = false;
        }
    }

    /// Add the host's current project as a book. Placement follows the
    /// selection: after a selected book, inside a selected series, or
    /// first at the top level.
    pub fn add_current_project(&mut self) {
        self.apply_changes();
        let Some(project) = self.host.current_project() else {
            return;
        };
        if project.title.is_empty() {
            self.status.set("!This project has no title.");
            return;
        }
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        let (parent, position) = match collection.tree().selection().cloned() {
            Some(selected) => match selected.kind() {
                Some(NodeKind::Book) => {
                    let parent = collection.tree().parent(&selected).cloned();
                    let index = collection
                        .tree()
                        .index(&selected)
                        .map(|index| index + 1)
                        .unwrap_or(0);
                    (parent, NodePosition::At(index))
                }
                Some(NodeKind::Series) => (Some(selected), NodePosition::End),
                None => (None, NodePosition::At(0)),
            },
            None => (None, NodePosition::At(0)),
        };
        match collection.add_book(&project, parent.as_ref(), position) {
            Ok(Some(_)) => self.status.set(&format!(
                "Book added to the collection: \"{}\".",
                project.title
            )),
            Ok(None) => self
                .status
                .set(&format!("!Book already exists: \"{}\".", project.title)),
            Err(err) => self.status.set(&format!("!{err}")),
        }
    }

    /// Create a series named "New Series", first at the top level or
    /// right after a selected series.
    pub fn add_series(&mut self) {
        self.apply_changes();
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        let index = match collection.tree().selection() {
            Some(selected) if selected.kind() == Some(NodeKind::Series) => collection
                .tree()
                .index(selected)
                .map(|index| index + 1)
                .unwrap_or(0),
            _ => 0,
        };
        if let Err(err) = collection.add_series("New Series", NodePosition::At(index)) {
            self.status.set(&format!("!{err}"));
        }
    }

    /// Remove the selected node, dispatching on its kind.
    pub fn remove_node(&mut self) {
        let Some(selected) = self.selected_id() else {
            return;
        };
        match selected.kind() {
            Some(NodeKind::Book) => self.remove_book(),
            Some(NodeKind::Series) => self.remove_series(),
            None => {}
        }
    }

    /// Remove the selected book after confirmation.
    pub fn remove_book(&mut self) {
        self.apply_changes();
        let Some(selected) = self.selected_id() else {
            return;
        };
        if selected.kind() != Some(NodeKind::Book) {
            return;
        }
        if !self
            .host
            .confirm("Remove selected book from the collection?")
        {
            return;
        }
        self.step_selection_back(&selected);
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        match collection.remove_book(&selected) {
            Ok(message) => {
                self.status.set(&message);
                self.load_card();
            }
            Err(err) => self.status.set(&format!("!{err}")),
        }
    }

    /// Remove the selected series; its books stay in the collection.
    pub fn remove_series(&mut self) {
        self.remove_selected_series("Remove selected series but keep the books?", false);
    }

    /// Remove the selected series together with all of its books.
    pub fn remove_series_with_books(&mut self) {
        self.remove_selected_series("Remove selected series and books?", true);
    }

    fn remove_selected_series(&mut self, prompt: &str, with_books: bool) {
        self.apply_changes();
        let Some(selected) = self.selected_id() else {
            return;
        };
        if selected.kind() != Some(NodeKind::Series) {
            return;
        }
        if !self.host.confirm(prompt) {
            return;
        }
        self.step_selection_back(&selected);
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        let result = if with_books {
            collection.remove_series_with_books(&selected)
        } else {
            collection.remove_series(&selected)
        };
        match result {
            Ok(message) => {
                self.status.set(&message);
                self.load_card();
            }
            Err(err) => self.status.set(&format!("!{err}")),
        }
    }

    /// Drag-and-drop placement. Same category: the dragged node becomes
    /// a sibling at the target's position. Book onto series: appended as
    /// the last member, or as the first one when the series is empty.
    /// Every other combination is a no-op.
    pub fn move_node(&mut self, dragged: &NodeId, target: &NodeId) {
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        if !collection.tree().contains(dragged) || !collection.tree().contains(target) {
            return;
        }
        let result = match (dragged.kind(), target.kind()) {
            (Some(dragged_kind), Some(target_kind)) if dragged_kind == target_kind => {
                let parent = collection.tree().parent(target).cloned();
                let index = collection.tree().index(target).unwrap_or(0);
                collection.move_node(dragged, parent.as_ref(), NodePosition::At(index))
            }
            (Some(NodeKind::Book), Some(NodeKind::Series)) => {
                let position = if collection.tree().children(Some(target)).is_empty() {
                    NodePosition::At(0)
                } else {
                    NodePosition::End
                };
                collection.move_node(dragged, Some(target), position)
            }
            _ => return,
        };
        if let Err(err) = result {
            self.status.set(&format!("!{err}"));
        }
    }

    /// Ask the host to open the selected book's project file.
    pub fn open_book(&mut self) {
        self.apply_changes();
        let path = {
            let Some(collection) = self.collection.as_ref() else {
                return;
            };
            let Some(selected) = collection.tree().selection() else {
                return;
            };
            match collection.book(selected) {
                Some(book) => book.file_path().to_path_buf(),
                None => return,
            }
        };
        self.host.open_project(&path);
    }

    /// Pull metadata from the host's current project into the selected
    /// book, when both point at the same project file.
    pub fn update_collection(&mut self) {
        self.apply_changes();
        let Some(project) = self.host.current_project() else {
            return;
        };
        let Some(id) = self.current.clone() else {
            return;
        };
        self.host.refresh_view();
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        let same_project = collection
            .book(&id)
            .is_some_and(|book| Some(book.file_path()) == project.file_path.as_deref());
        if !same_project {
            return;
        }
        match collection.update_book_from(&id, &project) {
            Ok(true) => self.load_card(),
            Ok(false) => {}
            Err(err) => self.status.set(&format!("!{err}")),
        }
    }

    /// Push the selected book's metadata into the host's current
    /// project, when both point at the same project file.
    pub fn update_project(&mut self) {
        self.apply_changes();
        let Some(project) = self.host.current_project() else {
            return;
        };
        let Some(project_path) = project.file_path else {
            return;
        };
        let Some(id) = self.current.clone() else {
            return;
        };
        let (title, desc) = {
            let Some(collection) = self.collection.as_ref() else {
                return;
            };
            match collection.book(&id) {
                Some(book) if book.file_path() == project_path => {
                    (book.title.clone(), book.desc.clone())
                }
                _ => return,
            }
        };
        self.host.push_project_metadata(&project_path, &title, &desc);
    }

    fn selected_id(&self) -> Option<NodeId> {
        self.collection
            .as_ref()
            .and_then(|collection| collection.tree().selection().cloned())
    }

    /// Move the selection to the previous sibling, else to the parent,
    /// before the node at `id` disappears.
    fn step_selection_back(&mut self, id: &NodeId) {
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        let next = collection
            .tree()
            .prev_sibling(id)
            .or_else(|| collection.tree().parent(id))
            .cloned();
        let _ = collection.select(next.as_ref());
        self.current = next;
    }

    fn load_card(&mut self) {
        let Some(collection) = self.collection.as_ref() else {
            return;
        };
        let Some(id) = self.current.clone() else {
            self.index_card.clear();
            return;
        };
        match id.kind() {
            Some(NodeKind::Book) => {
                if let Some(book) = collection.book(&id) {
                    self.index_card.load(&book.title, &book.desc);
                }
            }
            Some(NodeKind::Series) => {
                if let Some(series) = collection.series(&id) {
                    self.index_card.load(&series.title, &series.desc);
                }
            }
            None => {}
        }
    }

    fn attach_mirror(&mut self, collection: &mut Collection) {
        self.mirror.borrow_mut().clear();
        let sink = Rc::clone(&self.mirror);
        collection.observe_tree(move |change| sink.borrow_mut().apply(change));
    }

    fn remember_last_open(&mut self, path: &Path) {
        let result = self.prefs.update(|prefs| {
            prefs.last_open = Some(path.to_path_buf());
        });
        if let Err(err) = result {
            self.host.notify_error(&err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_splits_the_error_marker() {
        let mut status = StatusLine::default();
        status.show("3 Books found.");
        status.set("!Book already exists: \"Alpha\".");
        assert!(status.is_error());
        assert_eq!(status.text(), "Book already exists: \"Alpha\".");

        status.restore();
        assert!(!status.is_error());
        assert_eq!(status.text(), "3 Books found.");
    }

    #[test]
    fn index_card_tracks_description_edits_only() {
        let mut card = IndexCard::default();
        card.load("Alpha", "First volume.");
        assert!(!card.desc_changed);

        card.edit_title("Alpha II");
        assert!(!card.desc_changed);
        card.edit_description("Second volume.");
        assert!(card.desc_changed);

        card.clear();
        assert_eq!(card.title(), "");
        assert_eq!(card.desc(), "");
        assert!(!card.desc_changed);
    }
}
