use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use novelshelf_collection::{NodeId, NodeKind, ProjectInfo};
use novelshelf_manager::{CollectionManager, HostBridge, WindowSize, PREFS_FILE_NAME};
use tempfile::TempDir;

/// 測試用的宿主替身，以腳本控制回答並記錄所有呼叫。 /
/// Scripted host double: answers are preset, every call is recorded.
#[derive(Default)]
struct HostLog {
    confirmations: Vec<String>,
    errors: Vec<String>,
    opened: Vec<PathBuf>,
    pushed: Vec<(PathBuf, String, String)>,
    refreshes: usize,
}

struct ScriptedHost {
    project: Rc<RefCell<Option<ProjectInfo>>>,
    confirm_answer: Rc<RefCell<bool>>,
    prefs_dir: PathBuf,
    log: Rc<RefCell<HostLog>>,
}

impl HostBridge for ScriptedHost {
    fn current_project(&self) -> Option<ProjectInfo> {
        self.project.borrow().clone()
    }

    fn open_project(&mut self, path: &Path) {
        self.log.borrow_mut().opened.push(path.to_path_buf());
    }

    fn push_project_metadata(&mut self, path: &Path, title: &str, desc: &str) -> bool {
        self.log
            .borrow_mut()
            .pushed
            .push((path.to_path_buf(), title.to_string(), desc.to_string()));
        true
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.log.borrow_mut().confirmations.push(message.to_string());
        *self.confirm_answer.borrow()
    }

    fn notify_error(&mut self, message: &str) {
        self.log.borrow_mut().errors.push(message.to_string());
    }

    fn refresh_view(&mut self) {
        self.log.borrow_mut().refreshes += 1;
    }

    fn preferences_dir(&self) -> PathBuf {
        self.prefs_dir.clone()
    }
}

struct Fixture {
    dir: TempDir,
    manager: CollectionManager<ScriptedHost>,
    project: Rc<RefCell<Option<ProjectInfo>>>,
    confirm_answer: Rc<RefCell<bool>>,
    log: Rc<RefCell<HostLog>>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = Rc::new(RefCell::new(None));
        let confirm_answer = Rc::new(RefCell::new(true));
        let log = Rc::new(RefCell::new(HostLog::default()));
        let host = ScriptedHost {
            project: Rc::clone(&project),
            confirm_answer: Rc::clone(&confirm_answer),
            prefs_dir: dir.path().join("config"),
            log: Rc::clone(&log),
        };
        let manager = CollectionManager::new(host).expect("manager");
        Self {
            dir,
            manager,
            project,
            confirm_answer,
            log,
        }
    }

    fn collection_path(&self) -> PathBuf {
        self.dir.path().join("shelf.nvcx")
    }

    /// Write a dummy project file and point the host's current project
    /// at it.
    fn host_project(&self, name: &str, title: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, "novel data").expect("write project");
        *self.project.borrow_mut() = Some(ProjectInfo {
            file_path: Some(path.clone()),
            title: title.to_string(),
            desc: String::new(),
        });
        path
    }

    fn top_level(&self) -> Vec<String> {
        self.manager
            .collection()
            .expect("collection")
            .tree()
            .children(None)
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    fn members(&self, series: &NodeId) -> Vec<String> {
        self.manager
            .collection()
            .expect("collection")
            .tree()
            .children(Some(series))
            .iter()
            .map(|id| id.to_string())
            .collect()
    }
}

fn id(raw: &str) -> NodeId {
    NodeId::new(raw)
}

#[test]
fn add_current_project_places_books_by_selection() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));

    // nothing selected: first at the top level
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    assert_eq!(fx.manager.status().text(), "Book added to the collection: \"Alpha\".");
    assert_eq!(fx.top_level(), ["bk1"]);

    // a selected series takes the new book as its last member
    fx.manager.add_series();
    fx.manager.select_node(&id("sr1"));
    fx.host_project("beta.novx", "Beta");
    fx.manager.add_current_project();
    assert_eq!(fx.members(&id("sr1")), ["bk2"]);

    // a selected book gets the new one as its next sibling
    fx.manager.select_node(&id("bk1"));
    fx.host_project("gamma.novx", "Gamma");
    fx.manager.add_current_project();
    assert_eq!(fx.top_level(), ["sr1", "bk1", "bk3"]);
}

#[test]
fn add_current_project_guards_title_and_duplicates() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));

    fx.host_project("untitled.novx", "");
    fx.manager.add_current_project();
    assert!(fx.manager.status().is_error());
    assert_eq!(fx.manager.status().text(), "This project has no title.");

    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.manager.add_current_project();
    assert!(fx.manager.status().is_error());
    assert_eq!(fx.manager.status().text(), "Book already exists: \"Alpha\".");
    assert_eq!(fx.manager.collection().expect("collection").book_count(), 1);
}

#[test]
fn remove_book_needs_confirmation_and_steps_the_selection_back() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    fx.manager.add_series();
    fx.manager.select_node(&id("sr1"));
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.host_project("beta.novx", "Beta");
    fx.manager.add_current_project();
    assert_eq!(fx.members(&id("sr1")), ["bk1", "bk2"]);

    // declined: nothing happens
    *fx.confirm_answer.borrow_mut() = false;
    fx.manager.select_node(&id("bk2"));
    fx.manager.remove_book();
    assert_eq!(
        fx.log.borrow().confirmations.last().map(String::as_str),
        Some("Remove selected book from the collection?")
    );
    assert_eq!(fx.manager.collection().expect("collection").book_count(), 2);

    // accepted: the previous sibling inherits the selection
    *fx.confirm_answer.borrow_mut() = true;
    fx.manager.remove_book();
    assert_eq!(fx.manager.status().text(), "Book removed from the collection: \"Beta\".");
    let collection = fx.manager.collection().expect("collection");
    assert_eq!(collection.tree().selection(), Some(&id("bk1")));

    // the last member falls back to the parent series
    fx.manager.remove_book();
    let collection = fx.manager.collection().expect("collection");
    assert_eq!(collection.tree().selection(), Some(&id("sr1")));
    assert_eq!(collection.book_count(), 0);
}

#[test]
fn series_removal_keeps_or_drops_the_books() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    fx.manager.add_series();
    fx.manager.select_node(&id("sr1"));
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();

    fx.manager.select_node(&id("sr1"));
    fx.manager.remove_series();
    assert_eq!(
        fx.log.borrow().confirmations.last().map(String::as_str),
        Some("Remove selected series but keep the books?")
    );
    assert_eq!(fx.top_level(), ["bk1"]);
    assert_eq!(fx.manager.collection().expect("collection").book_count(), 1);

    // the freed series id is handed out again
    fx.manager.add_series();
    fx.manager.move_node(&id("bk1"), &id("sr1"));
    fx.manager.select_node(&id("sr1"));
    fx.manager.remove_series_with_books();
    assert_eq!(
        fx.log.borrow().confirmations.last().map(String::as_str),
        Some("Remove selected series and books?")
    );
    let collection = fx.manager.collection().expect("collection");
    assert_eq!(collection.book_count(), 0);
    assert!(collection.tree().is_empty());
}

#[test]
fn drag_rules_cover_sibling_member_and_no_op_cases() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.host_project("beta.novx", "Beta");
    fx.manager.add_current_project();
    fx.manager.add_series();
    // unselected adds go first, so the latest addition leads
    assert_eq!(fx.top_level(), ["sr1", "bk2", "bk1"]);

    // book onto an empty series: first member
    fx.manager.move_node(&id("bk2"), &id("sr1"));
    assert_eq!(fx.members(&id("sr1")), ["bk2"]);

    // book onto a filled series: appended after the members
    fx.manager.move_node(&id("bk1"), &id("sr1"));
    assert_eq!(fx.members(&id("sr1")), ["bk2", "bk1"]);

    // same category: sibling at the target's position
    fx.manager.move_node(&id("bk1"), &id("bk2"));
    assert_eq!(fx.members(&id("sr1")), ["bk1", "bk2"]);

    // series onto a book: no-op
    fx.manager.move_node(&id("sr1"), &id("bk1"));
    assert_eq!(fx.top_level(), ["sr1"]);
    assert_eq!(fx.members(&id("sr1")), ["bk1", "bk2"]);
}

#[test]
fn close_collection_offers_to_save_unsaved_changes() {
    let mut fx = Fixture::new();
    let path = fx.collection_path();
    assert!(fx.manager.new_collection(&path));
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    assert!(!path.exists());

    fx.manager.close_collection();
    assert_eq!(
        fx.log.borrow().confirmations.last().map(String::as_str),
        Some("Save changes?")
    );
    assert!(!fx.manager.is_open());
    assert!(path.exists());
    assert_eq!(fx.manager.status().text(), "");
}

#[test]
fn open_collection_round_trips_and_fills_the_mirror() {
    let mut fx = Fixture::new();
    let path = fx.collection_path();
    assert!(fx.manager.new_collection(&path));
    fx.manager.add_series();
    fx.manager.select_node(&id("sr1"));
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.manager.save_collection();
    assert_eq!(fx.manager.status().text(), "Collection saved.");
    fx.manager.close_collection();

    assert!(fx.manager.open_collection(&path));
    assert_eq!(
        fx.manager.status().text(),
        format!("1 Books found in \"{}\".", path.display())
    );
    let rows = fx.manager.rows();
    let listing: Vec<(&str, usize)> = rows
        .iter()
        .map(|row| (row.label.as_str(), row.level))
        .collect();
    assert_eq!(listing, [("New Series", 0), ("Alpha", 1)]);
    assert_eq!(rows[1].kind, Some(NodeKind::Book));

    // the opened path is recorded for the next session
    assert_eq!(fx.manager.prefs().last_open.as_deref(), Some(path.as_path()));
    assert!(fx.dir.path().join("config").join(PREFS_FILE_NAME).exists());
}

#[test]
fn open_collection_reports_incompatible_files_and_stays_closed() {
    let mut fx = Fixture::new();
    let path = fx.collection_path();
    fs::write(&path, "<COLLECTION version=\"2.0\"/>\n").expect("write file");

    assert!(!fx.manager.open_collection(&path));
    assert!(fx.manager.status().is_error());
    assert_eq!(
        fx.manager.status().text(),
        "The collection was created with a newer plugin version."
    );
    assert!(!fx.manager.is_open());
    assert!(fx.manager.rows().is_empty());
}

#[test]
fn index_card_edits_reach_the_engine_on_apply() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();

    fx.manager.select_node(&id("bk1"));
    fx.manager.index_card_mut().edit_title("  Alpha, revised ");
    fx.manager.index_card_mut().edit_description("Now with a blurb.");
    fx.manager.apply_changes();

    let collection = fx.manager.collection().expect("collection");
    let book = collection.book(&id("bk1")).expect("book");
    assert_eq!(book.title, "Alpha, revised");
    assert_eq!(book.desc, "Now with a blurb.");
    assert_eq!(collection.tree().label(&id("bk1")), Some("Alpha, revised"));
}

#[test]
fn update_project_pushes_metadata_for_the_matching_book_only() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    let alpha = fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.manager.select_node(&id("bk1"));
    fx.manager.index_card_mut().edit_description("Revised blurb.");

    fx.manager.update_project();
    assert_eq!(
        fx.log.borrow().pushed.as_slice(),
        [(alpha.clone(), "Alpha".to_string(), "Revised blurb.".to_string())]
    );

    // a different current project leaves the host untouched
    fx.host_project("beta.novx", "Beta");
    fx.manager.update_project();
    assert_eq!(fx.log.borrow().pushed.len(), 1);
}

#[test]
fn update_collection_pulls_metadata_into_the_selected_book() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    let alpha = fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.manager.select_node(&id("bk1"));

    *fx.project.borrow_mut() = Some(ProjectInfo {
        file_path: Some(alpha),
        title: "Alpha, second edition".to_string(),
        desc: "Expanded.".to_string(),
    });
    fx.manager.update_collection();

    assert_eq!(fx.log.borrow().refreshes, 1);
    let collection = fx.manager.collection().expect("collection");
    let book = collection.book(&id("bk1")).expect("book");
    assert_eq!(book.title, "Alpha, second edition");
    assert_eq!(book.desc, "Expanded.");
    assert_eq!(fx.manager.index_card().title(), "Alpha, second edition");
}

#[test]
fn open_book_hands_the_project_path_to_the_host() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    let alpha = fx.host_project("alpha.novx", "Alpha");
    fx.manager.add_current_project();
    fx.manager.select_node(&id("bk1"));

    fx.manager.open_book();
    assert_eq!(fx.log.borrow().opened.as_slice(), [alpha]);
}

#[test]
fn quit_persists_the_window_layout() {
    let mut fx = Fixture::new();
    assert!(fx.manager.new_collection(&fx.collection_path()));
    fx.manager.quit(
        320,
        WindowSize {
            width: 900,
            height: 480,
        },
    );
    assert_eq!(fx.manager.prefs().tree_width, 320);
    assert_eq!(fx.manager.prefs().window_size.width, 900);
}
