//! Ordered forest of collection nodes.
//! 收藏節點的有序樹。
//!
//! The tree owns ordering, parenthood, display labels, and at most one
//! selected node. Structural changes are forwarded to an optional
//! observer so a display layer can mirror the tree one to one without
//! reaching back into it.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::ids::NodeId;

/// Where a node lands in its parent's child list.
/// 節點在父節點子清單中的落點。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePosition {
    /// Insert at the given index; indexes past the end are clamped.
    At(usize),
    /// Append after the existing children.
    End,
}

impl NodePosition {
    fn resolve(self, len: usize) -> usize {
        match self {
            NodePosition::At(index) => index.min(len),
            NodePosition::End => len,
        }
    }
}

/// Structural change notification sent to the registered observer.
///
/// A `Removed` event stands for the node's whole subtree; descendants
/// get no events of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    Inserted {
        id: NodeId,
        parent: Option<NodeId>,
        index: usize,
        label: String,
    },
    Removed {
        id: NodeId,
    },
    Moved {
        id: NodeId,
        parent: Option<NodeId>,
        index: usize,
    },
    Relabeled {
        id: NodeId,
        label: String,
    },
    Cleared,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// 節點不存在。
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// 節點已存在。
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),
    /// 節點不可移入自己的子樹。
    #[error("node {0} cannot be moved below itself")]
    MoveBelowSelf(NodeId),
}

struct NodeEntry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    label: String,
}

/// Ordered forest of book and series nodes.
/// 書籍與系列節點的有序樹。
pub struct CollectionTree {
    nodes: HashMap<NodeId, NodeEntry>,
    roots: Vec<NodeId>,
    selection: Option<NodeId>,
    observer: Option<Box<dyn FnMut(&TreeChange)>>,
}

impl CollectionTree {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            selection: None,
            observer: None,
        }
    }

    /// Register a callback receiving every structural change, replacing
    /// any previous observer.
    pub fn set_observer(&mut self, observer: impl FnMut(&TreeChange) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Insert a new node under `parent` (`None` for the top level).
    pub fn insert(
        &mut self,
        parent: Option<&NodeId>,
        position: NodePosition,
        id: NodeId,
        label: impl Into<String>,
    ) -> Result<(), TreeError> {
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateNode(id));
        }
        let label = label.into();
        let index = {
            let siblings = match parent {
                Some(parent_id) => match self.nodes.get_mut(parent_id) {
                    Some(entry) => &mut entry.children,
                    None => return Err(TreeError::NodeNotFound(parent_id.clone())),
                },
                None => &mut self.roots,
            };
            let index = position.resolve(siblings.len());
            siblings.insert(index, id.clone());
            index
        };
        self.nodes.insert(
            id.clone(),
            NodeEntry {
                parent: parent.cloned(),
                children: Vec::new(),
                label: label.clone(),
            },
        );
        self.notify(TreeChange::Inserted {
            id,
            parent: parent.cloned(),
            index,
            label,
        });
        Ok(())
    }

    /// Remove a node together with all of its descendants. A selection
    /// pointing into the removed subtree is cleared.
    pub fn remove(&mut self, id: &NodeId) -> Result<(), TreeError> {
        let parent = match self.nodes.get(id) {
            Some(entry) => entry.parent.clone(),
            None => return Err(TreeError::NodeNotFound(id.clone())),
        };
        match &parent {
            Some(parent_id) => {
                if let Some(entry) = self.nodes.get_mut(parent_id) {
                    entry.children.retain(|child| child != id);
                }
            }
            None => self.roots.retain(|child| child != id),
        }
        self.delete_subtree(id);
        if self
            .selection
            .as_ref()
            .is_some_and(|selected| !self.nodes.contains_key(selected))
        {
            self.selection = None;
        }
        self.notify(TreeChange::Removed { id: id.clone() });
        Ok(())
    }

    /// Move a node to a new parent and position.
    ///
    /// The index is resolved after the node has left its old slot, which
    /// is what a drag within one parent expects.
    pub fn move_node(
        &mut self,
        id: &NodeId,
        parent: Option<&NodeId>,
        position: NodePosition,
    ) -> Result<(), TreeError> {
        let old_parent = match self.nodes.get(id) {
            Some(entry) => entry.parent.clone(),
            None => return Err(TreeError::NodeNotFound(id.clone())),
        };
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(TreeError::NodeNotFound(parent_id.clone()));
            }
            if parent_id == id || self.is_below(parent_id, id) {
                return Err(TreeError::MoveBelowSelf(id.clone()));
            }
        }
        match &old_parent {
            Some(old_id) => {
                if let Some(entry) = self.nodes.get_mut(old_id) {
                    entry.children.retain(|child| child != id);
                }
            }
            None => self.roots.retain(|child| child != id),
        }
        let index = {
            let siblings = match parent {
                Some(parent_id) => match self.nodes.get_mut(parent_id) {
                    Some(entry) => &mut entry.children,
                    None => return Err(TreeError::NodeNotFound(parent_id.clone())),
                },
                None => &mut self.roots,
            };
            let index = position.resolve(siblings.len());
            siblings.insert(index, id.clone());
            index
        };
        if let Some(entry) = self.nodes.get_mut(id) {
            entry.parent = parent.cloned();
        }
        self.notify(TreeChange::Moved {
            id: id.clone(),
            parent: parent.cloned(),
            index,
        });
        Ok(())
    }

    /// Change a node's display label.
    pub fn set_label(&mut self, id: &NodeId, label: impl Into<String>) -> Result<(), TreeError> {
        let label = label.into();
        match self.nodes.get_mut(id) {
            Some(entry) => entry.label = label.clone(),
            None => return Err(TreeError::NodeNotFound(id.clone())),
        }
        self.notify(TreeChange::Relabeled {
            id: id.clone(),
            label,
        });
        Ok(())
    }

    /// Drop every node and the selection.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.selection = None;
        self.notify(TreeChange::Cleared);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Children of the given parent in order, `None` meaning the top
    /// level. Unknown parents yield an empty slice.
    pub fn children(&self, parent: Option<&NodeId>) -> &[NodeId] {
        match parent {
            Some(parent_id) => self
                .nodes
                .get(parent_id)
                .map(|entry| entry.children.as_slice())
                .unwrap_or(&[]),
            None => &self.roots,
        }
    }

    /// Parent of the node; `None` for top-level or unknown nodes.
    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|entry| entry.parent.as_ref())
    }

    /// Position of the node among its siblings.
    pub fn index(&self, id: &NodeId) -> Option<usize> {
        let entry = self.nodes.get(id)?;
        let siblings = self.children(entry.parent.as_ref());
        siblings.iter().position(|sibling| sibling == id)
    }

    /// The sibling directly before the node, if any.
    pub fn prev_sibling(&self, id: &NodeId) -> Option<&NodeId> {
        let entry = self.nodes.get(id)?;
        let siblings = self.children(entry.parent.as_ref());
        let index = siblings.iter().position(|sibling| sibling == id)?;
        index.checked_sub(1).map(|prev| &siblings[prev])
    }

    pub fn label(&self, id: &NodeId) -> Option<&str> {
        self.nodes.get(id).map(|entry| entry.label.as_str())
    }

    /// Select a node, or pass `None` to clear the selection.
    pub fn select(&mut self, id: Option<&NodeId>) -> Result<(), TreeError> {
        if let Some(target) = id {
            if !self.nodes.contains_key(target) {
                return Err(TreeError::NodeNotFound(target.clone()));
            }
        }
        self.selection = id.cloned();
        Ok(())
    }

    pub fn selection(&self) -> Option<&NodeId> {
        self.selection.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn delete_subtree(&mut self, id: &NodeId) {
        if let Some(entry) = self.nodes.remove(id) {
            for child in entry.children {
                self.delete_subtree(&child);
            }
        }
    }

    fn is_below(&self, candidate: &NodeId, ancestor: &NodeId) -> bool {
        let mut cursor = self.nodes.get(candidate).and_then(|entry| entry.parent.as_ref());
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|entry| entry.parent.as_ref());
        }
        false
    }

    fn notify(&mut self, change: TreeChange) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&change);
        }
    }
}

impl Default for CollectionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CollectionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionTree")
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("selection", &self.selection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn id(raw: &str) -> NodeId {
        NodeId::new(raw)
    }

    fn sample_tree() -> CollectionTree {
        let mut tree = CollectionTree::new();
        tree.insert(None, NodePosition::End, id("sr1"), "Trilogy").unwrap();
        tree.insert(Some(&id("sr1")), NodePosition::End, id("bk1"), "Alpha")
            .unwrap();
        tree.insert(Some(&id("sr1")), NodePosition::End, id("bk2"), "Beta")
            .unwrap();
        tree.insert(None, NodePosition::End, id("bk3"), "Gamma").unwrap();
        tree
    }

    #[test]
    fn insert_orders_children_by_position() {
        let mut tree = CollectionTree::new();
        tree.insert(None, NodePosition::End, id("bk1"), "one").unwrap();
        tree.insert(None, NodePosition::At(0), id("bk2"), "two").unwrap();
        tree.insert(None, NodePosition::At(99), id("bk3"), "three").unwrap();
        let order: Vec<&str> = tree.children(None).iter().map(NodeId::as_str).collect();
        assert_eq!(order, ["bk2", "bk1", "bk3"]);
    }

    #[test]
    fn insert_rejects_duplicates_and_unknown_parents() {
        let mut tree = sample_tree();
        assert_eq!(
            tree.insert(None, NodePosition::End, id("bk1"), "again"),
            Err(TreeError::DuplicateNode(id("bk1")))
        );
        assert_eq!(
            tree.insert(Some(&id("sr9")), NodePosition::End, id("bk9"), "lost"),
            Err(TreeError::NodeNotFound(id("sr9")))
        );
    }

    #[test]
    fn remove_deletes_the_subtree() {
        let mut tree = sample_tree();
        tree.select(Some(&id("bk2"))).unwrap();
        tree.remove(&id("sr1")).unwrap();
        assert!(!tree.contains(&id("sr1")));
        assert!(!tree.contains(&id("bk1")));
        assert!(!tree.contains(&id("bk2")));
        assert!(tree.contains(&id("bk3")));
        assert_eq!(tree.selection(), None);
    }

    #[test]
    fn move_within_one_parent_uses_the_post_removal_index() {
        let mut tree = CollectionTree::new();
        tree.insert(None, NodePosition::End, id("bk1"), "a").unwrap();
        tree.insert(None, NodePosition::End, id("bk2"), "b").unwrap();
        tree.insert(None, NodePosition::End, id("bk3"), "c").unwrap();
        tree.move_node(&id("bk1"), None, NodePosition::At(1)).unwrap();
        let order: Vec<&str> = tree.children(None).iter().map(NodeId::as_str).collect();
        assert_eq!(order, ["bk2", "bk1", "bk3"]);
    }

    #[test]
    fn move_into_a_series_and_back_out() {
        let mut tree = sample_tree();
        tree.move_node(&id("bk3"), Some(&id("sr1")), NodePosition::End).unwrap();
        assert_eq!(tree.parent(&id("bk3")), Some(&id("sr1")));
        assert_eq!(tree.index(&id("bk3")), Some(2));
        tree.move_node(&id("bk3"), None, NodePosition::At(0)).unwrap();
        assert_eq!(tree.parent(&id("bk3")), None);
        assert_eq!(tree.index(&id("bk3")), Some(0));
    }

    #[test]
    fn move_below_own_subtree_is_rejected() {
        let mut tree = sample_tree();
        assert_eq!(
            tree.move_node(&id("sr1"), Some(&id("bk1")), NodePosition::End),
            Err(TreeError::MoveBelowSelf(id("sr1")))
        );
        assert_eq!(
            tree.move_node(&id("sr1"), Some(&id("sr1")), NodePosition::End),
            Err(TreeError::MoveBelowSelf(id("sr1")))
        );
    }

    #[test]
    fn prev_sibling_and_parent_queries() {
        let tree = sample_tree();
        assert_eq!(tree.prev_sibling(&id("bk2")), Some(&id("bk1")));
        assert_eq!(tree.prev_sibling(&id("bk1")), None);
        assert_eq!(tree.parent(&id("bk1")), Some(&id("sr1")));
        assert_eq!(tree.parent(&id("sr1")), None);
        assert_eq!(tree.index(&id("bk3")), Some(1));
    }

    #[test]
    fn selecting_an_unknown_node_fails() {
        let mut tree = sample_tree();
        assert_eq!(
            tree.select(Some(&id("bk9"))),
            Err(TreeError::NodeNotFound(id("bk9")))
        );
        tree.select(Some(&id("bk1"))).unwrap();
        tree.select(None).unwrap();
        assert_eq!(tree.selection(), None);
    }

    #[test]
    fn observer_sees_every_structural_change() {
        let seen: Rc<RefCell<Vec<TreeChange>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut tree = CollectionTree::new();
        tree.set_observer(move |change| sink.borrow_mut().push(change.clone()));

        tree.insert(None, NodePosition::End, id("sr1"), "Trilogy").unwrap();
        tree.insert(Some(&id("sr1")), NodePosition::End, id("bk1"), "Alpha")
            .unwrap();
        tree.set_label(&id("bk1"), "Alpha II").unwrap();
        tree.move_node(&id("bk1"), None, NodePosition::At(0)).unwrap();
        tree.remove(&id("sr1")).unwrap();
        tree.clear();

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                TreeChange::Inserted {
                    id: id("sr1"),
                    parent: None,
                    index: 0,
                    label: "Trilogy".to_string(),
                },
                TreeChange::Inserted {
                    id: id("bk1"),
                    parent: Some(id("sr1")),
                    index: 0,
                    label: "Alpha".to_string(),
                },
                TreeChange::Relabeled {
                    id: id("bk1"),
                    label: "Alpha II".to_string(),
                },
                TreeChange::Moved {
                    id: id("bk1"),
                    parent: None,
                    index: 0,
                },
                TreeChange::Removed { id: id("sr1") },
                TreeChange::Cleared,
            ]
        );
    }
}
