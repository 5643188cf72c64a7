//! Display-side mirror of the collection tree.
//! 收藏樹在顯示端的鏡像。

use novelshelf_collection::{NodeId, NodeKind, TreeChange};

/// One row of the rendered tree, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: NodeId,
    pub label: String,
    /// Nesting depth, 0 for top-level rows.
    pub level: usize,
    pub kind: Option<NodeKind>,
}

#[derive(Debug, Clone)]
struct MirrorNode {
    id: NodeId,
    label: String,
    children: Vec<MirrorNode>,
}

/// A copy of the collection tree fed exclusively by structural change
/// events, the way a tree widget would consume them. It never reaches
/// back into the engine.
#[derive(Debug, Default)]
pub struct TreeMirror {
    roots: Vec<MirrorNode>,
}

impl TreeMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Apply one structural change to the mirror.
    pub fn apply(&mut self, change: &TreeChange) {
        match change {
            TreeChange::Inserted {
                id,
                parent,
                index,
                label,
            } => {
                let node = MirrorNode {
                    id: id.clone(),
                    label: label.clone(),
                    children: Vec::new(),
                };
                self.place(parent.as_ref(), *index, node);
            }
            TreeChange::Removed { id } => {
                detach_from(&mut self.roots, id);
            }
            TreeChange::Moved { id, parent, index } => {
                if let Some(node) = detach_from(&mut self.roots, id) {
                    self.place(parent.as_ref(), *index, node);
                }
            }
            TreeChange::Relabeled { id, label } => {
                if let Some(node) = find_mut(&mut self.roots, id) {
                    node.label = label.clone();
                }
            }
            TreeChange::Cleared => self.roots.clear(),
        }
    }

    /// Flatten the mirror into rows, depth first.
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        collect_rows(&self.roots, 0, &mut rows);
        rows
    }

    fn place(&mut self, parent: Option<&NodeId>, index: usize, node: MirrorNode) {
        let list = match parent {
            Some(parent_id) => match find_mut(&mut self.roots, parent_id) {
                Some(entry) => &mut entry.children,
                None => &mut self.roots,
            },
            None => &mut self.roots,
        };
        let index = index.min(list.len());
        list.insert(index, node);
    }
}

fn collect_rows(list: &[MirrorNode], level: usize, rows: &mut Vec<TreeRow>) {
    for node in list {
        rows.push(TreeRow {
            id: node.id.clone(),
            label: node.label.clone(),
            level,
            kind: node.id.kind(),
        });
        collect_rows(&node.children, level + 1, rows);
    }
}

fn detach_from(list: &mut Vec<MirrorNode>, id: &NodeId) -> Option<MirrorNode> {
    if let Some(position) = list.iter().position(|node| &node.id == id) {
        return Some(list.remove(position));
    }
    for node in list.iter_mut() {
        if let Some(found) = detach_from(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(list: &'a mut [MirrorNode], id: &NodeId) -> Option<&'a mut MirrorNode> {
    for node in list.iter_mut() {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}
