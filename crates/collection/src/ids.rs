//! Node identifiers and the prefix-based id allocator.
//! 節點識別碼與以前綴為基礎的編號產生器。

use std::collections::HashMap;
use std::fmt;

/// Identifier prefix for book nodes.
/// 書籍節點的識別碼前綴。
pub const BOOK_PREFIX: &str = "bk";

/// Identifier prefix for series nodes.
/// 系列節點的識別碼前綴。
pub const SERIES_PREFIX: &str = "sr";

/// What a node identifier refers to.
/// 節點識別碼所指的類型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Book,
    Series,
}

impl NodeKind {
    /// The id prefix used by this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            NodeKind::Book => BOOK_PREFIX,
            NodeKind::Series => SERIES_PREFIX,
        }
    }
}

/// Identifier of a collection node, for example `bk3` or `sr1`.
/// 收藏節點的識別碼，例如 `bk3` 或 `sr1`。
///
/// The prefix decides whether the id names a book or a series; the two
/// namespaces are numbered independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The node kind derived from the id prefix, `None` for foreign ids.
    /// 由前綴判斷節點類型，無法辨識時回傳 `None`。
    pub fn kind(&self) -> Option<NodeKind> {
        if self.0.starts_with(BOOK_PREFIX) {
            Some(NodeKind::Book)
        } else if self.0.starts_with(SERIES_PREFIX) {
            Some(NodeKind::Series)
        } else {
            None
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allocate the first free identifier for the given kind.
///
/// Numbering starts at 1 and picks the smallest unused suffix, so ids
/// freed by a removal are handed out again.
pub fn new_id<V>(existing: &HashMap<NodeId, V>, kind: NodeKind) -> NodeId {
    let mut number: u64 = 1;
    loop {
        let candidate = NodeId(format!("{}{number}", kind.prefix()));
        if !existing.contains_key(&candidate) {
            return candidate;
        }
        number += 1;
    }
}
