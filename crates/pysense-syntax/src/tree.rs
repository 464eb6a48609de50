//! Arena-backed homogeneous syntax tree.
//!
//! Nodes live in one `Vec` per module and are addressed by `NodeIndex`.
//! Every node knows its kind, span, parent and children; leaves carry their
//! interned text. The tree also maintains a used-names index (identifier
//! atom -> every Name leaf with that text), which name-resolution filters
//! and the dynamic heuristics query instead of re-walking the tree.

use crate::kind::SyntaxKind;
use pysense_common::interner::{Atom, Interner};
use pysense_common::position::{Position, Span};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Index of a node within its module's arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl std::fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug)]
pub struct Node {
    pub kind: SyntaxKind,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    /// Interned text; `Atom::NONE` on inner nodes.
    pub text: Atom,
    pub span: Span,
}

/// A parsed module.
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeIndex,
    used_names: FxHashMap<Atom, Vec<NodeIndex>>,
    interner: Arc<Interner>,
}

impl Tree {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeIndex, interner: Arc<Interner>) -> Self {
        let mut tree = Self {
            nodes,
            root,
            used_names: FxHashMap::default(),
            interner,
        };
        tree.link_parents(root, None);
        tree.build_used_names();
        tree
    }

    fn link_parents(&mut self, index: NodeIndex, parent: Option<NodeIndex>) {
        self.nodes[index.0 as usize].parent = parent;
        let children = self.nodes[index.0 as usize].children.clone();
        for child in children {
            self.link_parents(child, Some(index));
        }
    }

    fn build_used_names(&mut self) {
        let mut used: FxHashMap<Atom, Vec<NodeIndex>> = FxHashMap::default();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.kind == SyntaxKind::Name {
                used.entry(node.text).or_default().push(NodeIndex(i as u32));
            }
        }
        self.used_names = used;
    }

    #[inline]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    #[inline]
    pub fn get(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0 as usize]
    }

    #[inline]
    pub fn kind(&self, index: NodeIndex) -> SyntaxKind {
        self.get(index).kind
    }

    #[inline]
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.get(index).children
    }

    #[inline]
    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.get(index).parent
    }

    #[inline]
    pub fn span(&self, index: NodeIndex) -> Span {
        self.get(index).span
    }

    #[inline]
    pub fn start_pos(&self, index: NodeIndex) -> Position {
        self.get(index).span.start
    }

    #[inline]
    pub fn end_pos(&self, index: NodeIndex) -> Position {
        self.get(index).span.end
    }

    /// Interned text of a leaf; `Atom::NONE` for inner nodes.
    #[inline]
    pub fn atom(&self, index: NodeIndex) -> Atom {
        self.get(index).text
    }

    /// Resolved text of a leaf.
    pub fn text(&self, index: NodeIndex) -> Arc<str> {
        self.interner.resolve(self.get(index).text)
    }

    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// All Name leaves spelling `atom`, in arena (source) order.
    pub fn used_names(&self, atom: Atom) -> &[NodeIndex] {
        self.used_names.get(&atom).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every (identifier, occurrences) pair in the module.
    pub fn all_used_names(&self) -> impl Iterator<Item = (Atom, &[NodeIndex])> + '_ {
        self.used_names.iter().map(|(&atom, v)| (atom, v.as_slice()))
    }

    /// Walk up until a node of one of `kinds` is found.
    pub fn search_ancestor(&self, index: NodeIndex, kinds: &[SyntaxKind]) -> Option<NodeIndex> {
        let mut current = self.parent(index);
        while let Some(node) = current {
            if kinds.contains(&self.kind(node)) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Is `leaf` an Operator/Keyword with exactly this text?
    pub fn leaf_is(&self, index: NodeIndex, text: &str) -> bool {
        let node = self.get(index);
        node.kind.is_leaf() && !node.text.is_none() && &*self.interner.resolve(node.text) == text
    }

    /// The innermost leaf containing `pos`, if any.
    pub fn leaf_at(&self, pos: Position) -> Option<NodeIndex> {
        let mut current = self.root;
        'descend: loop {
            for &child in self.children(current) {
                if self.span(child).contains(pos) {
                    if self.kind(child).is_leaf() {
                        return Some(child);
                    }
                    current = child;
                    continue 'descend;
                }
            }
            return None;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all node indices in arena order (pre-order by construction
    /// for leaves, but no ordering guarantee for inner nodes).
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len() as u32).map(NodeIndex)
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree").field("nodes", &self.nodes.len()).finish()
    }
}
