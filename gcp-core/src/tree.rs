//! Display tree abstraction.
//!
//! The host owns the display tree; dissectors only add nodes to it through
//! [`TreeSink`] and pass the returned [`NodeId`]s back for children and
//! annotations. [`ProtoTree`] is an in-memory implementation used by hosts
//! without a tree of their own and by tests.

use std::fmt::Write as _;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::field::FieldValue;

/// Opaque handle to a node created through a [`TreeSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Byte range of a field within the message being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    /// Span used by generated fields, which are not backed by message bytes.
    pub const GENERATED: Span = Span { offset: 0, len: 0 };

    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
}

/// Severity of an expert annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warn,
    Error,
}

/// An expert annotation attached to a node (highlighted in the host UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpertInfo {
    /// Filterable name, e.g. `h248.cmd_error`.
    pub name: &'static str,
    pub severity: Severity,
    pub summary: &'static str,
}

/// Sink for display tree nodes.
pub trait TreeSink {
    /// Add a named field. `parent = None` adds a top-level node.
    fn add_field(
        &mut self,
        parent: Option<NodeId>,
        name: &'static str,
        value: FieldValue,
        span: Span,
    ) -> NodeId;

    /// Add an unnamed text node that groups children.
    fn add_subtree(&mut self, parent: Option<NodeId>, label: &str) -> NodeId;

    /// Append text to a node's label.
    fn append_text(&mut self, node: NodeId, text: &str);

    /// Mark a node as derived (not parsed from the message bytes).
    fn set_generated(&mut self, node: NodeId);

    /// Attach an expert annotation to a node.
    fn add_expert(&mut self, node: NodeId, info: &ExpertInfo);
}

/// A node of a [`ProtoTree`].
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Field name, `None` for text subtrees.
    pub name: Option<&'static str>,
    pub value: FieldValue,
    pub label: CompactString,
    pub span: Span,
    pub generated: bool,
    pub experts: SmallVec<[ExpertInfo; 1]>,
    pub children: Vec<NodeId>,
}

/// In-memory display tree.
#[derive(Debug, Default)]
pub struct ProtoTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl ProtoTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// First node (in insertion order) with the given field name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == Some(name))
            .map(NodeId)
    }

    /// All nodes with the given field name, in insertion order.
    pub fn find_all(&self, name: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.name == Some(name))
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// First text subtree whose label equals `label`.
    pub fn find_label(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.is_none() && n.label == label)
            .map(NodeId)
    }

    /// Direct children of `id` with the given field name.
    pub fn children_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].name == Some(name))
            .collect()
    }

    /// Render the tree as indented text, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            self.render_node(*root, 0, &mut out);
        }
        out
    }

    fn render_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id.0];
        let _ = write!(out, "{:indent$}", "", indent = depth * 2);
        match node.name {
            Some(name) => {
                let _ = write!(out, "{name}: {}", node.value);
            }
            None => out.push_str(&node.label),
        }
        if node.name.is_some() && !node.label.is_empty() {
            out.push_str(&node.label);
        }
        if node.generated {
            out.push_str(" [generated]");
        }
        for expert in &node.experts {
            let _ = write!(out, " <{}>", expert.name);
        }
        out.push('\n');
        for child in &node.children {
            self.render_node(*child, depth + 1, out);
        }
    }

    fn push(&mut self, parent: Option<NodeId>, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}

impl TreeSink for ProtoTree {
    fn add_field(
        &mut self,
        parent: Option<NodeId>,
        name: &'static str,
        value: FieldValue,
        span: Span,
    ) -> NodeId {
        self.push(
            parent,
            TreeNode {
                name: Some(name),
                value,
                label: CompactString::default(),
                span,
                generated: false,
                experts: SmallVec::new(),
                children: Vec::new(),
            },
        )
    }

    fn add_subtree(&mut self, parent: Option<NodeId>, label: &str) -> NodeId {
        self.push(
            parent,
            TreeNode {
                name: None,
                value: FieldValue::Null,
                label: CompactString::new(label),
                span: Span::GENERATED,
                generated: false,
                experts: SmallVec::new(),
                children: Vec::new(),
            },
        )
    }

    fn append_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].label.push_str(text);
    }

    fn set_generated(&mut self, node: NodeId) {
        self.nodes[node.0].generated = true;
    }

    fn add_expert(&mut self, node: NodeId, info: &ExpertInfo) {
        self.nodes[node.0].experts.push(*info);
    }
}
