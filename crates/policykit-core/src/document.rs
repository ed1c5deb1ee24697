//! Rich-text document tree for policy bodies.
//!
//! A closed sum type with one variant per node `type`. Serde rejects unknown
//! node types and stray fields; rules the type cannot express (heading levels,
//! non-empty containers, nesting) are checked by [`validate`].

use crate::error::IntegrityViolation;
use crate::placeholder::{split_placeholders, PlaceholderKey, Substitutions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Inline formatting applied to a text leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mark {
    /// Strong emphasis.
    Bold,
    /// Emphasis.
    Italic,
}

/// Attributes of a heading node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadingAttrs {
    /// 1 to 4.
    pub level: u8,
}

/// Attributes shared by ordered and bullet lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListAttrs {
    /// Render items without paragraph spacing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tight: Option<bool>,
    /// First number of an ordered list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
}

/// Attributes of a table cell or header cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellAttrs {
    /// Columns spanned, at least 1.
    #[serde(default = "default_span")]
    pub colspan: u32,
    /// Rows spanned, at least 1.
    #[serde(default = "default_span")]
    pub rowspan: u32,
    /// Column widths in pixels, when set by the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colwidth: Option<Vec<u32>>,
}

fn default_span() -> u32 {
    1
}

/// A node of a policy document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum Node {
    /// Section title with inline content.
    Heading {
        /// Heading level.
        attrs: HeadingAttrs,
        /// Inline children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Block of inline content.
    Paragraph {
        /// Inline children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Table made of rows.
    Table {
        /// `tableRow` children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// One table row.
    TableRow {
        /// `tableCell` or `tableHeader` children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Body cell.
    TableCell {
        /// Span and width, when authored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<CellAttrs>,
        /// Block children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Header cell.
    TableHeader {
        /// Span and width, when authored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<CellAttrs>,
        /// Block children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Numbered list.
    OrderedList {
        /// List attributes.
        #[serde(default)]
        attrs: ListAttrs,
        /// `listItem` children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Unnumbered list.
    BulletList {
        /// List attributes.
        #[serde(default)]
        attrs: ListAttrs,
        /// `listItem` children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// One list entry.
    ListItem {
        /// Block children.
        #[serde(default)]
        content: Vec<Node>,
    },
    /// Literal text leaf.
    Text {
        /// The text, never empty.
        text: String,
        /// Inline formatting.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
    /// Line break inside inline content.
    HardBreak,
    /// A template value filled in before display.
    Placeholder {
        /// Which value to substitute.
        key: PlaceholderKey,
        /// Formatting carried over from the surrounding text.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
}

/// The `type` discriminator of a node, including the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// The document root, which is not a [`Node`].
    Doc,
    /// [`Node::Heading`].
    Heading,
    /// [`Node::Paragraph`].
    Paragraph,
    /// [`Node::Table`].
    Table,
    /// [`Node::TableRow`].
    TableRow,
    /// [`Node::TableCell`].
    TableCell,
    /// [`Node::TableHeader`].
    TableHeader,
    /// [`Node::OrderedList`].
    OrderedList,
    /// [`Node::BulletList`].
    BulletList,
    /// [`Node::ListItem`].
    ListItem,
    /// [`Node::Text`].
    Text,
    /// [`Node::HardBreak`].
    HardBreak,
    /// [`Node::Placeholder`].
    Placeholder,
}

impl NodeKind {
    /// Every kind, root first.
    pub const ALL: [NodeKind; 13] = [
        NodeKind::Doc,
        NodeKind::Heading,
        NodeKind::Paragraph,
        NodeKind::Table,
        NodeKind::TableRow,
        NodeKind::TableCell,
        NodeKind::TableHeader,
        NodeKind::OrderedList,
        NodeKind::BulletList,
        NodeKind::ListItem,
        NodeKind::Text,
        NodeKind::HardBreak,
        NodeKind::Placeholder,
    ];

    /// The discriminator string used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Doc => "doc",
            NodeKind::Heading => "heading",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Table => "table",
            NodeKind::TableRow => "tableRow",
            NodeKind::TableCell => "tableCell",
            NodeKind::TableHeader => "tableHeader",
            NodeKind::OrderedList => "orderedList",
            NodeKind::BulletList => "bulletList",
            NodeKind::ListItem => "listItem",
            NodeKind::Text => "text",
            NodeKind::HardBreak => "hardBreak",
            NodeKind::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Node {
    /// An unmarked text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    /// A text leaf with the given marks.
    pub fn text_with_marks(text: impl Into<String>, marks: &[Mark]) -> Self {
        Node::Text {
            text: text.into(),
            marks: marks.to_vec(),
        }
    }

    /// A heading holding one text leaf.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Node::Heading {
            attrs: HeadingAttrs { level },
            content: vec![Node::text(text)],
        }
    }

    /// A paragraph holding one text leaf.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Paragraph {
            content: vec![Node::text(text)],
        }
    }

    /// The node's `type` discriminator.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Heading { .. } => NodeKind::Heading,
            Node::Paragraph { .. } => NodeKind::Paragraph,
            Node::Table { .. } => NodeKind::Table,
            Node::TableRow { .. } => NodeKind::TableRow,
            Node::TableCell { .. } => NodeKind::TableCell,
            Node::TableHeader { .. } => NodeKind::TableHeader,
            Node::OrderedList { .. } => NodeKind::OrderedList,
            Node::BulletList { .. } => NodeKind::BulletList,
            Node::ListItem { .. } => NodeKind::ListItem,
            Node::Text { .. } => NodeKind::Text,
            Node::HardBreak => NodeKind::HardBreak,
            Node::Placeholder { .. } => NodeKind::Placeholder,
        }
    }

    /// Leaves that live inside headings and paragraphs.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Node::Text { .. } | Node::HardBreak | Node::Placeholder { .. }
        )
    }

    /// Nodes allowed directly under the document root.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Node::Heading { .. }
                | Node::Paragraph { .. }
                | Node::Table { .. }
                | Node::OrderedList { .. }
                | Node::BulletList { .. }
        )
    }

    /// Child nodes; empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Heading { content, .. }
            | Node::Paragraph { content }
            | Node::Table { content }
            | Node::TableRow { content }
            | Node::TableCell { content, .. }
            | Node::TableHeader { content, .. }
            | Node::OrderedList { content, .. }
            | Node::BulletList { content, .. }
            | Node::ListItem { content } => content,
            Node::Text { .. } | Node::HardBreak | Node::Placeholder { .. } => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Heading { content, .. }
            | Node::Paragraph { content }
            | Node::Table { content }
            | Node::TableRow { content }
            | Node::TableCell { content, .. }
            | Node::TableHeader { content, .. }
            | Node::OrderedList { content, .. }
            | Node::BulletList { content, .. }
            | Node::ListItem { content } => Some(content),
            Node::Text { .. } | Node::HardBreak | Node::Placeholder { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Depth-first, pre-order traversal yielding each node with its path.
pub struct Walk<'a> {
    stack: Vec<(String, &'a Node)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (String, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        for (i, child) in node.children().iter().enumerate().rev() {
            self.stack.push((format!("{path}.content[{i}]"), child));
        }
        Some((path, node))
    }
}

/// Walks a document's top-level `content`. Paths look like `content[2].content[0]`.
pub fn walk(nodes: &[Node]) -> Walk<'_> {
    let stack = nodes
        .iter()
        .enumerate()
        .rev()
        .map(|(i, node)| (format!("content[{i}]"), node))
        .collect();
    Walk { stack }
}

/// Every placeholder key used anywhere in the tree.
pub fn placeholders(nodes: &[Node]) -> BTreeSet<PlaceholderKey> {
    walk(nodes)
        .filter_map(|(_, node)| match node {
            Node::Placeholder { key, .. } => Some(*key),
            _ => None,
        })
        .collect()
}

/// Concatenated leaf text, one line per block. Placeholders print as `{{key}}`.
pub fn text_content(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        push_text(node, &mut out);
    }
    out.trim_end().to_string()
}

fn push_text(node: &Node, out: &mut String) {
    match node {
        Node::Text { text, .. } => out.push_str(text),
        Node::Placeholder { key, .. } => out.push_str(&key.to_string()),
        Node::HardBreak => out.push('\n'),
        Node::TableCell { content, .. } | Node::TableHeader { content, .. } => {
            for child in content {
                push_text(child, out);
            }
            if !out.ends_with('\n') {
                out.push('\t');
            }
        }
        _ => {
            for child in node.children() {
                push_text(child, out);
            }
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Placeholder expansion and substitution
// ---------------------------------------------------------------------------

/// Rewrites `{{key}}` substrings of every text leaf into placeholder nodes.
///
/// Text leaves with an unknown key or an unterminated `{{` are left as they
/// are and reported.
pub fn expand_placeholders(document: &str, nodes: &mut Vec<Node>) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();
    expand_at(document, "content", nodes, &mut violations);
    violations
}

fn expand_at(
    document: &str,
    path: &str,
    nodes: &mut Vec<Node>,
    violations: &mut Vec<IntegrityViolation>,
) {
    let authored = std::mem::take(nodes);
    nodes.reserve(authored.len());
    for (i, mut node) in authored.into_iter().enumerate() {
        let here = format!("{path}[{i}]");
        if let Node::Text { text, marks } = &node {
            if text.contains("{{") {
                match split_placeholders(text, marks) {
                    Ok(pieces) => {
                        nodes.extend(pieces);
                        continue;
                    }
                    Err(reason) => violations.push(malformed(document, &here, reason)),
                }
            }
        } else if let Some(children) = node.children_mut() {
            expand_at(document, &format!("{here}.content"), children, violations);
        }
        nodes.push(node);
    }
}

/// Returns a copy of the tree with every supplied placeholder turned into text.
pub fn fill(nodes: &[Node], substitutions: &Substitutions) -> Vec<Node> {
    let mut filled = nodes.to_vec();
    fill_in_place(&mut filled, substitutions);
    filled
}

fn fill_in_place(nodes: &mut [Node], substitutions: &Substitutions) {
    for node in nodes {
        let replacement = match node {
            Node::Placeholder { key, marks } => {
                substitutions
                    .value_for(*key)
                    .map(|text| Node::Text {
                        text,
                        marks: marks.clone(),
                    })
            }
            _ => None,
        };
        if let Some(replacement) = replacement {
            *node = replacement;
        } else if let Some(children) = node.children_mut() {
            fill_in_place(children, substitutions);
        }
    }
}

// ---------------------------------------------------------------------------
// Shape validation
// ---------------------------------------------------------------------------

fn malformed(document: &str, path: &str, reason: impl Into<String>) -> IntegrityViolation {
    IntegrityViolation::MalformedNode {
        document: document.to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Checks the structural rules of every node under a document root.
///
/// An empty root is allowed; every other container must have children of
/// the kinds its type admits.
pub fn validate(document: &str, nodes: &[Node]) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        let path = format!("content[{i}]");
        if !node.is_block() {
            violations.push(malformed(
                document,
                &path,
                format!("{} is not allowed at the document root", node.kind()),
            ));
        }
        validate_node(document, &path, node, &mut violations);
    }
    violations
}

fn validate_node(document: &str, path: &str, node: &Node, out: &mut Vec<IntegrityViolation>) {
    let kind = node.kind();
    let children = node.children();

    match node {
        Node::Text { text, .. } => {
            if text.is_empty() {
                out.push(malformed(document, path, "text node has empty text"));
            }
            return;
        }
        Node::HardBreak | Node::Placeholder { .. } => return,
        Node::Heading { attrs, .. } if !(1..=4).contains(&attrs.level) => {
            out.push(malformed(
                document,
                path,
                format!("heading level {} outside 1..=4", attrs.level),
            ));
        }
        _ => {}
    }

    if children.is_empty() {
        out.push(malformed(document, path, format!("{kind} has no content")));
    }

    for (i, child) in children.iter().enumerate() {
        let child_path = format!("{path}.content[{i}]");
        if !child_allowed(node, child) {
            out.push(malformed(
                document,
                &child_path,
                format!("{} is not allowed inside {kind}", child.kind()),
            ));
        }
        validate_node(document, &child_path, child, out);
    }
}

fn child_allowed(parent: &Node, child: &Node) -> bool {
    match parent {
        Node::Heading { .. } | Node::Paragraph { .. } => child.is_inline(),
        Node::Table { .. } => matches!(child, Node::TableRow { .. }),
        Node::TableRow { .. } => {
            matches!(child, Node::TableCell { .. } | Node::TableHeader { .. })
        }
        Node::TableCell { .. } | Node::TableHeader { .. } => {
            child.is_inline()
                || matches!(
                    child,
                    Node::Paragraph { .. } | Node::OrderedList { .. } | Node::BulletList { .. }
                )
        }
        Node::OrderedList { .. } | Node::BulletList { .. } => {
            matches!(child, Node::ListItem { .. })
        }
        Node::ListItem { .. } => matches!(
            child,
            Node::Paragraph { .. } | Node::OrderedList { .. } | Node::BulletList { .. }
        ),
        Node::Text { .. } | Node::HardBreak | Node::Placeholder { .. } => false,
    }
}
