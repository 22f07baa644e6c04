//! Arena-backed signature trie.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Keys are
//! stored right-to-left (last signature byte first), which is the order a
//! Commentz-Walter scan reads the text. [`Trie::locate`] takes a signature
//! in its natural order and does the reversal.

use super::{Pattern, Tag};
use crate::error::{Result, SawmillError};

pub type NodeId = usize;

/// The root is always the first node of the arena
pub const ROOT: NodeId = 0;

/// What a terminal node stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    /// Index into [`Trie::patterns`]
    pub pattern: usize,
    pub tag: Tag,
    pub file_type: String,
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Edge label from the parent; `None` only for the root
    pub byte: Option<u8>,
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// Sparse child set, signature alphabets are small
    children: Vec<(u8, NodeId)>,
    pub terminal: Option<Terminal>,

    // Filled in by the automaton compiler
    pub(crate) suffix_link: Option<NodeId>,
    pub(crate) output_link: Option<NodeId>,
    pub(crate) min_diff_s1: Option<usize>,
    pub(crate) min_diff_s2: Option<usize>,
    pub(crate) shift1: usize,
    pub(crate) shift2: usize,
}

impl Node {
    fn new(byte: Option<u8>, depth: usize, parent: Option<NodeId>) -> Self {
        Self {
            byte,
            depth,
            parent,
            children: Vec::new(),
            terminal: None,
            suffix_link: None,
            output_link: None,
            min_diff_s1: None,
            min_diff_s2: None,
            shift1: 1,
            shift2: 1,
        }
    }

    pub fn child(&self, byte: u8) -> Option<NodeId> {
        self.children
            .iter()
            .find(|&&(b, _)| b == byte)
            .map(|&(_, id)| id)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().map(|&(_, id)| id)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Longest proper suffix of this node's key that is also a trie path
    pub fn suffix_link(&self) -> Option<NodeId> {
        self.suffix_link
    }

    /// Nearest terminal reachable through suffix links
    pub fn output_link(&self) -> Option<NodeId> {
        self.output_link
    }

    pub fn shift1(&self) -> usize {
        self.shift1
    }

    pub fn shift2(&self) -> usize {
        self.shift2
    }
}

/// Signature trie plus the per-alphabet statistics the shift heuristic needs
#[derive(Debug, Clone)]
pub struct Trie {
    pub(crate) nodes: Vec<Node>,
    patterns: Vec<Pattern>,
    min_len: Option<usize>,
    max_len: usize,
    /// Smallest 1-based key position of each byte over all keys
    char_table: [Option<usize>; 256],
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(None, 0, None)],
            patterns: Vec::new(),
            min_len: None,
            max_len: 0,
            char_table: [None; 256],
        }
    }

    /// Insert a signature. Returns `false` when the same byte sequence was
    /// already registered (the first registration wins).
    pub fn insert(&mut self, pattern: Pattern) -> Result<bool> {
        if pattern.is_empty() {
            return Err(SawmillError::EmptyPattern {
                file_type: pattern.file_type,
            });
        }

        let mut current = ROOT;
        for (depth, &byte) in pattern.bytes.iter().rev().enumerate() {
            current = match self.nodes[current].child(byte) {
                Some(next) => next,
                None => {
                    let id = self.nodes.len();
                    self.nodes.push(Node::new(Some(byte), depth + 1, Some(current)));
                    self.nodes[current].children.push((byte, id));
                    id
                }
            };
        }

        if self.nodes[current].terminal.is_some() {
            return Ok(false);
        }

        for (pos, &byte) in pattern.bytes.iter().rev().enumerate() {
            let slot = &mut self.char_table[byte as usize];
            if slot.map_or(true, |p| p > pos + 1) {
                *slot = Some(pos + 1);
            }
        }
        let len = pattern.len();
        self.min_len = Some(self.min_len.map_or(len, |m| m.min(len)));
        self.max_len = self.max_len.max(len);

        self.nodes[current].terminal = Some(Terminal {
            pattern: self.patterns.len(),
            tag: pattern.tag,
            file_type: pattern.file_type.clone(),
        });
        self.patterns.push(pattern);
        Ok(true)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn root(&self) -> &Node {
        &self.nodes[ROOT]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct registered signatures
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, index: usize) -> &Pattern {
        &self.patterns[index]
    }

    pub fn min_len(&self) -> Option<usize> {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Smallest 1-based position (counted from the signature end) at which
    /// `byte` occurs in any signature
    pub fn char_position(&self, byte: u8) -> Option<usize> {
        self.char_table[byte as usize]
    }

    /// Follow `key` (already in trie order) from the root.
    /// Returns the node reached, or `None` at the first missing edge.
    pub fn walk(&self, key: impl IntoIterator<Item = u8>) -> Option<NodeId> {
        key.into_iter()
            .try_fold(ROOT, |node, byte| self.nodes[node].child(byte))
    }

    /// Node for a signature given in natural (left-to-right) order
    pub fn locate(&self, signature: &[u8]) -> Option<NodeId> {
        self.walk(signature.iter().rev().copied())
    }

    /// Bytes spelled by the path from the root to `id`, in trie order
    pub fn key(&self, id: NodeId) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.nodes[id].depth);
        let mut current = id;
        while let Some(byte) = self.nodes[current].byte {
            key.push(byte);
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        key.reverse();
        key
    }
}
