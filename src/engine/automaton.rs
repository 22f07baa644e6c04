//! Commentz-Walter automaton compiler.
//!
//! Turns a [`Trie`] of right-to-left keys into a matching automaton in two
//! breadth-first passes:
//!
//! 1. **Links**: Aho-Corasick suffix and output links. Every node reports
//!    its depth distance to its suffix-link target (`min_diff_s1`); terminal
//!    nodes also report to every node further down the chain (`min_diff_s2`).
//! 2. **Shifts**: `shift1`/`shift2` per node from the converged distances.
//!
//! Pass 2 must see every distance, so it only starts once pass 1 has visited
//! the whole trie.
//!
//! Output links are kept on the nodes but the right-to-left scan never
//! follows them: a backward walk already passes every terminal it matches.

use std::collections::VecDeque;

use super::trie::{NodeId, Trie, ROOT};
use super::Pattern;
use crate::error::{Result, SawmillError};

/// Compiled, read-only automaton. Shareable between scanner threads.
#[derive(Debug, Clone)]
pub struct Automaton {
    trie: Trie,
    min_len: usize,
}

impl Automaton {
    /// Insert every pattern into a fresh trie and compile it
    pub fn build(patterns: impl IntoIterator<Item = Pattern>) -> Result<Self> {
        let mut trie = Trie::new();
        for pattern in patterns {
            trie.insert(pattern)?;
        }
        Self::compile(trie)
    }

    pub fn compile(mut trie: Trie) -> Result<Self> {
        let min_len = trie.min_len().unwrap_or(0);

        let order = breadth_first(&trie);
        link_suffixes(&mut trie, &order)?;
        assign_shifts(&mut trie, &order, min_len);

        tracing::debug!(
            patterns = trie.len(),
            nodes = trie.node_count(),
            min_len,
            max_len = trie.max_len(),
            "Automaton compiled"
        );

        Ok(Self { trie, min_len })
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn patterns(&self) -> &[Pattern] {
        self.trie.patterns()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Length of the shortest signature (0 when nothing is registered)
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.trie.max_len()
    }

    /// Character heuristic: how deep `byte` first appears in any key.
    /// Bytes absent from every signature rank one past the shortest one.
    fn char_depth(&self, byte: u8) -> usize {
        self.trie
            .char_position(byte)
            .map_or(self.min_len + 1, |pos| pos.min(self.min_len + 1))
    }

    /// Distance the window end may advance after matching `matched` bytes
    /// down to `node`.
    ///
    /// `mismatch` is the text byte that failed to extend the match, `None`
    /// when the scan ran into the start of the stream.
    pub fn shift(&self, node: NodeId, matched: usize, mismatch: Option<u8>) -> usize {
        let v = self.trie.node(node);
        let lower = match mismatch {
            Some(byte) => {
                let k = self.char_depth(byte) as isize - matched as isize - 1;
                (v.shift1 as isize).max(k) as usize
            }
            None => v.shift1,
        };
        lower.min(v.shift2)
    }
}

fn breadth_first(trie: &Trie) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(trie.node_count());
    let mut queue = VecDeque::from([ROOT]);
    while let Some(id) = queue.pop_front() {
        order.push(id);
        queue.extend(trie.node(id).children());
    }
    order
}

fn link_suffixes(trie: &mut Trie, order: &[NodeId]) -> Result<()> {
    for &id in order.iter().skip(1) {
        let (byte, parent, depth) = {
            let n = trie.node(id);
            match (n.byte, n.parent) {
                (Some(byte), Some(parent)) => (byte, parent, n.depth),
                _ => {
                    return Err(SawmillError::Internal(format!(
                        "node {id} has no parent edge"
                    )))
                }
            }
        };

        let link = if parent == ROOT {
            ROOT
        } else {
            find_suffix_target(trie, parent, byte, depth)?
        };

        let output = if trie.node(link).is_terminal() {
            Some(link)
        } else {
            trie.node(link).output_link
        };

        {
            let n = &mut trie.nodes[id];
            n.suffix_link = Some(link);
            n.output_link = output;
        }

        let target = &mut trie.nodes[link];
        let diff = depth - target.depth;
        target.min_diff_s1 = Some(target.min_diff_s1.map_or(diff, |d| d.min(diff)));

        if trie.node(id).is_terminal() {
            propagate_terminal(trie, link, depth)?;
        }
    }
    Ok(())
}

/// Walk the parent's suffix chain until some node has a `byte` child.
/// The chain must bottom out at the root within `depth` steps.
fn find_suffix_target(trie: &Trie, parent: NodeId, byte: u8, depth: usize) -> Result<NodeId> {
    let mut cursor = trie.node(parent).suffix_link;
    for _ in 0..depth {
        let Some(f) = cursor else { break };
        if let Some(child) = trie.node(f).child(byte) {
            return Ok(child);
        }
        if f == ROOT {
            return Ok(ROOT);
        }
        cursor = trie.node(f).suffix_link;
    }
    Err(SawmillError::Internal(format!(
        "suffix link search for byte 0x{byte:02X} below node {parent} did not reach the root"
    )))
}

/// A terminal at `depth` tightens `min_diff_s2` on every node of its suffix
/// chain, starting at `from`.
fn propagate_terminal(trie: &mut Trie, from: NodeId, depth: usize) -> Result<()> {
    let mut cursor = Some(from);
    let mut steps = 0;
    while let Some(id) = cursor {
        let n = &mut trie.nodes[id];
        let diff = depth - n.depth;
        n.min_diff_s2 = Some(n.min_diff_s2.map_or(diff, |d| d.min(diff)));
        if id == ROOT {
            return Ok(());
        }
        cursor = n.suffix_link;
        steps += 1;
        if steps > depth {
            break;
        }
    }
    Err(SawmillError::Internal(format!(
        "suffix chain from node {from} did not reach the root"
    )))
}

fn assign_shifts(trie: &mut Trie, order: &[NodeId], min_len: usize) {
    {
        let root = &mut trie.nodes[ROOT];
        root.shift1 = 1;
        root.shift2 = min_len.max(1);
    }

    for &id in order.iter().skip(1) {
        let parent_shift2 = trie.node(id).parent.map_or(min_len, |p| trie.node(p).shift2);
        let n = &mut trie.nodes[id];
        n.shift1 = n.min_diff_s1.map_or(min_len, |d| d.min(min_len)).max(1);
        n.shift2 = n
            .min_diff_s2
            .map_or(parent_shift2, |d| d.min(parent_shift2))
            .max(1);
    }
}
