use std::fmt;

use crate::error::Result;

use super::builder::{BuildStats, BuilderCore};
use super::config::DawgConfig;
use super::mass::MassPair;
use super::node::Edge;
use super::node_arena::{NodeArena, NodeId};
use super::search;

/// A graph of mass sequences that owns all of its nodes.
///
/// Sequences are added with [`insert`](MassDawg::insert), ideally in
/// ascending mass order, and [`finish`](MassDawg::finish) collapses whatever
/// is left of the last insertion path. Queries work at any point but only see
/// the fully shared graph after `finish`. More sequences may be inserted after
/// `finish`; call it again once they are in.
///
/// # Examples
///
/// ```
/// use mass_dawg::dawg::MassDawg;
///
/// let mut dawg = MassDawg::new();
/// dawg.insert(&[100.1, 200.2, 300.3], &[50.05, 100.1, 150.15], "ABC").unwrap();
/// dawg.insert(&[100.1, 200.2, 400.4], &[50.05, 100.1, 200.2], "ABD").unwrap();
/// dawg.finish();
///
/// assert_eq!(dawg.search(&[100.1, 200.2], 10), ["AB"]);
/// assert_eq!(dawg.search(&[100.1, 200.2, 400.4], 10), ["ABC", "ABD"]);
/// ```
#[derive(Default)]
pub struct MassDawg {
    core: BuilderCore,
}

impl MassDawg {
    /// Creates an empty graph with the default configuration.
    pub fn new() -> Self {
        MassDawg::default()
    }

    /// Creates an empty graph using `config`.
    pub fn with_config(config: DawgConfig) -> Self {
        MassDawg {
            core: BuilderCore::new(config),
        }
    }

    /// Adds the sequence of mass pairs `(singly[i], doubly[i])`.
    ///
    /// The node reached after `i + 1` pairs is labeled with the first `i + 1`
    /// characters of `kmer`, so every node on a shared path carries every
    /// k-mer passing through it. Inserting the same sequence twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the graph untouched, if the two sequences
    /// differ in length, are empty, or contain a NaN or infinite mass.
    pub fn insert(&mut self, singly: &[f64], doubly: &[f64], kmer: &str) -> Result<()> {
        self.core.insert(singly, doubly, kmer)
    }

    /// Merges every node still waiting for minimization.
    pub fn finish(&mut self) {
        self.core.finish();
    }

    /// Walks down the graph, always following the first edge whose singly or
    /// doubly window of `ppm` parts per million contains one of the remaining
    /// query values, and returns the k-mers of the node where the walk ends.
    ///
    /// Nothing matching the first step yields an empty result.
    pub fn search(&self, sequence: &[f64], ppm: u32) -> Vec<String> {
        search::exact(self.core.arena(), self.core.config().prune(), sequence, ppm)
    }

    /// Like [`search`](MassDawg::search), but explores every edge and lets each
    /// path skip up to `gap_allowance` edges that match no query value.
    ///
    /// Each path contributes the k-mers of its deepest matched node. The
    /// results of all paths are concatenated; a k-mer reachable along several
    /// paths is reported once per path.
    pub fn fuzzy_search(&self, sequence: &[f64], gap_allowance: u32, ppm: u32) -> Vec<String> {
        search::fuzzy(
            self.core.arena(),
            self.core.config().prune(),
            sequence,
            gap_allowance,
            ppm,
        )
    }

    /// Renders the graph as an indented tree; see the [`Display`](fmt::Display)
    /// implementation.
    pub fn dump(&self) -> String {
        self.to_string()
    }

    /// Returns a view of the root node.
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            arena: self.core.arena(),
            id: NodeId::ROOT,
            epsilon: self.core.config().epsilon(),
        }
    }

    /// Returns the number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.core.arena().len()
    }

    /// Returns the construction counters.
    pub fn stats(&self) -> BuildStats {
        self.core.stats()
    }

    /// Returns the configuration the graph was created with.
    pub fn config(&self) -> &DawgConfig {
        self.core.config()
    }
}

/// One line per edge and per node, indented by depth:
///
/// ```text
/// root
///   edge: {singly: 100.1, doubly: 50.05}
///     |---> kmers: [A]
///       edge: {singly: 200.2, doubly: 100.1}
///         |---> kmers: [AB]
/// ```
///
/// A node shared by several parents is printed under each of them.
impl fmt::Display for MassDawg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "root")?;
        let arena = self.core.arena();
        let mut stack: Vec<(usize, &Edge)> = arena
            .get(NodeId::ROOT)
            .edges()
            .iter()
            .rev()
            .map(|e| (2, e))
            .collect();
        while let Some((indent, edge)) = stack.pop() {
            writeln!(f, "{:indent$}edge: {}", "", edge.mass)?;
            let node = arena.get(edge.target);
            writeln!(
                f,
                "{:width$}|---> kmers: [{}]",
                "",
                node.kmers().join(", "),
                width = indent + 2
            )?;
            stack.extend(node.edges().iter().rev().map(|e| (indent + 4, e)));
        }
        Ok(())
    }
}

impl fmt::Debug for MassDawg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MassDawg")
            .field("nodes", &self.node_count())
            .field("config", self.config())
            .field("stats", &self.stats())
            .finish()
    }
}

/// A read-only view of one node of a [`MassDawg`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    arena: &'d NodeArena,
    id: NodeId,
    epsilon: f64,
}

impl<'d> NodeRef<'d> {
    /// Returns the node's handle.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the k-mers of every sequence whose path passes through here.
    #[inline]
    pub fn kmers(&self) -> &'d [String] {
        self.arena.get(self.id).kmers()
    }

    /// Returns true if some inserted sequence ends at this node.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.arena.get(self.id).is_terminal()
    }

    /// Returns the number of outgoing edges.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.arena.get(self.id).edges().len()
    }

    /// Follows the edge whose masses equal `(singly, doubly)` within the
    /// graph's epsilon.
    pub fn get(&self, singly: f64, doubly: f64) -> Option<NodeRef<'d>> {
        self.arena
            .get(self.id)
            .find_edge(&MassPair::new(singly, doubly), self.epsilon)
            .map(|edge| self.at(edge.target))
    }

    /// Returns an iterator over the outgoing edges and the nodes they lead to.
    pub fn children(&self) -> ChildIter<'d> {
        ChildIter {
            node: *self,
            edges: self.arena.get(self.id).edges(),
            index: 0,
        }
    }

    fn at(&self, id: NodeId) -> NodeRef<'d> {
        NodeRef { id, ..*self }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, rhs: &Self) -> bool {
        self.id == rhs.id && std::ptr::eq(self.arena, rhs.arena)
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kmers", &self.kmers())
            .field("terminal", &self.is_terminal())
            .finish()
    }
}

/// Iterator over the children of a node, yielding `(masses, child)` pairs in
/// edge order.
pub struct ChildIter<'d> {
    node: NodeRef<'d>,
    edges: &'d [Edge],
    index: usize,
}

impl<'d> Iterator for ChildIter<'d> {
    type Item = (MassPair, NodeRef<'d>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.get(self.index)?;
        self.index += 1;
        Some((edge.mass, self.node.at(edge.target)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.edges.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChildIter<'_> {}

/// Builds a finished graph from `(singly, doubly, kmer)` entries.
///
/// # Errors
///
/// Stops at the first entry [`MassDawg::insert`] rejects.
///
/// # Examples
///
/// ```
/// use mass_dawg::dawg::build_mass_dawg;
///
/// let dawg = build_mass_dawg([
///     (vec![150.0, 350.0, 600.6], vec![75.0, 175.0, 300.3], "XYC"),
///     (vec![200.2, 400.4, 600.6], vec![100.1, 200.2, 300.3], "ABC"),
/// ])
/// .unwrap();
///
/// let a = dawg.root().get(200.2, 100.1).unwrap();
/// let x = dawg.root().get(150.0, 75.0).unwrap();
/// assert_eq!(a.get(400.4, 200.2), x.get(350.0, 175.0));
/// ```
pub fn build_mass_dawg<S, D, K>(entries: impl IntoIterator<Item = (S, D, K)>) -> Result<MassDawg>
where
    S: AsRef<[f64]>,
    D: AsRef<[f64]>,
    K: AsRef<str>,
{
    let mut dawg = MassDawg::new();
    for (singly, doubly, kmer) in entries {
        dawg.insert(singly.as_ref(), doubly.as_ref(), kmer.as_ref())?;
    }
    dawg.finish();
    Ok(dawg)
}
