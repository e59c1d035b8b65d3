//! Index-addressed arena holding every node of a mass graph.
//!
//! Nodes refer to each other by [`NodeId`], so a node shared by many parents
//! after minimization is still owned exactly once, by the arena. Slots of
//! nodes discarded during minimization go onto a free list and are reused by
//! later allocations.
//!
//! The arena also counts incoming edges per node. Every edge change goes
//! through it so the counts stay exact; the builder uses them to tell a node
//! reached by a single path from one shared by several.

use super::mass::MassPair;
use super::node::{Edge, MassNode, Origin, Retarget};

/// Stable handle of a node inside its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The root node; allocated first and never released.
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(u32::try_from(index).expect("node arena exceeded u32::MAX slots"))
    }

    /// Position of this node's slot in the arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) struct NodeArena {
    nodes: Vec<MassNode>,
    in_degree: Vec<u32>,
    free_list: Vec<NodeId>,
    #[cfg(debug_assertions)]
    released: Vec<bool>,
}

impl NodeArena {
    /// Creates an arena holding only the root.
    pub fn new() -> Self {
        NodeArena {
            nodes: vec![MassNode::new()],
            in_degree: vec![0],
            free_list: Vec::new(),
            #[cfg(debug_assertions)]
            released: vec![false],
        }
    }

    /// Stores `node`, reusing a released slot when one is available.
    ///
    /// The node's edges count towards the in-degree of their targets.
    pub fn alloc(&mut self, node: MassNode) -> NodeId {
        for edge in node.edges() {
            self.in_degree[edge.target.index()] += 1;
        }
        if let Some(id) = self.free_list.pop() {
            self.nodes[id.index()] = node;
            self.in_degree[id.index()] = 0;
            #[cfg(debug_assertions)]
            {
                self.released[id.index()] = false;
            }
            id
        } else {
            let id = NodeId::from_index(self.nodes.len());
            self.nodes.push(node);
            self.in_degree.push(0);
            #[cfg(debug_assertions)]
            self.released.push(false);
            id
        }
    }

    /// Creates a new child of `parent` reached through `mass` and labeled
    /// with `kmer`. Always allocates; deduplication is minimization's job.
    pub fn add_child(&mut self, parent: NodeId, mass: MassPair, kmer: &str, origin: Origin) -> NodeId {
        let child = self.alloc(MassNode::labeled(kmer, origin));
        self.push_edge(parent, Edge {
            mass,
            target: child,
        });
        child
    }

    /// Appends `edge` to `parent`.
    pub fn push_edge(&mut self, parent: NodeId, edge: Edge) {
        self.in_degree[edge.target.index()] += 1;
        self.get_mut(parent).push_edge(edge);
    }

    /// Points the edge `(mass, from)` of `parent` at `to`.
    ///
    /// Returns false if `parent` has no such edge.
    pub fn retarget(&mut self, parent: NodeId, mass: &MassPair, from: NodeId, to: NodeId, epsilon: f64) -> bool {
        match self.get_mut(parent).retarget(mass, from, to, epsilon) {
            Retarget::Moved => {
                self.in_degree[from.index()] -= 1;
                self.in_degree[to.index()] += 1;
                true
            }
            Retarget::Dropped => {
                self.in_degree[from.index()] -= 1;
                true
            }
            Retarget::Missing => false,
        }
    }

    /// Returns the slot of a node that nothing refers to anymore.
    pub fn release(&mut self, id: NodeId) {
        debug_assert_ne!(id, NodeId::ROOT, "the root is never released");
        debug_assert_eq!(self.in_degree[id.index()], 0, "{id:?} released while referenced");
        #[cfg(debug_assertions)]
        {
            debug_assert!(!self.released[id.index()], "{id:?} released twice");
            self.released[id.index()] = true;
        }
        let node = std::mem::take(&mut self.nodes[id.index()]);
        for edge in node.edges() {
            self.in_degree[edge.target.index()] -= 1;
        }
        self.free_list.push(id);
    }

    /// Number of edges leading to `id`.
    #[inline]
    pub fn in_degree(&self, id: NodeId) -> u32 {
        self.in_degree[id.index()]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &MassNode {
        #[cfg(debug_assertions)]
        debug_assert!(!self.released[id.index()], "{id:?} used after release");
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MassNode {
        #[cfg(debug_assertions)]
        debug_assert!(!self.released[id.index()], "{id:?} used after release");
        &mut self.nodes[id.index()]
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Number of slots ever allocated.
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const O: Origin = Origin { entry: 0, depth: 1 };

    #[test]
    fn new_arena_holds_the_root() {
        let arena = NodeArena::new();
        assert_eq!(arena.len(), 1);
        assert!(arena.get(NodeId::ROOT).edges().is_empty());
    }

    #[test]
    fn add_child_links_parent_to_new_node() {
        let mut arena = NodeArena::new();
        let child = arena.add_child(NodeId::ROOT, MassPair::new(100.1, 50.05), "A", O);
        let root = arena.get(NodeId::ROOT);
        assert_eq!(root.edges().len(), 1);
        assert_eq!(root.edges()[0].target, child);
        assert_eq!(arena.get(child).kmers(), ["A"]);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn add_child_never_deduplicates() {
        let mut arena = NodeArena::new();
        let mass = MassPair::new(100.1, 50.05);
        let a = arena.add_child(NodeId::ROOT, mass, "A", O);
        let b = arena.add_child(NodeId::ROOT, mass, "A", O);
        assert_ne!(a, b);
        assert_eq!(arena.get(NodeId::ROOT).edges().len(), 2);
    }

    #[test]
    fn edges_are_counted_per_target() {
        let mut arena = NodeArena::new();
        let mass = MassPair::new(100.1, 50.05);
        let a = arena.add_child(NodeId::ROOT, mass, "A", O);
        let b = arena.add_child(NodeId::ROOT, MassPair::new(150.0, 75.0), "X", O);
        assert_eq!(arena.in_degree(a), 1);
        let copy = arena.alloc(arena.get(NodeId::ROOT).clone());
        assert_eq!(arena.in_degree(a), 2);
        assert_eq!(arena.in_degree(copy), 0);
        assert!(arena.retarget(NodeId::ROOT, &mass, a, b, 1e-4));
        assert_eq!(arena.in_degree(a), 1);
        assert_eq!(arena.in_degree(b), 3);
        assert!(!arena.retarget(NodeId::ROOT, &mass, a, b, 1e-4));
    }

    #[test]
    fn retarget_onto_existing_edge_drops_one_reference() {
        let mut arena = NodeArena::new();
        let mass = MassPair::new(100.1, 50.05);
        let a = arena.add_child(NodeId::ROOT, mass, "A", O);
        let b = arena.add_child(NodeId::ROOT, mass, "A", O);
        assert!(arena.retarget(NodeId::ROOT, &mass, b, a, 1e-4));
        assert_eq!(arena.in_degree(a), 1);
        assert_eq!(arena.in_degree(b), 0);
        assert_eq!(arena.get(NodeId::ROOT).edges().len(), 1);
    }

    #[test]
    fn release_drops_outgoing_references() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(MassNode::labeled("A", O));
        let leaf = arena.add_child(a, MassPair::new(100.1, 50.05), "AB", O);
        assert_eq!(arena.in_degree(leaf), 1);
        arena.release(a);
        assert_eq!(arena.in_degree(leaf), 0);
    }

    #[test]
    fn released_slots_are_reused() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(MassNode::labeled("A", O));
        let _b = arena.alloc(MassNode::labeled("B", O));
        arena.release(a);
        assert_eq!(arena.len(), 2);
        let c = arena.alloc(MassNode::labeled("C", O));
        assert_eq!(c, a);
        assert_eq!(arena.slots(), 3);
        assert_eq!(arena.get(c).kmers(), ["C"]);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "used after release")]
    fn use_after_release_is_caught_in_debug_builds() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(MassNode::new());
        arena.release(a);
        let _ = arena.get(a);
    }
}
