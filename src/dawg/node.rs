use smallvec::SmallVec;

use super::config::Equivalence;
use super::mass::MassPair;
use super::node_arena::NodeId;

/// An outgoing transition: a mass pair leading to a child node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Edge {
    /// Masses consumed by following this edge.
    pub mass: MassPair,
    /// The node this edge leads to.
    pub target: NodeId,
}

/// Where a k-mer label came from: the inserted sequence, and how many of its
/// mass pairs lead from the root to the labeled node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Origin {
    pub entry: usize,
    pub depth: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Label {
    kmer: usize,
    origin: Origin,
}

/// A node of the mass graph.
///
/// A node carries the k-mers of every inserted sequence whose path passes
/// through it, its outgoing edges, and whether some inserted sequence ends
/// here. Each k-mer remembers the sequences that put it there, so a merged
/// node can be split again along the paths that built it. Edges are kept in
/// insertion order; most nodes have one or two, so they live inline.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MassNode {
    kmers: SmallVec<[String; 2]>,
    labels: SmallVec<[Label; 2]>,
    edges: SmallVec<[Edge; 2]>,
    terminal: bool,
}

impl MassNode {
    /// Creates an empty, non-terminal node.
    pub fn new() -> Self {
        MassNode::default()
    }

    /// Creates a node labeled with a single k-mer.
    pub fn labeled(kmer: &str, origin: Origin) -> Self {
        let mut node = MassNode::new();
        node.add_kmer(kmer, origin, |_| false);
        node
    }

    /// Adds `kmer` as contributed by `origin`.
    ///
    /// `same_path` is asked about every origin already recorded for the same
    /// k-mer; if it holds for one of them the label is already known and
    /// nothing changes. Returns true if the label was new.
    pub fn add_kmer(&mut self, kmer: &str, origin: Origin, same_path: impl Fn(Origin) -> bool) -> bool {
        let index = match self.kmers.iter().position(|k| k == kmer) {
            Some(index) => {
                if self
                    .labels
                    .iter()
                    .any(|l| l.kmer == index && same_path(l.origin))
                {
                    return false;
                }
                index
            }
            None => {
                self.kmers.push(kmer.to_owned());
                self.kmers.len() - 1
            }
        };
        self.labels.push(Label { kmer: index, origin });
        true
    }

    /// Every recorded label with the origin that contributed it.
    pub fn labels(&self) -> impl Iterator<Item = (&str, Origin)> + '_ {
        self.labels
            .iter()
            .map(|l| (self.kmers[l.kmer].as_str(), l.origin))
    }

    /// Keeps only the labels whose origin satisfies `keep`. K-mers left
    /// without any origin are dropped.
    pub fn retain_labels(&mut self, mut keep: impl FnMut(Origin) -> bool) {
        let mut kmers: SmallVec<[String; 2]> = SmallVec::new();
        let mut labels = SmallVec::new();
        for label in std::mem::take(&mut self.labels) {
            if !keep(label.origin) {
                continue;
            }
            let kmer = &self.kmers[label.kmer];
            let index = match kmers.iter().position(|k| k == kmer) {
                Some(index) => index,
                None => {
                    kmers.push(kmer.clone());
                    kmers.len() - 1
                }
            };
            labels.push(Label {
                kmer: index,
                origin: label.origin,
            });
        }
        self.kmers = kmers;
        self.labels = labels;
    }

    /// The k-mers carried by this node, in the order they were first added.
    #[inline]
    pub fn kmers(&self) -> &[String] {
        &self.kmers
    }

    /// The outgoing edges of this node.
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// True if some inserted sequence ends at this node.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub(crate) fn set_terminal(&mut self) {
        self.terminal = true;
    }

    /// Appends an edge. No deduplication happens here.
    pub(crate) fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Returns the first edge whose masses equal `mass` within `epsilon`.
    pub fn find_edge(&self, mass: &MassPair, epsilon: f64) -> Option<&Edge> {
        self.edges.iter().find(|e| e.mass.approx_eq(mass, epsilon))
    }

    /// Points the edge `(mass, from)` at `to`.
    ///
    /// If the node already has an edge with the same masses leading to `to`,
    /// the `(mass, from)` edge is dropped instead, so no node ever holds the
    /// same transition twice.
    pub(crate) fn retarget(&mut self, mass: &MassPair, from: NodeId, to: NodeId, epsilon: f64) -> Retarget {
        let Some(pos) = self
            .edges
            .iter()
            .position(|e| e.target == from && e.mass.approx_eq(mass, epsilon))
        else {
            return Retarget::Missing;
        };
        let duplicate = self
            .edges
            .iter()
            .any(|e| e.target == to && e.mass.approx_eq(mass, epsilon));
        if duplicate {
            self.edges.remove(pos);
            Retarget::Dropped
        } else {
            self.edges[pos].target = to;
            Retarget::Moved
        }
    }

    /// Computes the key under which minimization registers this node.
    ///
    /// The key is built from the terminal flag and the outgoing mass pairs,
    /// quantized to `epsilon` and sorted ascending by singly then doubly mass
    /// so that edge order does not matter. With [`Equivalence::Subgraph`]
    /// the child ids take part as well. K-mers are never part of the key.
    pub fn structural_key(&self, epsilon: f64, equivalence: Equivalence) -> StructuralKey {
        let mut edges: SmallVec<[KeyEdge; 4]> = self
            .edges
            .iter()
            .map(|e| {
                let (singly, doubly) = e.mass.quantize(epsilon);
                let target = match equivalence {
                    Equivalence::MassShape => None,
                    Equivalence::Subgraph => Some(e.target),
                };
                KeyEdge {
                    singly,
                    doubly,
                    target,
                }
            })
            .collect();
        edges.sort_unstable();
        StructuralKey {
            terminal: self.terminal,
            edges,
        }
    }
}

/// Outcome of [`MassNode::retarget`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Retarget {
    /// The edge now leads to the new target.
    Moved,
    /// The edge was removed because an identical one already existed.
    Dropped,
    /// No matching edge was found.
    Missing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct KeyEdge {
    singly: i64,
    doubly: i64,
    target: Option<NodeId>,
}

/// Hashable, order-independent summary of a node's outgoing structure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct StructuralKey {
    terminal: bool,
    edges: SmallVec<[KeyEdge; 4]>,
}
