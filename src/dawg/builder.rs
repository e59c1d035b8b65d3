use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{DawgError, Result};

use super::config::DawgConfig;
use super::mass::{max_keyable_mass, MassPair};
use super::node::{Edge, Origin, StructuralKey};
use super::node_arena::{NodeArena, NodeId};

/// Counters describing how a graph was built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Successful calls to `insert`.
    pub insertions: usize,
    /// Insertions that did not follow the previously inserted sequence.
    pub out_of_order: usize,
    /// Nodes that became canonical during minimization.
    pub registered: usize,
    /// Nodes folded into an existing canonical node.
    pub merged: usize,
}

/// A node created by the current insertion path and not yet minimized.
#[derive(Clone, Copy, Debug)]
struct FrontierEntry {
    parent: NodeId,
    child: NodeId,
    mass: MassPair,
}

/// The last inserted sequence and the nodes along its path.
///
/// `nodes[i]` is the node reached after consuming `masses[..=i]`.
#[derive(Clone, Debug, Default)]
struct PreviousSequence {
    masses: Vec<MassPair>,
    nodes: Vec<NodeId>,
}

impl PreviousSequence {
    /// True if `masses` may follow this sequence on the sorted fast path.
    ///
    /// Scans pairwise: any smaller singly or doubly mass means the new
    /// sequence comes first; both masses larger means it comes after.
    /// Otherwise the longer (or equally long) sequence comes after.
    fn is_less_than(&self, masses: &[MassPair]) -> bool {
        for (new, old) in masses.iter().zip(&self.masses) {
            if new.singly < old.singly || new.doubly < old.doubly {
                return false;
            }
            if new.singly > old.singly && new.doubly > old.doubly {
                return true;
            }
        }
        masses.len() >= self.masses.len()
    }

    fn common_prefix_len(&self, masses: &[MassPair], epsilon: f64) -> usize {
        self.masses
            .iter()
            .zip(masses)
            .take_while(|(old, new)| old.approx_eq(new, epsilon))
            .count()
    }
}

/// The incremental builder behind [`MassDawg`](super::MassDawg).
///
/// Sequences are best inserted in ascending mass order: the previous
/// sequence's path then stays on the frontier and the shared prefix is found
/// in time proportional to its length. Out-of-order sequences are accepted
/// too; their prefix is matched against the minimized graph and reopened,
/// copying any node along it that other paths share.
///
/// Every k-mer label records the sequence that contributed it. When a shared
/// node is copied, the copy takes the labels of the sequences whose masses
/// follow the path being reopened and the original keeps the others.
pub(crate) struct BuilderCore {
    arena: NodeArena,
    /// Mass pairs of every inserted sequence, indexed by [`Origin::entry`].
    sequences: Vec<Box<[MassPair]>>,
    frontier: Vec<FrontierEntry>,
    registry: HashMap<StructuralKey, NodeId>,
    previous: Option<PreviousSequence>,
    config: DawgConfig,
    stats: BuildStats,
}

impl Default for BuilderCore {
    fn default() -> Self {
        BuilderCore::new(DawgConfig::default())
    }
}

impl BuilderCore {
    /// Creates a builder holding only the root.
    pub(crate) fn new(config: DawgConfig) -> Self {
        BuilderCore {
            arena: NodeArena::new(),
            sequences: Vec::new(),
            frontier: Vec::new(),
            registry: HashMap::default(),
            previous: None,
            config,
            stats: BuildStats::default(),
        }
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub(crate) fn config(&self) -> &DawgConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> BuildStats {
        self.stats
    }

    pub(crate) fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// Adds the sequence of mass pairs `singly[i], doubly[i]`, labeling the
    /// node at depth `i + 1` with the first `i + 1` characters of `kmer`.
    pub(crate) fn insert(&mut self, singly: &[f64], doubly: &[f64], kmer: &str) -> Result<()> {
        let epsilon = self.config.epsilon();
        let masses = validate(singly, doubly, epsilon)?;
        let labels = kmer_prefixes(kmer, masses.len());
        let entry = self.sequences.len();
        self.sequences.push(masses.as_slice().into());

        let (cached, in_order) = match &self.previous {
            Some(prev) => (
                prev.common_prefix_len(&masses, epsilon),
                prev.is_less_than(&masses),
            ),
            None => (0, false),
        };
        if !in_order && self.previous.is_some() {
            self.stats.out_of_order += 1;
            debug!(kmer = %kmer, cached, "out-of-order insertion, matching prefix against the graph");
        }

        self.minimize(cached);
        debug_assert_eq!(self.frontier.len(), cached);
        debug_assert!(self.previous.as_ref().map_or(true, |prev| self
            .frontier
            .iter()
            .zip(&prev.nodes)
            .all(|(entry, &node)| entry.child == node)));

        let mut path: SmallVec<[NodeId; 32]> = self.frontier.iter().map(|e| e.child).collect();
        let divergence = path.last().copied().unwrap_or(NodeId::ROOT);
        let joins_graph = masses
            .get(cached)
            .is_some_and(|m| self.arena.get(divergence).find_edge(m, epsilon).is_some());
        let shared = if in_order && !joins_graph {
            cached
        } else {
            self.adopt_graph_prefix(&masses, &mut path)
        };

        let mut labeled = false;
        for (depth, (&node, label)) in path.iter().zip(&labels).enumerate() {
            labeled |= self.label(node, label, Origin { entry, depth: depth + 1 });
        }

        let mut current = path.last().copied().unwrap_or(NodeId::ROOT);
        for (depth, (&mass, label)) in masses.iter().zip(&labels).enumerate().skip(shared) {
            let origin = Origin { entry, depth: depth + 1 };
            let child = self.arena.add_child(current, mass, label, origin);
            labeled = true;
            self.frontier.push(FrontierEntry {
                parent: current,
                child,
                mass,
            });
            path.push(child);
            current = child;
        }
        debug_assert_ne!(current, NodeId::ROOT);
        self.arena.get_mut(current).set_terminal();
        if !labeled {
            // Same masses and k-mer as an earlier insertion.
            self.sequences.pop();
        }

        self.previous = Some(PreviousSequence {
            masses: masses.into_vec(),
            nodes: path.into_vec(),
        });
        self.stats.insertions += 1;
        Ok(())
    }

    /// Follows `masses` from the end of `path` through the minimized graph
    /// and puts every node reached this way back onto the frontier.
    ///
    /// A node with a single incoming edge is taken off the registry and
    /// reopened in place. A node shared by several parents is copied instead,
    /// and only the edge on this path is moved to the copy (see
    /// [`split_off`](Self::split_off)). Returns the length of the resulting
    /// shared prefix.
    fn adopt_graph_prefix(&mut self, masses: &[MassPair], path: &mut SmallVec<[NodeId; 32]>) -> usize {
        let epsilon = self.config.epsilon();
        let mut parent = path.last().copied().unwrap_or(NodeId::ROOT);
        while let Some(mass) = masses.get(path.len()) {
            let Some(edge) = self.arena.get(parent).find_edge(mass, epsilon).copied() else {
                break;
            };
            let child = if self.arena.in_degree(edge.target) > 1 {
                let copy = self.split_off(edge.target, &masses[..=path.len()]);
                let moved = self
                    .arena
                    .retarget(parent, &edge.mass, edge.target, copy, epsilon);
                debug_assert!(moved, "edge {edge:?} vanished while copying");
                trace!(shared = ?edge.target, copy = ?copy, "copied shared node onto the frontier");
                copy
            } else {
                self.unregister(edge.target);
                edge.target
            };
            self.frontier.push(FrontierEntry {
                parent,
                child,
                mass: edge.mass,
            });
            path.push(child);
            parent = child;
        }
        path.len()
    }

    /// Copies `shared`, the node reached by following `route` from the root.
    ///
    /// Every node above it on `route` has a single incoming edge, so `route`
    /// is the only path to the copy once the caller moves the last edge. The
    /// copy keeps the labels of sequences that follow `route`; `shared`
    /// keeps the rest.
    fn split_off(&mut self, shared: NodeId, route: &[MassPair]) -> NodeId {
        let epsilon = self.config.epsilon();
        let sequences = &self.sequences;
        let on_route = |origin: Origin| follows(sequences, origin, route, epsilon);
        let mut node = self.arena.get(shared).clone();
        node.retain_labels(&on_route);
        self.arena
            .get_mut(shared)
            .retain_labels(|origin| !on_route(origin));
        self.arena.alloc(node)
    }

    /// Labels `node` with `kmer` unless a sequence with the same masses up to
    /// `node` already did. Returns true if the label was new.
    fn label(&mut self, node: NodeId, kmer: &str, origin: Origin) -> bool {
        let epsilon = self.config.epsilon();
        let sequences = &self.sequences;
        let route = &sequences[origin.entry][..origin.depth];
        self.arena
            .get_mut(node)
            .add_kmer(kmer, origin, |known| follows(sequences, known, route, epsilon))
    }

    /// Removes `node` from the registry if it is the canonical node of its key.
    fn unregister(&mut self, node: NodeId) {
        let key = self.key_of(node);
        if self.registry.get(&key) == Some(&node) {
            self.registry.remove(&key);
        }
    }

    /// Minimizes the frontier from its tail down to `down_to` entries.
    ///
    /// Each popped child either becomes the canonical node for its structural
    /// key, or is folded into the canonical node already registered under
    /// that key and released.
    pub(crate) fn minimize(&mut self, down_to: usize) {
        let epsilon = self.config.epsilon();
        while self.frontier.len() > down_to {
            let Some(entry) = self.frontier.pop() else {
                break;
            };
            let key = self.key_of(entry.child);
            match self.registry.get(&key).copied() {
                Some(canonical) => {
                    debug_assert_ne!(canonical, entry.child);
                    self.absorb(entry.child, canonical);
                    let moved = self
                        .arena
                        .retarget(entry.parent, &entry.mass, entry.child, canonical, epsilon);
                    debug_assert!(moved, "frontier edge {entry:?} vanished");
                    self.arena.release(entry.child);
                    self.stats.merged += 1;
                    trace!(child = ?entry.child, canonical = ?canonical, "merged duplicate node");
                }
                None => {
                    self.registry.insert(key, entry.child);
                    self.stats.registered += 1;
                    trace!(node = ?entry.child, "registered canonical node");
                }
            }
        }
    }

    /// Folds `duplicate` into `canonical`.
    ///
    /// Labels are unioned. Each outgoing edge of the duplicate either meets an
    /// edge of the canonical node with the same masses and an equivalent
    /// target, whose k-mers are then unioned the same way, or is attached to
    /// the canonical node as a new edge.
    fn absorb(&mut self, duplicate: NodeId, canonical: NodeId) {
        let mut pending = vec![(duplicate, canonical)];
        let mut seen = HashSet::new();
        while let Some((from, into)) = pending.pop() {
            if from == into || !seen.insert((from, into)) {
                continue;
            }
            let source = self.arena.get(from).clone();
            for (kmer, origin) in source.labels() {
                self.label(into, kmer, origin);
            }

            let mut stale_key = None;
            for edge in source.edges() {
                if let Some(existing) = self.equivalent_edge(into, edge) {
                    pending.push((edge.target, existing));
                } else if self.reaches(edge.target, into) {
                    trace!(node = ?into, edge = ?edge, "skipped edge that would close a cycle");
                } else {
                    if stale_key.is_none() {
                        stale_key = Some(self.key_of(into));
                    }
                    self.arena.push_edge(into, *edge);
                }
            }
            if let Some(old) = stale_key {
                self.rekey(into, old);
            }
        }
    }

    /// Target of an edge of `node` with the same masses as `edge` leading to
    /// the same or a structurally equal node.
    fn equivalent_edge(&self, node: NodeId, edge: &Edge) -> Option<NodeId> {
        let epsilon = self.config.epsilon();
        let mut candidates = self
            .arena
            .get(node)
            .edges()
            .iter()
            .filter(|e| e.mass.approx_eq(&edge.mass, epsilon));
        let key = self.key_of(edge.target);
        candidates
            .find(|e| e.target == edge.target || self.key_of(e.target) == key)
            .map(|e| e.target)
    }

    /// True if `target` can be reached from `from`.
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.arena.get(id).edges().iter().map(|e| e.target));
            }
        }
        false
    }

    /// Re-registers a canonical node whose edges changed.
    fn rekey(&mut self, node: NodeId, old: StructuralKey) {
        if self.registry.get(&old) == Some(&node) {
            self.registry.remove(&old);
        }
        let key = self.key_of(node);
        self.registry.entry(key).or_insert(node);
    }

    fn key_of(&self, node: NodeId) -> StructuralKey {
        self.arena
            .get(node)
            .structural_key(self.config.epsilon(), self.config.equivalence())
    }

    /// Minimizes everything left on the frontier.
    ///
    /// The previous-sequence cache is dropped as well: its nodes may have been
    /// released, so later insertions match their prefix against the graph.
    pub(crate) fn finish(&mut self) {
        self.minimize(0);
        self.previous = None;
        debug!(
            nodes = self.arena.len(),
            slots = self.arena.slots(),
            registered = self.registry_len(),
            merged = self.stats.merged,
            "minimized mass dawg"
        );
    }
}

/// True if the sequence behind `origin` reaches its labeled node through the
/// masses of `route`.
fn follows(sequences: &[Box<[MassPair]>], origin: Origin, route: &[MassPair], epsilon: f64) -> bool {
    origin.depth == route.len()
        && sequences[origin.entry][..origin.depth]
            .iter()
            .zip(route)
            .all(|(a, b)| a.approx_eq(b, epsilon))
}

/// Checks the input and pairs up the two mass sequences.
fn validate(singly: &[f64], doubly: &[f64], epsilon: f64) -> Result<SmallVec<[MassPair; 32]>> {
    if singly.len() != doubly.len() {
        return Err(DawgError::LengthMismatch {
            singly: singly.len(),
            doubly: doubly.len(),
        });
    }
    if singly.is_empty() {
        return Err(DawgError::EmptySequence);
    }
    if let Some((index, &mass)) = singly
        .iter()
        .enumerate()
        .chain(doubly.iter().enumerate())
        .find(|(_, m)| !m.is_finite())
    {
        return Err(DawgError::NonFiniteMass { index, mass });
    }
    let limit = max_keyable_mass(epsilon);
    if let Some((index, &mass)) = singly
        .iter()
        .enumerate()
        .chain(doubly.iter().enumerate())
        .find(|(_, m)| m.abs() > limit)
    {
        return Err(DawgError::MassOutOfRange { index, mass, limit });
    }
    Ok(singly
        .iter()
        .zip(doubly)
        .map(|(&s, &d)| MassPair::new(s, d))
        .collect())
}

/// The first `1..=len` characters of `kmer`, clamped to its length.
fn kmer_prefixes(kmer: &str, len: usize) -> SmallVec<[&str; 32]> {
    let mut ends = kmer
        .char_indices()
        .skip(1)
        .map(|(i, _)| i)
        .chain(std::iter::once(kmer.len()));
    (0..len)
        .map(|_| &kmer[..ends.next().unwrap_or(kmer.len())])
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dawg::config::{Equivalence, DEFAULT_EPSILON};

    fn doubly(singly: &[f64]) -> Vec<f64> {
        singly.iter().map(|s| (s + 1.007) / 2.0).collect()
    }

    fn insert(b: &mut BuilderCore, singly: &[f64], kmer: &str) {
        b.insert(singly, &doubly(singly), kmer).unwrap();
    }

    fn child(b: &BuilderCore, node: NodeId, singly: f64) -> NodeId {
        b.arena()
            .get(node)
            .edges()
            .iter()
            .find(|e| (e.mass.singly - singly).abs() < 1e-9)
            .map(|e| e.target)
            .unwrap_or_else(|| panic!("no edge {singly} from {node:?}"))
    }

    fn walk(b: &BuilderCore, singly: &[f64]) -> NodeId {
        singly
            .iter()
            .fold(NodeId::ROOT, |node, &s| child(b, node, s))
    }

    fn prev(singly: &[f64]) -> PreviousSequence {
        PreviousSequence {
            masses: singly
                .iter()
                .zip(doubly(singly))
                .map(|(&s, d)| MassPair::new(s, d))
                .collect(),
            nodes: Vec::new(),
        }
    }

    fn pairs(singly: &[f64]) -> Vec<MassPair> {
        prev(singly).masses
    }

    #[test]
    fn ordering_rule() {
        let p = prev(&[100.0, 200.0, 300.0]);
        assert!(p.is_less_than(&pairs(&[100.0, 250.0])));
        assert!(p.is_less_than(&pairs(&[100.0, 200.0, 300.0])));
        assert!(p.is_less_than(&pairs(&[100.0, 200.0, 300.0, 400.0])));
        assert!(!p.is_less_than(&pairs(&[100.0, 200.0])));
        assert!(!p.is_less_than(&pairs(&[100.0, 150.0, 900.0])));
        assert!(!p.is_less_than(&pairs(&[50.0])));
    }

    #[test]
    fn ordering_rule_needs_both_masses_larger_to_short_circuit() {
        let p = PreviousSequence {
            masses: vec![MassPair::new(100.0, 50.0), MassPair::new(200.0, 100.0)],
            nodes: Vec::new(),
        };
        // Singly grows but doubly stays put: keep scanning.
        let new = [MassPair::new(110.0, 50.0), MassPair::new(150.0, 100.0)];
        assert!(!p.is_less_than(&new));
        let new = [MassPair::new(110.0, 50.0), MassPair::new(250.0, 120.0)];
        assert!(p.is_less_than(&new));
    }

    #[test]
    fn prefixes_follow_characters() {
        assert_eq!(kmer_prefixes("ABC", 3).as_slice(), ["A", "AB", "ABC"]);
        assert_eq!(kmer_prefixes("ÅÄÖ", 2).as_slice(), ["Å", "ÅÄ"]);
        assert_eq!(kmer_prefixes("AB", 4).as_slice(), ["A", "AB", "AB", "AB"]);
        assert_eq!(kmer_prefixes("", 1).as_slice(), [""]);
    }

    #[test]
    fn invalid_input_is_rejected_before_mutation() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0], "AB");
        assert_eq!(
            b.insert(&[1.0, 2.0], &[1.0], "AB"),
            Err(DawgError::LengthMismatch {
                singly: 2,
                doubly: 1
            })
        );
        assert_eq!(b.insert(&[], &[], "AB"), Err(DawgError::EmptySequence));
        assert!(matches!(
            b.insert(&[1.0, f64::NAN], &[1.0, 2.0], "AB"),
            Err(DawgError::NonFiniteMass { index: 1, .. })
        ));
        let limit = max_keyable_mass(DEFAULT_EPSILON);
        assert_eq!(
            b.insert(&[1.0, 2.0], &[1.0, limit * 2.0], "AB"),
            Err(DawgError::MassOutOfRange {
                index: 1,
                mass: limit * 2.0,
                limit
            })
        );
        assert_eq!(b.frontier.len(), 2);
        assert_eq!(b.sequences.len(), 1);
        assert_eq!(b.stats().insertions, 1);
        assert_eq!(b.arena().len(), 3);
    }

    #[test]
    fn frontier_keeps_the_shared_prefix() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0, 300.0], "ABC");
        let first: Vec<_> = b.frontier.iter().map(|e| e.child).collect();
        insert(&mut b, &[100.0, 200.0, 400.0], "ABD");
        assert_eq!(b.frontier.len(), 3);
        assert_eq!(b.frontier[0].child, first[0]);
        assert_eq!(b.frontier[1].child, first[1]);
        assert_ne!(b.frontier[2].child, first[2]);
        assert_eq!(b.stats().registered, 1);
    }

    #[test]
    fn shared_prefix_nodes_collect_every_kmer() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0, 300.0], "ABC");
        insert(&mut b, &[100.0, 200.0, 400.0], "ABD");
        b.finish();
        assert_eq!(b.arena().get(walk(&b, &[100.0])).kmers(), ["A"]);
        assert_eq!(b.arena().get(walk(&b, &[100.0, 200.0])).kmers(), ["AB"]);
        let leaf = walk(&b, &[100.0, 200.0, 300.0]);
        assert_eq!(leaf, walk(&b, &[100.0, 200.0, 400.0]));
        assert_eq!(b.arena().get(leaf).kmers(), ["ABC", "ABD"]);
    }

    #[test]
    fn reinserting_is_idempotent() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0], "AB");
        insert(&mut b, &[100.0, 200.0], "AB");
        b.finish();
        let leaf = walk(&b, &[100.0, 200.0]);
        assert_eq!(b.arena().get(leaf).kmers(), ["AB"]);
        assert_eq!(b.arena().get(leaf).labels().count(), 1);
        assert_eq!(b.arena().get(NodeId::ROOT).edges().len(), 1);
        assert_eq!(b.stats().out_of_order, 0);
        assert_eq!(b.sequences.len(), 1);
    }

    #[test]
    fn finish_merges_equal_suffixes() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[150.0, 350.0, 600.6, 800.8], "XYCD");
        insert(&mut b, &[200.2, 400.4, 600.6, 800.8], "ABCD");
        b.finish();
        let xyc = walk(&b, &[150.0, 350.0, 600.6]);
        assert_eq!(xyc, walk(&b, &[200.2, 400.4, 600.6]));
        assert_eq!(b.arena().get(xyc).kmers(), ["XYC", "ABC"]);
        let xy = walk(&b, &[150.0, 350.0]);
        assert_eq!(xy, walk(&b, &[200.2, 400.4]));
        assert_eq!(b.arena().get(xy).kmers(), ["XY", "AB"]);
        assert_ne!(walk(&b, &[150.0]), walk(&b, &[200.2]));
        assert_eq!(b.stats().merged, 3);
    }

    #[test]
    fn out_of_order_insert_reuses_the_graph_prefix() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0, 350.0, 450.0], "ABYZ");
        insert(&mut b, &[100.0, 200.0, 300.0, 400.0], "ABCD");
        b.finish();
        assert_eq!(b.stats().out_of_order, 1);
        assert_eq!(b.arena().get(NodeId::ROOT).edges().len(), 1);
        let ab = walk(&b, &[100.0, 200.0]);
        assert_eq!(b.arena().get(ab).edges().len(), 2);
        assert_eq!(b.arena().get(ab).kmers(), ["AB"]);
    }

    #[test]
    fn out_of_order_insert_reopens_minimized_nodes() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0, 300.0], "AGC");
        insert(&mut b, &[150.0, 350.0, 450.0], "PQR");
        // Shares [100.0] with a sequence that is already minimized.
        insert(&mut b, &[100.0, 250.0, 400.0], "AKL");
        b.finish();
        assert_eq!(b.stats().out_of_order, 1);
        assert_eq!(b.arena().get(NodeId::ROOT).edges().len(), 2);
        let a = walk(&b, &[100.0]);
        assert_eq!(b.arena().get(a).kmers(), ["A"]);
        assert_eq!(b.arena().get(a).edges().len(), 2);
        assert_eq!(b.arena().get(walk(&b, &[100.0, 250.0])).kmers(), ["AK"]);
        assert_eq!(b.arena().get(walk(&b, &[100.0, 200.0])).kmers(), ["AG"]);
        // root, A, AG, AK, P, PQ and the shared leaf
        assert_eq!(b.arena().len(), 7);
    }

    #[test]
    fn shared_nodes_are_copied_before_they_change() {
        let config = DawgConfig::default().with_equivalence(Equivalence::Subgraph);
        let mut b = BuilderCore::new(config);
        insert(&mut b, &[100.0, 200.0], "AB");
        insert(&mut b, &[150.0, 200.0], "XB");
        b.finish();
        let shared = walk(&b, &[150.0]);
        assert_eq!(shared, walk(&b, &[100.0]));
        assert_eq!(b.arena().in_degree(shared), 2);

        insert(&mut b, &[100.0, 200.0, 300.0], "ABC");
        b.finish();
        assert_eq!(walk(&b, &[150.0]), shared);
        assert_ne!(walk(&b, &[100.0]), shared);
        assert_eq!(b.arena().in_degree(shared), 1);
        assert!(b.arena().get(walk(&b, &[150.0, 200.0])).edges().is_empty());
        let abc = walk(&b, &[100.0, 200.0, 300.0]);
        assert!(b.arena().get(abc).is_terminal());

        // Each side of the split keeps only the labels of its own path.
        assert_eq!(b.arena().get(walk(&b, &[100.0])).kmers(), ["A"]);
        assert_eq!(b.arena().get(shared).kmers(), ["X"]);
        assert_eq!(b.arena().get(walk(&b, &[100.0, 200.0])).kmers(), ["AB"]);
        // Both leaves are terminal without edges, so they merge again.
        assert_eq!(abc, walk(&b, &[150.0, 200.0]));
        assert_eq!(b.arena().get(abc).kmers(), ["XB", "ABC"]);
    }

    #[test]
    fn splitting_a_merged_node_keeps_labels_on_their_own_path() {
        for equivalence in [Equivalence::MassShape, Equivalence::Subgraph] {
            let config = DawgConfig::default().with_equivalence(equivalence);
            let mut b = BuilderCore::new(config);
            insert(&mut b, &[10.0, 30.0, 60.0], "ABC");
            b.finish();
            insert(&mut b, &[20.0, 30.0, 60.0], "XBC");
            b.finish();
            let merged = walk(&b, &[10.0]);
            assert_eq!(merged, walk(&b, &[20.0]), "{equivalence:?}");
            assert_eq!(b.arena().get(merged).kmers(), ["A", "X"]);

            insert(&mut b, &[20.0, 40.0], "XD");
            b.finish();
            assert_eq!(b.arena().get(walk(&b, &[10.0])).kmers(), ["A"]);
            assert_eq!(b.arena().get(walk(&b, &[20.0])).kmers(), ["X"]);
            let mut ab = b.arena().get(walk(&b, &[10.0, 30.0])).kmers().to_vec();
            ab.sort();
            assert_eq!(ab, ["AB", "XB"], "{equivalence:?}");
            let leaf = walk(&b, &[20.0, 40.0]);
            assert_eq!(leaf, walk(&b, &[10.0, 30.0, 60.0]));
            assert_eq!(b.arena().get(leaf).kmers(), ["ABC", "XBC", "XD"]);
        }
    }

    #[test]
    fn insert_after_finish_keeps_the_graph_minimal() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0, 300.0], "ABC");
        insert(&mut b, &[150.0, 250.0, 300.0], "XYC");
        b.finish();
        let live = b.arena().len();
        insert(&mut b, &[100.0, 200.0, 300.0], "ABC");
        b.finish();
        assert_eq!(b.arena().len(), live);
        assert_eq!(b.arena().get(NodeId::ROOT).edges().len(), 2);
        let leaf = walk(&b, &[100.0, 200.0, 300.0]);
        let mut kmers = b.arena().get(leaf).kmers().to_vec();
        kmers.sort();
        assert_eq!(kmers, ["ABC", "XYC"]);
        assert_eq!(b.arena().get(walk(&b, &[100.0, 200.0])).labels().count(), 2);
        assert_eq!(b.sequences.len(), 2);
    }

    #[test]
    fn extending_after_finish_adds_a_branch() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[100.0, 200.0], "AB");
        b.finish();
        insert(&mut b, &[100.0, 200.0, 300.0], "ABC");
        b.finish();
        let ab = walk(&b, &[100.0, 200.0]);
        assert!(b.arena().get(ab).is_terminal());
        let abc = walk(&b, &[100.0, 200.0, 300.0]);
        assert!(b.arena().get(abc).is_terminal());
        assert_eq!(b.arena().get(abc).kmers(), ["ABC"]);
    }

    #[test]
    fn mass_shape_merges_nodes_with_equal_outgoing_masses() {
        let mut b = BuilderCore::new(DawgConfig::default());
        insert(&mut b, &[10.0, 20.0, 30.0], "ABC");
        insert(&mut b, &[15.0, 20.0, 40.0], "XBD");
        b.finish();
        let a = walk(&b, &[10.0]);
        assert_eq!(a, walk(&b, &[15.0]));
        assert_eq!(b.arena().get(a).kmers(), ["A", "X"]);
        // The differing subtrees both hang off the merged node.
        assert_eq!(b.arena().get(a).edges().len(), 2);
    }

    #[test]
    fn subgraph_equivalence_keeps_differing_subtrees_apart() {
        let config = DawgConfig::default().with_equivalence(Equivalence::Subgraph);
        let mut b = BuilderCore::new(config);
        insert(&mut b, &[10.0, 20.0, 30.0], "ABC");
        insert(&mut b, &[15.0, 20.0, 40.0], "XBD");
        b.finish();
        assert_ne!(walk(&b, &[10.0]), walk(&b, &[15.0]));
        assert_eq!(walk(&b, &[10.0, 20.0, 30.0]), walk(&b, &[15.0, 20.0, 40.0]));
    }

    #[test]
    fn registry_holds_each_key_once() {
        let mut b = BuilderCore::new(DawgConfig::default());
        for (singly, kmer) in [
            ([100.0, 200.0], "AB"),
            ([100.0, 300.0], "AC"),
            ([150.0, 200.0], "XB"),
        ] {
            insert(&mut b, &singly, kmer);
        }
        b.finish();
        let keys: HashSet<_> = b.registry.keys().cloned().collect();
        assert_eq!(keys.len(), b.registry_len());
        for &node in b.registry.values() {
            assert_ne!(node, NodeId::ROOT);
        }
    }
}
