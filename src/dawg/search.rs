//! Tolerance-window queries over a built graph.
//!
//! Both walks compare the query values against the ppm windows of the graph's
//! edge masses. Once an edge matches, the consumed values are pruned from the
//! query according to the configured [`PrunePolicy`].

use super::config::PrunePolicy;
use super::mass::{MassPair, MassWindow};
use super::node::{Edge, MassNode};
use super::node_arena::{NodeArena, NodeId};

/// Singly and doubly windows of one edge.
#[derive(Clone, Copy, Debug)]
struct EdgeWindows {
    singly: MassWindow,
    doubly: MassWindow,
}

impl EdgeWindows {
    fn new(mass: &MassPair, ppm: u32) -> Self {
        EdgeWindows {
            singly: mass.singly_window(ppm),
            doubly: mass.doubly_window(ppm),
        }
    }

    fn contains(&self, value: f64) -> bool {
        self.singly.contains(value) || self.doubly.contains(value)
    }

    fn matches_any(&self, values: &[f64]) -> bool {
        values.iter().any(|&v| self.contains(v))
    }

    /// The values left for deeper edges after this edge matched.
    fn prune(&self, values: &[f64], policy: PrunePolicy) -> Vec<f64> {
        let matched = match policy {
            PrunePolicy::BelowSinglyLower => values.iter().position(|&v| self.contains(v)),
            _ => None,
        };
        values
            .iter()
            .enumerate()
            .filter(|&(i, &v)| match policy {
                PrunePolicy::BelowSingly => v > self.singly.upper && !self.doubly.contains(v),
                PrunePolicy::BelowSinglyLower => {
                    matched != Some(i) && v > self.singly.lower && !self.doubly.contains(v)
                }
                PrunePolicy::MatchedOnly => !self.contains(v),
            })
            .map(|(_, &v)| v)
            .collect()
    }
}

/// Follows the first matching edge from the root for as long as one matches
/// and returns the k-mers of the node where the walk stopped.
pub(crate) fn exact(arena: &NodeArena, policy: PrunePolicy, sequence: &[f64], ppm: u32) -> Vec<String> {
    let mut node = arena.get(NodeId::ROOT);
    let mut remaining = sequence.to_vec();
    loop {
        let step = node.edges().iter().find_map(|edge| {
            let windows = EdgeWindows::new(&edge.mass, ppm);
            windows.matches_any(&remaining).then_some((edge, windows))
        });
        let Some((edge, windows)) = step else {
            break;
        };
        remaining = windows.prune(&remaining, policy);
        node = arena.get(edge.target);
    }
    node.kmers().to_vec()
}

/// Depth-first walk that tolerates up to `gap_allowance` unmatched edges per
/// path.
///
/// A matched edge consumes values and keeps the gap count; an unmatched one
/// leaves the values alone and costs one gap. A path ends when it runs out of
/// values or gap budget, yielding the k-mers of its deepest matched node.
/// Results of all paths are concatenated in walk order, so the same k-mer may
/// appear more than once.
pub(crate) fn fuzzy(
    arena: &NodeArena,
    policy: PrunePolicy,
    sequence: &[f64],
    gap_allowance: u32,
    ppm: u32,
) -> Vec<String> {
    let walk = FuzzyWalk {
        arena,
        policy,
        ppm,
        gap_allowance,
    };
    walk.run(sequence)
}

struct FuzzyWalk<'a> {
    arena: &'a NodeArena,
    policy: PrunePolicy,
    ppm: u32,
    gap_allowance: u32,
}

/// A node whose children are being explored.
struct Frame<'a> {
    node: &'a MassNode,
    next: usize,
    remaining: Vec<f64>,
    /// Gap count the children are visited with.
    child_gap: u32,
    /// K-mers reported if no child yields anything; set for matched nodes.
    fallback: Option<&'a [String]>,
    found: Vec<String>,
}

enum Step<'a> {
    Done(Vec<String>),
    Descend(Frame<'a>),
}

impl<'a> FuzzyWalk<'a> {
    fn run(&self, sequence: &[f64]) -> Vec<String> {
        let mut stack = vec![Frame {
            node: self.arena.get(NodeId::ROOT),
            next: 0,
            remaining: sequence.to_vec(),
            child_gap: 0,
            fallback: None,
            found: Vec::new(),
        }];
        loop {
            let step = {
                let Some(top) = stack.last_mut() else {
                    return Vec::new();
                };
                let node = top.node;
                let edge = node.edges().get(top.next);
                top.next += 1;
                edge.map(|edge| self.visit(edge, &top.remaining, top.child_gap))
            };
            match step {
                Some(Step::Done(kmers)) => {
                    if let Some(top) = stack.last_mut() {
                        top.found.extend(kmers);
                    }
                }
                Some(Step::Descend(frame)) => stack.push(frame),
                None => {
                    let Some(frame) = stack.pop() else {
                        return Vec::new();
                    };
                    let result = if frame.found.is_empty() {
                        frame.fallback.map(labels).unwrap_or_default()
                    } else {
                        frame.found
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.found.extend(result),
                        None => return result,
                    }
                }
            }
        }
    }

    fn visit(&self, edge: &Edge, remaining: &[f64], gap: u32) -> Step<'a> {
        if gap > self.gap_allowance || remaining.is_empty() {
            return Step::Done(Vec::new());
        }
        let node = self.arena.get(edge.target);
        let windows = EdgeWindows::new(&edge.mass, self.ppm);
        if windows.matches_any(remaining) {
            let pruned = windows.prune(remaining, self.policy);
            if pruned.is_empty() {
                return Step::Done(labels(node.kmers()));
            }
            Step::Descend(Frame {
                node,
                next: 0,
                remaining: pruned,
                child_gap: gap,
                fallback: Some(node.kmers()),
                found: Vec::new(),
            })
        } else if gap + 1 > self.gap_allowance {
            Step::Done(Vec::new())
        } else {
            Step::Descend(Frame {
                node,
                next: 0,
                remaining: remaining.to_vec(),
                child_gap: gap + 1,
                fallback: None,
                found: Vec::new(),
            })
        }
    }
}

fn labels(kmers: &[String]) -> Vec<String> {
    kmers.iter().filter(|k| !k.is_empty()).cloned().collect()
}
