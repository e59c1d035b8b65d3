//! Tunables for building and querying a [`MassDawg`](super::MassDawg).

/// Default tolerance for treating two masses as the same edge during
/// construction.
pub const DEFAULT_EPSILON: f64 = 1e-4;

/// Which nodes minimization is allowed to merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Equivalence {
    /// Two nodes are equivalent when their terminal flags match and the
    /// sorted multisets of their outgoing mass pairs match. Deeper structure
    /// is reconciled while merging: children are unioned edge by edge.
    #[default]
    MassShape,
    /// Like [`MassShape`](Equivalence::MassShape), but the outgoing edges
    /// must also lead to the same canonical children. This is exact subgraph
    /// equivalence, i.e. classic DAWG minimization.
    Subgraph,
}

/// Which query values are consumed once an edge has matched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrunePolicy {
    /// Drop every value inside the doubly window and every value at or below
    /// the upper end of the singly window.
    ///
    /// Unlike [`BelowSinglyLower`](PrunePolicy::BelowSinglyLower) this
    /// consumes the whole singly window, so a second value close to the
    /// matched mass cannot survive into deeper edges.
    #[default]
    BelowSingly,
    /// Drop the first value that matched, every value inside the doubly
    /// window and every value at or below the lower end of the singly
    /// window. Other values inside the singly window are kept.
    BelowSinglyLower,
    /// Drop only the values inside the singly or doubly window.
    MatchedOnly,
}

/// Configuration of a [`MassDawg`](super::MassDawg).
///
/// ```
/// use mass_dawg::dawg::{DawgConfig, Equivalence, PrunePolicy};
///
/// let config = DawgConfig::default()
///     .with_epsilon(1e-3)
///     .with_equivalence(Equivalence::Subgraph)
///     .with_prune(PrunePolicy::MatchedOnly);
/// assert_eq!(config.epsilon(), 1e-3);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DawgConfig {
    epsilon: f64,
    equivalence: Equivalence,
    prune: PrunePolicy,
}

impl Default for DawgConfig {
    fn default() -> Self {
        DawgConfig {
            epsilon: DEFAULT_EPSILON,
            equivalence: Equivalence::default(),
            prune: PrunePolicy::default(),
        }
    }
}

impl DawgConfig {
    /// Sets the mass equality tolerance used for prefix matching and for
    /// quantizing structural keys.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not a positive finite number.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        assert!(
            epsilon.is_finite() && epsilon > 0.0,
            "epsilon must be positive and finite, got {epsilon}"
        );
        self.epsilon = epsilon;
        self
    }

    /// Sets the node equivalence used by minimization.
    pub fn with_equivalence(mut self, equivalence: Equivalence) -> Self {
        self.equivalence = equivalence;
        self
    }

    /// Sets the pruning policy used by both query algorithms.
    pub fn with_prune(mut self, prune: PrunePolicy) -> Self {
        self.prune = prune;
        self
    }

    /// Mass equality tolerance.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Node equivalence used by minimization.
    pub fn equivalence(&self) -> Equivalence {
        self.equivalence
    }

    /// Pruning policy used by the queries.
    pub fn prune(&self) -> PrunePolicy {
        self.prune
    }
}
