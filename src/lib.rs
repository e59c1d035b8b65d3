//! # mass-dawg
//!
//! A deduplicating graph that maps sequences of fragment-ion masses to the
//! k-mers that produce them, for matching observed spectra against a
//! database of candidate sequences.
//!
//! Every inserted sequence is a list of `(singly, doubly)` mass pairs, one
//! pair per prefix of its k-mer. The graph is built incrementally in the
//! manner of a [DAWG](https://en.wikipedia.org/wiki/Deterministic_acyclic_finite_state_automaton)
//! ([Daciuk et al. (2000)](https://arxiv.org/abs/cs/0007009v1)): shared
//! prefixes become shared paths, and structurally equivalent nodes are merged
//! into one while keeping the k-mer labels of every path through them.
//!
//! ## Quick Start
//!
//! ```
//! use mass_dawg::dawg::MassDawg;
//!
//! let mut dawg = MassDawg::new();
//! dawg.insert(&[100.1, 200.2, 300.3], &[200.2, 400.4, 600.6], "ABC").unwrap();
//! dawg.insert(
//!     &[100.1, 200.2, 300.3, 400.4],
//!     &[200.2, 400.4, 600.6, 800.8],
//!     "ABCD",
//! )
//! .unwrap();
//! dawg.finish();
//!
//! let spectrum = [100.1, 200.2, 300.3, 400.4, 200.2, 400.4, 600.6, 800.8];
//! assert_eq!(dawg.search(&spectrum, 10), ["ABCD"]);
//! ```
//!
//! ## Gap-tolerant search
//!
//! [`fuzzy_search`](dawg::MassDawg::fuzzy_search) tolerates edges that match
//! none of the query values, up to a per-path allowance:
//!
//! ```
//! use mass_dawg::dawg::build_mass_dawg;
//!
//! let dawg = build_mass_dawg([
//!     (vec![100.0, 200.0, 300.0, 400.0], vec![50.0, 100.0, 150.0, 200.0], "ABCD"),
//! ])
//! .unwrap();
//!
//! // The first two edges match nothing.
//! assert!(dawg.fuzzy_search(&[300.0, 400.0], 1, 10).is_empty());
//! assert_eq!(dawg.fuzzy_search(&[300.0, 400.0], 2, 10), ["ABCD"]);
//! ```
//!
//! ## Configuration
//!
//! [`DawgConfig`](dawg::DawgConfig) selects the mass tolerance used while
//! building, which nodes minimization may merge and how matched query values
//! are consumed. Construction progress is reported through [`tracing`]; no
//! subscriber is installed by this crate.

#![warn(missing_docs)]

/// The mass graph: nodes, construction, queries and configuration.
pub mod dawg;
/// Errors returned by graph construction.
pub mod error;

pub use dawg::{build_mass_dawg, DawgConfig, MassDawg};
pub use error::{DawgError, Result};
