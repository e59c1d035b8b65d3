/// Incremental construction and minimization.
pub(crate) mod builder;
/// Construction and query tunables.
pub mod config;
/// Mass pairs, ppm conversion and tolerance windows.
pub mod mass;
/// Graph nodes, edges and label provenance.
pub(crate) mod node;
/// Index-addressed node storage.
pub(crate) mod node_arena;
/// The owning graph type and its read-only node views.
pub mod owned;
/// Exact and gap-tolerant queries.
pub(crate) mod search;

pub use builder::BuildStats;
pub use config::{DawgConfig, Equivalence, PrunePolicy, DEFAULT_EPSILON};
pub use mass::{ppm_to_da, MassPair, MassWindow};
pub use node_arena::NodeId;
pub use owned::{build_mass_dawg, ChildIter, MassDawg, NodeRef};
