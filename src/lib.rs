//! tnetck — consistency and dynamic-controllability checking for
//! conditional simple temporal networks.
//!
//! Given a directed multigraph whose nodes are timepoints and whose edges
//! carry labeled integer weights ("if this conjunction of observed
//! propositions holds, the delay from source to target is at most w"),
//! the engine decides whether an execution strategy exists that satisfies
//! every active constraint however contingent durations and observations
//! turn out. The STN/STNU fragments reduce to shortest-path reasoning;
//! the conditional fragments run a labeled-value propagation to a fixed
//! point or a negative self-loop witness.
//!
//! # Theoretical Basis
//!
//! - Dechter, R., Meiri, I. & Pearl, J. (1991). "Temporal constraint
//!   networks." Artificial Intelligence, 49(1–3), 61–95.
//! - Morris, P., Muscettola, N. & Vidal, T. (2001). "Dynamic control of
//!   plans with temporal uncertainty." IJCAI, 494–499.
//! - Tsamardinos, I., Vidal, T. & Pollack, M. (2003). "CTP: A new
//!   constraint-based formalism for conditional, temporal planning."
//!   Constraints, 8(4), 365–388.
//! - Hunsberger, L. & Posenato, R. (2016). "Checking the dynamic
//!   consistency of conditional temporal networks with bounded reaction
//!   times." ICAPS, 175–183.
//!
//! # Quick start
//!
//! ```
//! use tnetck::config::CheckOptions;
//! use tnetck::engine;
//! use tnetck::graph::{Edge, EdgeKind, Node, TNGraph};
//! use tnetck::label::Label;
//!
//! let mut g = TNGraph::new();
//! let z = g.add_node(Node::new("Z")).unwrap();
//! let x = g.add_node(Node::new("X")).unwrap();
//! let e = g.add_edge(Edge::new("ZX", z, x, EdgeKind::Requirement)).unwrap();
//! g.edge_mut(e).unwrap().values.put(Label::empty(), 10);
//!
//! let status = engine::check(&mut g, &CheckOptions::default()).unwrap();
//! assert!(status.consistency);
//! ```

pub mod alabel;
pub mod arith;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod graphml;
pub mod label;
pub mod labeled_values;
pub mod literal;
pub mod status;
pub mod upper_values;

pub use crate::config::CheckOptions;
pub use crate::engine::check;
pub use crate::error::{TnError, TnErrorKind};
pub use crate::graph::TNGraph;
pub use crate::label::Label;
pub use crate::labeled_values::LabeledValueMap;
pub use crate::status::CheckStatus;
