#![forbid(unsafe_code)]
//! jobgen-compiler: lowers an optimized plan into a physical job graph.
//!
//! One `compile` call is a single depth-first walk over the plan:
//! - pre-visit materializes each node as a vertex, a chain record (the node
//!   is fused into its producer's thread) or nothing (unions);
//! - post-visit wires every input channel into a typed wire, splicing union
//!   branches and binding chains to their host vertices;
//! - finalization appends chains to their hosts, sets the instance type on
//!   the parallelism anchor and makes every other vertex share its instances.
//!
//! The generator keeps no state between calls; failures carry the node being
//! translated and never yield a partial graph.

pub mod chaining;
mod context;
pub mod error;
mod finalize;
pub mod generator;
mod materialize;
pub mod report;
pub mod resources;
mod traversal;
pub mod wiring;

pub use chaining::{can_chain, chaining_blocker, ChainBlocker};
pub use error::{CompileError, GenerationError, VisitPhase};
pub use generator::JobGraphGenerator;
pub use report::{CompileReport, Diagnostic, Placement};
pub use wiring::wire_for;
