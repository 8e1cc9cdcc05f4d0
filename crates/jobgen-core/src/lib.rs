#![forbid(unsafe_code)]
//! jobgen-core: the entity model shared by the job graph compiler.
//!
//! - `plan`: the optimizer's annotated DAG (arena of nodes and channels) and
//!   its depth-first visitor.
//! - `job`: the physical job graph (vertices, typed wires, instance sharing).
//! - `task_config`: the per-vertex configuration filled during generation.
//! - `config`: key/value configuration and the generator's resource defaults.
//!
//! No I/O and no runtime here.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod id;
pub mod job;
pub mod plan;
pub mod prelude;
pub mod strategy;
pub mod task_config;

pub use error::{Error, Result};
