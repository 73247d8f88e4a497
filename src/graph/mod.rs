//! Graph utilities.
//!
//! Pure functions over the node/edge lists of a [`PipelineDefinition`]:
//!
//! - [`topo_sort`]: Kahn's algorithm with insertion-order tie breaking
//! - [`validate_pipeline`]: exhaustive structural validation (never fails fast)
//! - [`upstream_nodes`] / [`downstream_nodes`]: dependency traversal
//!
//! [`PipelineDefinition`]: crate::pipeline::PipelineDefinition

pub mod topo;
pub mod traverse;
pub mod validate;

pub use topo::topo_sort;
pub use traverse::{downstream_nodes, upstream_nodes};
pub use validate::validate_pipeline;
