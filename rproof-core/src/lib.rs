//! Shadow model of the solver's clause database and trail, and the
//! resolution-graph builder derived from it.
pub mod error;
pub mod graph_builder;
pub mod shadow;

pub use error::{CheckerError, Cref};
pub use graph_builder::{EdgeLabel, GraphBuilder, Statistics, VertexInfo};
pub use shadow::{IgnoreMode, SolverShadow, TrailItem};
