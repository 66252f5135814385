//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod builder;
pub mod combiner;
pub mod communicator;
pub mod entities;
pub mod error;
pub mod norms;
pub mod tree_traits;

pub use builder::{build_dependency_graph, identify_internal_responses, OptimizationSettings};
pub use combiner::{
    combine_gradient, combine_responses_according_dependencies, combine_value,
    request_responses_according_dependencies,
};
pub use communicator::Communicator;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use norms::{max_nodal_norm, NormTracker};
pub use tree_traits::TreeNodeConvert;
