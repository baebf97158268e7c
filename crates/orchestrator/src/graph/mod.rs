//! Stack parser & planner — linked-data graph document in, validated
//! deployment plan out.
//!
//! The pipeline runs shape validation, stack-node extraction, host mapping
//! (through the resolver), topology bucketing, Kahn wave construction, and
//! spec validation, collecting warnings and errors separately. Warnings
//! never abort the pipeline; any error suppresses the plan.

pub mod parser;
pub mod plan;
pub mod serialize;
pub mod validate;
pub mod waves;

pub use parser::StackParser;
pub use plan::{DeploymentPlan, NetworkSpec, ParseResult, PlanError, Topology, TopologyNode};
pub use serialize::plan_to_definition;
pub use waves::build_waves;
