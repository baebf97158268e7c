//! Stack operations — the end-to-end surface tying the parser, placement
//! engine, deployer, and lifecycle together.

pub mod service;

pub use service::{StackService, StackView};
