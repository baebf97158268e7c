//! Container runtime access.
//!
//! [`RuntimeClient`] is the Bollard-backed client for one host's daemon;
//! domain methods live in sibling modules (`container`, `image`, `network`,
//! `volume`) which add `impl RuntimeClient` blocks. [`ops::RuntimeOps`] is
//! the object-safe interface the deployer consumes; `live.rs` implements it
//! for the real client and `fake.rs` provides a test double. [`pool`] owns
//! one client per host.

pub mod client;
pub mod container;
pub mod fake;
pub mod image;
pub mod live;
pub mod network;
pub mod ops;
pub mod pool;
pub mod volume;

pub use client::{Endpoint, RuntimeClient, RuntimeError};
pub use container::{ContainerRuntimeConfig, CreatedContainer, InspectedContainer};
pub use fake::FakeRuntime;
pub use network::{NetworkRuntimeConfig, NetworkView};
pub use ops::RuntimeOps;
pub use pool::RuntimePool;
pub use volume::VolumeView;
