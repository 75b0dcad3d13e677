//! The monitoring control plane itself: the cluster abstraction, the state
//! store and event emitter, the pluggable action registry, and the
//! Supervisor/Controller that tie them together.

pub mod actions;
pub mod cluster;
pub mod controller;
pub mod events;
pub mod state_store;
pub mod supervisor;

pub use actions::{evaluate, ActionRegistry, Effector};
pub use cluster::{ClusterClient, ClusterError, ExecOutcome, FakeClusterClient, PodInfo};
pub use controller::{Controller, ControllerStats};
pub use events::EventEmitter;
pub use state_store::StateStore;
pub use supervisor::Supervisor;
