//! Generic actor runtime shared by the monitoring control plane.
//!
//! This crate carries no operator-specific types; it is the scheduling and
//! wiring substrate (`Actor`, `Addr`, `Builder`, `ActorSystem`, `Registry`,
//! `supervise`) on top of which `kco-core` builds the Rate Limiter actor and
//! the Controller's task bookkeeping.

pub mod actor;
pub mod builder;
pub mod rate;
pub mod registry;
pub mod supervise;
pub mod system;
