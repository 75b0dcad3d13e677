//! Shared domain types for the monitoring control plane.
//!
//! This crate defines the data model (`TAppConfig`, `StateSnapshot`,
//! `StateChange`, `ActionContext`, `ActionResult`, the cluster-event and
//! admission types), the shared error enum, and observability helpers used
//! throughout the `kco` workspace. It is intentionally lightweight and
//! dependency-minimal so that every crate can depend on it without pulling in
//! heavy transitive costs.
//!
//! # Overview
//!
//! - [`config`]: [`TAppConfig`], [`TriggerSpec`], [`ActionBinding`]
//! - [`state`]: [`StateSnapshot`], [`StateChange`], canonicalized checksums and structural diff
//! - [`action`]: [`ActionContext`], [`ActionResult`], [`ActionStatus`]
//! - [`event`]: [`ClusterEvent`], [`TargetAppEvent`], [`TargetAppStatus`]
//! - [`error`]: [`KcoError`] and [`Result`]
//! - [`observability`]: centralised tracing/logging initialisation

pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod observability;
pub mod state;

pub use action::{ActionContext, ActionResult, ActionStatus};
pub use config::{ActionBinding, Condition, TAppConfig, TriggerSpec};
pub use error::{KcoError, Result};
pub use event::{ClusterEvent, EventType, TargetAppEvent, TargetAppStatus};
pub use state::{StateChange, StateSnapshot};
