//! The error type shared by every crate that sits on a Supervisor's path.
//!
//! `kco-common` sits below `kco-http`, so `Transport` carries a `String`
//! rather than `kco_http::QueryError` directly — `kco-http` converts its own
//! error into this variant at the call boundary instead of `kco-common`
//! depending upward on it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KcoError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("pod discovery failed: {0}")]
    Discovery(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("logical error: {0}")]
    Logical(String),

    #[error("rate limit exhausted")]
    RateExhausted,

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KcoError>;
