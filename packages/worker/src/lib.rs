#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Background region composition for interactive navigation.
//!
//! Composing regions is the expensive part of changing the viewed date, and
//! a user stepping through time fires changes faster than compositions
//! finish. [`ComputeChannel`] waits for a quiet period before starting work
//! and runs the geometry on tokio's blocking pool. [`ViewSession`] owns the
//! viewed date and only accepts results computed for it.

pub mod channel;
pub mod session;

pub use channel::{
    ChannelConfig, ComputeChannel, ComputeRequest, ComputeResponse, DEFAULT_QUIESCENCE,
};
pub use session::{ActiveKey, ViewSession};
