//! Deterministic test harness for the Spidlink association protocol.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the pairing
//! rules, including the exact effect of injected store faults. Operations are
//! applied to both the model and the real coordinator over a
//! `ChaoticStore`, and their results and observable states are compared.
//!
//! # Determinism
//!
//! [`SimEnv`] draws every identifier from a seeded RNG and [`FaultPlan`]
//! scripts store failures by write ordinal, so a failing sequence replays
//! exactly from its seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;

pub use model::{
    ExpectedError, FaultPlan, ModelLock, ModelSpidId, ModelUserId, ModelWorld, ObservableState,
    Operation, OperationResult,
};
pub use sim_env::SimEnv;
