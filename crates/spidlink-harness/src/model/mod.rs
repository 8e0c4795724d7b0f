//! Reference model for model-based testing.
//!
//! The model is a simplified implementation that captures the pairing rules
//! with plain indices instead of UUIDs and no storage layer. It serves as the
//! oracle against which the real coordinator is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Captures WHAT, not HOW: faults are modelled by their effect on the two
//!   records, not by replaying writes
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod world;

pub use operation::{
    ExpectedError, FaultPlan, ModelLock, ModelSpidId, ModelUserId, Operation, OperationResult,
};
pub use world::{ModelWorld, ObservableState};
