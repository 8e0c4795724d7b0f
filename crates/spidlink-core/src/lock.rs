//! Lock state machine.
//!
//! Governs which logical lock transitions the server records for a spid. No
//! actuation or timing is modelled; the device reports its own physical
//! state through telemetry.
//!
//! # Transition Table
//!
//! ```text
//! Locked ──► Unlocked
//! Unlocked ──► Locked
//! ```
//!
//! Same-state requests are governed by [`SameStatePolicy`].

use std::fmt;

use spidlink_proto::WireLockState;
use thiserror::Error;

/// Physical lock state of a spid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    /// Lock engaged.
    Locked,
    /// Lock released.
    Unlocked,
}

impl LockState {
    /// Wire code for this state.
    pub fn code(self) -> WireLockState {
        match self {
            Self::Locked => WireLockState::LOCKED,
            Self::Unlocked => WireLockState::UNLOCKED,
        }
    }
}

impl TryFrom<WireLockState> for LockState {
    type Error = TransitionError;

    fn try_from(code: WireLockState) -> Result<Self, Self::Error> {
        match code {
            WireLockState::LOCKED => Ok(Self::Locked),
            WireLockState::UNLOCKED => Ok(Self::Unlocked),
            WireLockState(code) => Err(TransitionError::UnknownState { code }),
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// Allowed `(from, to)` transitions between distinct states.
const TRANSITIONS: &[(LockState, LockState)] =
    &[(LockState::Locked, LockState::Unlocked), (LockState::Unlocked, LockState::Locked)];

/// How to treat a request for the state the lock is already in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameStatePolicy {
    /// Accept as a no-op.
    #[default]
    Accept,
    /// Reject with [`TransitionError::NotReachable`].
    Reject,
}

/// Rejected lock transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Wire code does not name a lock state.
    #[error("unknown lock state code {code}")]
    UnknownState {
        /// Raw code received.
        code: u8,
    },

    /// No edge from the current state to the requested one.
    #[error("lock cannot go from {from} to {to}")]
    NotReachable {
        /// Current state.
        from: LockState,
        /// Requested state.
        to: LockState,
    },
}

/// Result of an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed.
    Changed {
        /// Previous state.
        from: LockState,
        /// New state.
        to: LockState,
    },
    /// Requested state equals the current one; nothing to record.
    Unchanged(LockState),
}

impl Transition {
    /// State after the transition.
    pub fn state(&self) -> LockState {
        match self {
            Self::Changed { to, .. } => *to,
            Self::Unchanged(state) => *state,
        }
    }

    /// Check if the transition modifies the spid.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Validates lock transitions against the transition table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockStateMachine {
    policy: SameStatePolicy,
}

impl LockStateMachine {
    /// Create a state machine with the given same-state policy.
    pub fn new(policy: SameStatePolicy) -> Self {
        Self { policy }
    }

    /// Configured same-state policy.
    pub fn policy(&self) -> SameStatePolicy {
        self.policy
    }

    /// Validate moving from `current` to `requested`.
    pub fn apply(
        &self,
        current: LockState,
        requested: LockState,
    ) -> Result<Transition, TransitionError> {
        if current == requested {
            return match self.policy {
                SameStatePolicy::Accept => Ok(Transition::Unchanged(current)),
                SameStatePolicy::Reject => {
                    Err(TransitionError::NotReachable { from: current, to: requested })
                },
            };
        }

        if TRANSITIONS.contains(&(current, requested)) {
            Ok(Transition::Changed { from: current, to: requested })
        } else {
            Err(TransitionError::NotReachable { from: current, to: requested })
        }
    }
}
