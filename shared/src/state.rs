//! Status state machines
//!
//! Every document status in the system (delivery challans, purchase orders,
//! goods receipts, approvals, reconciliation batches) is a small enum whose
//! legal moves are listed in one transition table. Handlers never compare
//! status strings directly; they call [`StateMachine::transition_to`].

use std::fmt;

use thiserror::Error;

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{entity} is {state} and can no longer be modified")]
    Terminal { entity: &'static str, state: String },

    #[error("{entity} cannot move from {from} to {to}")]
    Illegal {
        entity: &'static str,
        from: String,
        to: String,
    },
}

/// A status enum with an explicit transition table
pub trait StateMachine: Copy + Eq + fmt::Display + 'static {
    /// Human readable entity name used in error messages
    const ENTITY: &'static str;

    /// Legal `(from, to)` moves
    const TRANSITIONS: &'static [(Self, Self)];

    /// A state with no outgoing moves
    fn is_terminal(self) -> bool {
        !Self::TRANSITIONS.iter().any(|(from, _)| *from == self)
    }

    fn can_transition_to(self, next: Self) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|&(from, to)| from == self && to == next)
    }

    fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal {
                entity: Self::ENTITY,
                state: self.to_string(),
            });
        }
        if !self.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                entity: Self::ENTITY,
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }
}
