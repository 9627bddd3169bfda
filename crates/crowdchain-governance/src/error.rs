use crowdchain_types::{Address, Amount, Hash, Timestamp};
use thiserror::Error;

use crate::proposal::ProposalState;
use crate::timelock::Role;

/// Broad failure categories shared by every Crowdchain component.
///
/// None of them leave partial state behind; they differ in whether a caller
/// can reasonably try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad arguments: mismatched lengths, zero amounts, duplicate ids.
    Validation,
    /// Wrong caller, missing role or not the owner.
    Authorization,
    /// The entity is not in a state that allows the transition (yet).
    StatePrecondition,
    /// Insufficient funds or a failed value transfer.
    Resource,
}

/// Classification hook for errors raised by dispatch targets.
pub trait ErrorClass {
    fn kind(&self) -> ErrorKind;

    /// True when retrying can never succeed for the same entity.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Errors that can occur in governance operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(Hash),

    #[error("Proposal already exists: {0}")]
    ProposalAlreadyExists(Hash),

    #[error("Invalid vote type: {0}")]
    InvalidVoteType(u8),

    #[error("Lookup at {requested} is in the future (now {now})")]
    FutureLookup { requested: Timestamp, now: Timestamp },

    #[error("Proposer votes {votes} below threshold {threshold}")]
    BelowProposalThreshold { votes: Amount, threshold: Amount },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Account {account:?} is missing role {role:?}")]
    MissingRole { account: Address, role: Role },

    #[error("Proposal {id} is {current:?}, expected {expected}")]
    UnexpectedProposalState {
        id: Hash,
        current: ProposalState,
        expected: &'static str,
    },

    #[error("Voting is closed for proposal {0}")]
    VotingClosed(Hash),

    #[error("{voter:?} already voted on proposal {id}")]
    AlreadyVoted { id: Hash, voter: Address },

    #[error("Proposal expired: {0}")]
    ProposalExpired(Hash),

    #[error("Proposal canceled: {0}")]
    ProposalCanceled(Hash),

    #[error("Operation already scheduled: {0}")]
    OperationAlreadyScheduled(Hash),

    #[error("Operation not scheduled: {0}")]
    OperationNotScheduled(Hash),

    #[error("Operation {id} not ready until {ready_at} (now {now})")]
    NotReady { id: Hash, ready_at: Timestamp, now: Timestamp },

    #[error("Operation already executed: {0}")]
    AlreadyExecuted(Hash),

    #[error("Predecessor operation not executed: {0}")]
    PredecessorNotExecuted(Hash),

    #[error("Call {index} failed: {reason}")]
    CallFailed {
        index: usize,
        kind: ErrorKind,
        reason: String,
    },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::InvalidProposal(_)
            | GovernanceError::InvalidParameter(_)
            | GovernanceError::Encoding(_)
            | GovernanceError::ProposalNotFound(_)
            | GovernanceError::ProposalAlreadyExists(_)
            | GovernanceError::InvalidVoteType(_)
            | GovernanceError::FutureLookup { .. }
            | GovernanceError::OperationAlreadyScheduled(_) => ErrorKind::Validation,

            GovernanceError::BelowProposalThreshold { .. }
            | GovernanceError::Unauthorized(_)
            | GovernanceError::MissingRole { .. } => ErrorKind::Authorization,

            GovernanceError::UnexpectedProposalState { .. }
            | GovernanceError::VotingClosed(_)
            | GovernanceError::AlreadyVoted { .. }
            | GovernanceError::ProposalExpired(_)
            | GovernanceError::ProposalCanceled(_)
            | GovernanceError::OperationNotScheduled(_)
            | GovernanceError::NotReady { .. }
            | GovernanceError::AlreadyExecuted(_)
            | GovernanceError::PredecessorNotExecuted(_) => ErrorKind::StatePrecondition,

            GovernanceError::CallFailed { kind, .. } => *kind,

            GovernanceError::InsufficientBalance { .. } | GovernanceError::Overflow => ErrorKind::Resource,
        }
    }

    /// Whether the failure can never clear for this proposal or operation.
    pub fn is_terminal(&self) -> bool {
        match self {
            GovernanceError::ProposalExpired(_)
            | GovernanceError::ProposalCanceled(_)
            | GovernanceError::AlreadyExecuted(_) => true,
            GovernanceError::UnexpectedProposalState { current, .. } => current.is_final(),
            _ => false,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GovernanceError::NotReady { .. })
            || (self.kind() == ErrorKind::StatePrecondition && !self.is_terminal())
    }
}

impl ErrorClass for GovernanceError {
    fn kind(&self) -> ErrorKind {
        GovernanceError::kind(self)
    }

    fn is_terminal(&self) -> bool {
        GovernanceError::is_terminal(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::InvalidProposal("empty batch".to_string());
        assert!(err.to_string().contains("Invalid proposal"));
    }

    #[test]
    fn test_not_ready_is_retryable() {
        let err = GovernanceError::NotReady {
            id: Hash::ZERO,
            ready_at: 3600,
            now: 10,
        };
        assert_eq!(err.kind(), ErrorKind::StatePrecondition);
        assert!(err.is_retryable());
        assert!(!err.is_terminal());
        assert!(err.to_string().contains("3600"));
    }

    #[test]
    fn test_expired_is_terminal() {
        let err = GovernanceError::ProposalExpired(Hash::ZERO);
        assert!(err.is_terminal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_defeated_state_error_is_terminal() {
        let err = GovernanceError::UnexpectedProposalState {
            id: Hash::ZERO,
            current: ProposalState::Defeated,
            expected: "Succeeded",
        };
        assert!(err.is_terminal());

        let pending = GovernanceError::UnexpectedProposalState {
            id: Hash::ZERO,
            current: ProposalState::Pending,
            expected: "Active",
        };
        assert!(!pending.is_terminal());
        assert!(pending.is_retryable());
    }

    #[test]
    fn test_call_failure_keeps_inner_kind() {
        let err = GovernanceError::CallFailed {
            index: 0,
            kind: ErrorKind::Resource,
            reason: "insufficient treasury balance".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_role_error_is_authorization() {
        let err = GovernanceError::MissingRole {
            account: Address::ZERO,
            role: Role::Executor,
        };
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }
}
