//! Crowdchain Governance - proposal voting and timelocked execution.
//!
//! This crate provides:
//! - Checkpointed voting power with delegation
//! - The proposal state machine (propose, vote, queue, execute, cancel)
//! - A role-gated scheduler that enforces a minimum delay before any
//!   approved action batch touches its targets

pub mod proposal;
pub mod votes;
pub mod governor;
pub mod timelock;
pub mod error;

pub use proposal::{hash_description, hash_proposal, ActionBatch, Proposal, ProposalState, VoteRecord, VoteSupport};
pub use votes::{Checkpoint, VotingPowerLedger};
pub use governor::{GovernorEvent, GovernorSettings, ProposalGovernor};
pub use timelock::{hash_operation, CallDispatcher, OperationState, Role, ScheduledOperation, Scheduler, TimelockEvent};
pub use error::{ErrorClass, ErrorKind, GovernanceError};
