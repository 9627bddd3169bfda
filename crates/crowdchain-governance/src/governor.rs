//! Proposal governor.
//!
//! Accepts action batches as proposals, runs token-weighted voting against
//! snapshots from the [`VotingPowerLedger`], and hands approved batches to
//! the [`Scheduler`]. Only `eta`, `executed_at` and `canceled_at` are
//! stored; every other state is derived from the clock on each query.

use std::collections::HashMap;
use std::sync::Arc;

use crowdchain_types::{Address, Amount, Hash, SharedClock, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GovernanceError;
use crate::proposal::{hash_description, hash_proposal, validate_batch, ActionBatch, Proposal, ProposalState, VoteSupport};
use crate::timelock::{hash_operation, CallDispatcher, OperationState, Scheduler};
use crate::votes::VotingPowerLedger;

/// Basis-point denominator for the quorum fraction.
const BPS_DENOMINATOR: u128 = 10_000;

/// Voting and execution windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorSettings {
    /// Time between proposal creation and the snapshot
    pub voting_delay: u64,
    /// Length of the voting window after the snapshot
    pub voting_period: u64,
    /// Required participation, in basis points of total supply at the snapshot
    pub quorum_bps: u16,
    /// Minimum voting power needed to propose
    pub proposal_threshold: Amount,
    /// Time after `eta` during which a queued proposal may still execute
    pub grace_period: u64,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            voting_delay: 1,
            voting_period: 50,
            quorum_bps: 400,
            proposal_threshold: 0,
            grace_period: 1_209_600,
        }
    }
}

impl GovernorSettings {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidParameter("voting_period must be positive".to_string()));
        }
        if u128::from(self.quorum_bps) > BPS_DENOMINATOR {
            return Err(GovernanceError::InvalidParameter(format!(
                "quorum_bps {} exceeds {}",
                self.quorum_bps, BPS_DENOMINATOR
            )));
        }
        if self.grace_period == 0 {
            return Err(GovernanceError::InvalidParameter("grace_period must be positive".to_string()));
        }
        Ok(())
    }
}

/// Governor event log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GovernorEvent {
    ProposalCreated {
        id: Hash,
        proposer: Address,
        targets: Vec<Address>,
        values: Vec<Amount>,
        calldatas: Vec<Vec<u8>>,
        snapshot: Timestamp,
        deadline: Timestamp,
        description: String,
    },
    VoteCast {
        voter: Address,
        id: Hash,
        support: VoteSupport,
        weight: Amount,
        reason: String,
    },
    ProposalQueued {
        id: Hash,
        eta: Timestamp,
    },
    ProposalExecuted {
        id: Hash,
    },
    ProposalCanceled {
        id: Hash,
    },
}

/// Token-weighted governor bound to one scheduler.
#[derive(Debug)]
pub struct ProposalGovernor {
    /// Own address; the caller the scheduler sees
    address: Address,
    settings: GovernorSettings,
    clock: SharedClock,
    token: Arc<RwLock<VotingPowerLedger>>,
    proposals: HashMap<Hash, Proposal>,
    /// May cancel any pending proposal
    admin: Address,
    events: Vec<GovernorEvent>,
}

impl ProposalGovernor {
    pub fn new(
        address: Address,
        settings: GovernorSettings,
        clock: SharedClock,
        token: Arc<RwLock<VotingPowerLedger>>,
        admin: Address,
    ) -> Result<Self, GovernanceError> {
        settings.validate()?;
        info!(
            address = %address,
            voting_delay = settings.voting_delay,
            voting_period = settings.voting_period,
            quorum_bps = settings.quorum_bps,
            "governor created"
        );
        Ok(Self {
            address,
            settings,
            clock,
            token,
            proposals: HashMap::new(),
            admin,
            events: Vec::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    pub fn events(&self) -> &[GovernorEvent] {
        &self.events
    }

    pub fn proposal(&self, id: &Hash) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    /// Submit an action batch for voting.
    pub fn propose(
        &mut self,
        proposer: Address,
        targets: Vec<Address>,
        values: Vec<Amount>,
        calldatas: Vec<Vec<u8>>,
        description: &str,
    ) -> Result<Hash, GovernanceError> {
        validate_batch(&targets, &values, &calldatas)?;

        let now = self.clock.now();
        let votes = self.token.read().get_past_votes(&proposer, now)?;
        if votes < self.settings.proposal_threshold {
            return Err(GovernanceError::BelowProposalThreshold {
                votes,
                threshold: self.settings.proposal_threshold,
            });
        }

        let actions = ActionBatch::new(targets, values, calldatas)?;
        let id = actions.proposal_id(&hash_description(description))?;
        if self.proposals.contains_key(&id) {
            return Err(GovernanceError::ProposalAlreadyExists(id));
        }

        let snapshot = now.checked_add(self.settings.voting_delay).ok_or(GovernanceError::Overflow)?;
        let deadline = snapshot
            .checked_add(self.settings.voting_period)
            .ok_or(GovernanceError::Overflow)?;

        self.events.push(GovernorEvent::ProposalCreated {
            id,
            proposer,
            targets: actions.targets.clone(),
            values: actions.values.clone(),
            calldatas: actions.calldatas.clone(),
            snapshot,
            deadline,
            description: description.to_string(),
        });
        self.proposals.insert(
            id,
            Proposal::new(id, proposer, actions, description.to_string(), snapshot, deadline),
        );

        info!(proposal = %id.short(), proposer = %proposer, snapshot, deadline, "proposal created");
        Ok(id)
    }

    /// Current state, derived from the clock and the stored timestamps.
    pub fn state(&self, id: &Hash) -> Result<ProposalState, GovernanceError> {
        let proposal = self.get(id)?;

        if proposal.executed_at.is_some() {
            return Ok(ProposalState::Executed);
        }
        if proposal.canceled_at.is_some() {
            return Ok(ProposalState::Canceled);
        }

        let now = self.clock.now();
        if now < proposal.snapshot {
            return Ok(ProposalState::Pending);
        }
        if now <= proposal.deadline {
            return Ok(ProposalState::Active);
        }

        if let Some(eta) = proposal.eta {
            return Ok(if now >= eta.saturating_add(self.settings.grace_period) {
                ProposalState::Expired
            } else {
                ProposalState::Queued
            });
        }

        if self.quorum_reached(proposal)? && proposal.vote_succeeded() {
            Ok(ProposalState::Succeeded)
        } else {
            Ok(ProposalState::Defeated)
        }
    }

    /// State including changes made directly on `scheduler`: an operation
    /// run there by another executor reads as Executed, one canceled there
    /// reads as Canceled.
    pub fn state_with_timelock(&self, id: &Hash, scheduler: &Scheduler) -> Result<ProposalState, GovernanceError> {
        let state = self.state(id)?;
        if !matches!(state, ProposalState::Queued | ProposalState::Expired) {
            return Ok(state);
        }

        let proposal = self.get(id)?;
        let actions = &proposal.actions;
        let operation = self.timelock_operation_id(
            &actions.targets,
            &actions.values,
            &actions.calldatas,
            &proposal.description_hash,
        )?;
        Ok(match scheduler.operation_state(&operation) {
            OperationState::Done => ProposalState::Executed,
            OperationState::Unset => ProposalState::Canceled,
            OperationState::Waiting | OperationState::Ready => state,
        })
    }

    /// Votes needed at `timepoint`.
    pub fn quorum(&self, timepoint: Timestamp) -> Result<Amount, GovernanceError> {
        let supply = self.token.read().get_past_total_supply(timepoint)?;
        Ok(supply.saturating_mul(u128::from(self.settings.quorum_bps)) / BPS_DENOMINATOR)
    }

    pub fn cast_vote(&mut self, voter: Address, id: Hash, support: VoteSupport) -> Result<Amount, GovernanceError> {
        self.cast_vote_with_reason(voter, id, support, "")
    }

    /// Record a vote weighted by the voter's power at the snapshot.
    pub fn cast_vote_with_reason(
        &mut self,
        voter: Address,
        id: Hash,
        support: VoteSupport,
        reason: &str,
    ) -> Result<Amount, GovernanceError> {
        match self.state(&id)? {
            ProposalState::Active => {}
            ProposalState::Pending => {
                return Err(GovernanceError::UnexpectedProposalState {
                    id,
                    current: ProposalState::Pending,
                    expected: "Active",
                })
            }
            _ => return Err(GovernanceError::VotingClosed(id)),
        }

        let snapshot = self.get(&id)?.snapshot;
        let weight = self.token.read().get_past_votes(&voter, snapshot)?;

        let proposal = self.get_mut(&id)?;
        proposal.record_vote(voter, support, weight)?;

        debug!(proposal = %id.short(), voter = %voter, support = ?support, weight, "vote cast");
        self.events.push(GovernorEvent::VoteCast {
            voter,
            id,
            support,
            weight,
            reason: reason.to_string(),
        });
        Ok(weight)
    }

    pub fn has_voted(&self, id: &Hash, voter: &Address) -> Result<bool, GovernanceError> {
        Ok(self.get(id)?.has_voted(voter))
    }

    pub fn proposal_snapshot(&self, id: &Hash) -> Result<Timestamp, GovernanceError> {
        Ok(self.get(id)?.snapshot)
    }

    pub fn proposal_deadline(&self, id: &Hash) -> Result<Timestamp, GovernanceError> {
        Ok(self.get(id)?.deadline)
    }

    pub fn proposal_proposer(&self, id: &Hash) -> Result<Address, GovernanceError> {
        Ok(self.get(id)?.proposer)
    }

    /// `(against, for, abstain)` tallies.
    pub fn proposal_votes(&self, id: &Hash) -> Result<(Amount, Amount, Amount), GovernanceError> {
        let p = self.get(id)?;
        Ok((p.against_votes, p.for_votes, p.abstain_votes))
    }

    pub fn proposal_eta(&self, id: &Hash) -> Result<Option<Timestamp>, GovernanceError> {
        Ok(self.get(id)?.eta)
    }

    /// Scheduler operation id used for a proposal's batch.
    pub fn timelock_operation_id(
        &self,
        targets: &[Address],
        values: &[Amount],
        calldatas: &[Vec<u8>],
        description_hash: &Hash,
    ) -> Result<Hash, GovernanceError> {
        hash_operation(targets, values, calldatas, &Hash::ZERO, &self.timelock_salt(description_hash))
    }

    /// Hand a succeeded proposal to the scheduler. Returns its eta.
    pub fn queue(
        &mut self,
        scheduler: &mut Scheduler,
        targets: &[Address],
        values: &[Amount],
        calldatas: &[Vec<u8>],
        description_hash: &Hash,
    ) -> Result<Timestamp, GovernanceError> {
        let id = hash_proposal(targets, values, calldatas, description_hash)?;
        let current = self.state(&id)?;
        if current != ProposalState::Succeeded {
            return Err(GovernanceError::UnexpectedProposalState {
                id,
                current,
                expected: "Succeeded",
            });
        }

        let salt = self.timelock_salt(description_hash);
        let eta = scheduler.schedule(self.address, targets, values, calldatas, Hash::ZERO, salt)?;

        self.get_mut(&id)?.eta = Some(eta);
        info!(proposal = %id.short(), eta, "proposal queued");
        self.events.push(GovernorEvent::ProposalQueued { id, eta });
        Ok(eta)
    }

    /// Run a queued proposal through the scheduler once its delay elapsed.
    pub fn execute<D>(
        &mut self,
        scheduler: &mut Scheduler,
        dispatcher: &mut D,
        targets: &[Address],
        values: &[Amount],
        calldatas: &[Vec<u8>],
        description_hash: &Hash,
    ) -> Result<(), GovernanceError>
    where
        D: CallDispatcher + Clone,
    {
        let id = hash_proposal(targets, values, calldatas, description_hash)?;
        match self.state_with_timelock(&id, scheduler)? {
            ProposalState::Queued => {}
            ProposalState::Expired => return Err(GovernanceError::ProposalExpired(id)),
            ProposalState::Canceled => return Err(GovernanceError::ProposalCanceled(id)),
            current => {
                return Err(GovernanceError::UnexpectedProposalState {
                    id,
                    current,
                    expected: "Queued",
                })
            }
        }

        let salt = self.timelock_salt(description_hash);
        let operation = hash_operation(targets, values, calldatas, &Hash::ZERO, &salt)?;
        if !scheduler.is_operation_ready(&operation) {
            let ready_at = scheduler
                .timestamp(&operation)
                .ok_or(GovernanceError::OperationNotScheduled(operation))?;
            let now = self.clock.now();
            warn!(proposal = %id.short(), ready_at, now, "execute attempted before delay elapsed");
            return Err(GovernanceError::NotReady {
                id: operation,
                ready_at,
                now,
            });
        }

        scheduler.run(self.address, targets, values, calldatas, Hash::ZERO, salt, dispatcher)?;

        let now = self.clock.now();
        self.get_mut(&id)?.executed_at = Some(now);
        info!(proposal = %id.short(), "proposal executed");
        self.events.push(GovernorEvent::ProposalExecuted { id });
        Ok(())
    }

    /// Withdraw a proposal before voting opens.
    pub fn cancel(&mut self, caller: Address, id: Hash) -> Result<(), GovernanceError> {
        let proposer = self.get(&id)?.proposer;
        if caller != proposer && caller != self.admin {
            return Err(GovernanceError::Unauthorized(format!(
                "{} is neither proposer nor admin",
                caller
            )));
        }

        let current = self.state(&id)?;
        if current != ProposalState::Pending {
            return Err(GovernanceError::UnexpectedProposalState {
                id,
                current,
                expected: "Pending",
            });
        }

        let now = self.clock.now();
        self.get_mut(&id)?.canceled_at = Some(now);
        info!(proposal = %id.short(), caller = %caller, "proposal canceled");
        self.events.push(GovernorEvent::ProposalCanceled { id });
        Ok(())
    }

    /// Salt binding a scheduler operation to this governor and description.
    fn timelock_salt(&self, description_hash: &Hash) -> Hash {
        let mut padded = [0u8; 32];
        padded[..20].copy_from_slice(self.address.as_bytes());
        Hash::from_bytes(padded) ^ *description_hash
    }

    fn quorum_reached(&self, proposal: &Proposal) -> Result<bool, GovernanceError> {
        Ok(proposal.total_votes() >= self.quorum(proposal.snapshot)?)
    }

    fn get(&self, id: &Hash) -> Result<&Proposal, GovernanceError> {
        self.proposals.get(id).ok_or(GovernanceError::ProposalNotFound(*id))
    }

    fn get_mut(&mut self, id: &Hash) -> Result<&mut Proposal, GovernanceError> {
        self.proposals.get_mut(id).ok_or(GovernanceError::ProposalNotFound(*id))
    }
}
