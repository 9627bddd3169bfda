//! Proposal model and identity.
//!
//! Proposals go through states: Pending -> Active -> Succeeded/Defeated -> Queued -> Executed,
//! with Canceled reachable from Pending and Expired from Queued.
//!
//! A proposal's id is a pure function of its action batch and description
//! hash, so submitting the same batch twice always maps to the same id.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use borsh::BorshSerialize;
use crowdchain_types::{Address, Amount, Hash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

/// Proposal state, with the numeric codes off-chain tooling expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    /// Created, voting has not opened yet
    Pending = 0,
    /// Voting window is open
    Active = 1,
    /// Voting ended without quorum or majority
    Defeated = 2,
    /// Voting ended with quorum and majority
    Succeeded = 3,
    /// Handed to the scheduler, waiting for its delay
    Queued = 4,
    /// All calls ran
    Executed = 5,
    /// Queued but not executed within the grace window
    Expired = 6,
    /// Withdrawn before voting opened
    Canceled = 7,
}

impl ProposalState {
    pub const ALL: [ProposalState; 8] = [
        ProposalState::Pending,
        ProposalState::Active,
        ProposalState::Defeated,
        ProposalState::Succeeded,
        ProposalState::Queued,
        ProposalState::Executed,
        ProposalState::Expired,
        ProposalState::Canceled,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Position in the lifecycle order; Defeated and Succeeded share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            ProposalState::Pending => 0,
            ProposalState::Active => 1,
            ProposalState::Defeated | ProposalState::Succeeded => 2,
            ProposalState::Queued => 3,
            ProposalState::Executed => 4,
            ProposalState::Expired | ProposalState::Canceled => 5,
        }
    }

    /// No further transition can ever happen from this state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ProposalState::Defeated | ProposalState::Executed | ProposalState::Expired | ProposalState::Canceled
        )
    }

    /// Whether some sequence of transitions leads from this state to `target`.
    ///
    /// Canceled follows Pending (governor cancel) or Queued (cancel on the
    /// scheduler). Expired follows anything that can still be queued.
    pub fn can_reach(&self, target: ProposalState) -> bool {
        if *self == target {
            return true;
        }
        if self.is_final() {
            return false;
        }
        match target {
            ProposalState::Canceled => matches!(self, ProposalState::Pending | ProposalState::Queued),
            ProposalState::Expired => self.rank() <= ProposalState::Queued.rank(),
            _ => target.rank() > self.rank(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProposalState::Pending => "Pending",
            ProposalState::Active => "Active",
            ProposalState::Defeated => "Defeated",
            ProposalState::Succeeded => "Succeeded",
            ProposalState::Queued => "Queued",
            ProposalState::Executed => "Executed",
            ProposalState::Expired => "Expired",
            ProposalState::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl FromStr for ProposalState {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| GovernanceError::InvalidParameter(format!("unknown proposal state code {}", code)));
        }
        Self::ALL
            .iter()
            .find(|state| state.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| GovernanceError::InvalidParameter(format!("unknown proposal state '{}'", s)))
    }
}

/// Vote support options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteSupport {
    /// Vote against
    Against = 0,
    /// Vote in favor
    For = 1,
    /// Abstain (counts toward quorum only)
    Abstain = 2,
}

impl TryFrom<u8> for VoteSupport {
    type Error = GovernanceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VoteSupport::Against),
            1 => Ok(VoteSupport::For),
            2 => Ok(VoteSupport::Abstain),
            other => Err(GovernanceError::InvalidVoteType(other)),
        }
    }
}

/// A single vote, fixed at the weight the voter held at the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub support: VoteSupport,
    pub weight: Amount,
}

/// Equal-length target/value/calldata arrays forming one executable batch.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, Serialize, Deserialize)]
pub struct ActionBatch {
    pub targets: Vec<Address>,
    pub values: Vec<Amount>,
    pub calldatas: Vec<Vec<u8>>,
}

impl ActionBatch {
    /// Build a batch, rejecting empty or mismatched arrays.
    pub fn new(targets: Vec<Address>, values: Vec<Amount>, calldatas: Vec<Vec<u8>>) -> Result<Self, GovernanceError> {
        validate_batch(&targets, &values, &calldatas)?;
        Ok(Self {
            targets,
            values,
            calldatas,
        })
    }

    /// Single-call batch with zero value.
    pub fn single(target: Address, calldata: Vec<u8>) -> Self {
        Self {
            targets: vec![target],
            values: vec![0],
            calldatas: vec![calldata],
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn proposal_id(&self, description_hash: &Hash) -> Result<Hash, GovernanceError> {
        hash_proposal(&self.targets, &self.values, &self.calldatas, description_hash)
    }
}

pub(crate) fn validate_batch(targets: &[Address], values: &[Amount], calldatas: &[Vec<u8>]) -> Result<(), GovernanceError> {
    if targets.is_empty() {
        return Err(GovernanceError::InvalidProposal("empty proposal".to_string()));
    }
    if targets.len() != values.len() || targets.len() != calldatas.len() {
        return Err(GovernanceError::InvalidProposal(format!(
            "length mismatch: {} targets, {} values, {} calldatas",
            targets.len(),
            values.len(),
            calldatas.len()
        )));
    }
    Ok(())
}

/// Hash of a proposal description, the form used by queue and execute.
pub fn hash_description(description: &str) -> Hash {
    Hash::compute(description.as_bytes())
}

/// Deterministic proposal id: blake3 over the borsh encoding of
/// `(targets, values, calldatas, description_hash)`.
pub fn hash_proposal(
    targets: &[Address],
    values: &[Amount],
    calldatas: &[Vec<u8>],
    description_hash: &Hash,
) -> Result<Hash, GovernanceError> {
    let encoded = borsh::to_vec(&(targets, values, calldatas, description_hash))
        .map_err(|e| GovernanceError::Encoding(e.to_string()))?;
    Ok(Hash::compute(&encoded))
}

/// Governance proposal.
#[derive(Debug, Clone)]
pub struct Proposal {
    /// Deterministic proposal id
    pub id: Hash,
    /// Proposer address
    pub proposer: Address,
    /// Calls to run once approved
    pub actions: ActionBatch,
    /// Free-form description
    pub description: String,
    /// Hash of the description
    pub description_hash: Hash,
    /// Voting power is measured here; voting opens here
    pub snapshot: Timestamp,
    /// Last instant at which votes are accepted
    pub deadline: Timestamp,
    /// For votes (weighted)
    pub for_votes: Amount,
    /// Against votes (weighted)
    pub against_votes: Amount,
    /// Abstain votes (weighted)
    pub abstain_votes: Amount,
    /// Votes by voter
    pub votes: HashMap<Address, VoteRecord>,
    /// Earliest execution time, set once queued
    pub eta: Option<Timestamp>,
    /// Time of execution
    pub executed_at: Option<Timestamp>,
    /// Time of cancellation
    pub canceled_at: Option<Timestamp>,
}

impl Proposal {
    pub fn new(
        id: Hash,
        proposer: Address,
        actions: ActionBatch,
        description: String,
        snapshot: Timestamp,
        deadline: Timestamp,
    ) -> Self {
        let description_hash = hash_description(&description);
        Self {
            id,
            proposer,
            actions,
            description,
            description_hash,
            snapshot,
            deadline,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            votes: HashMap::new(),
            eta: None,
            executed_at: None,
            canceled_at: None,
        }
    }

    /// Record a vote. Window and state checks belong to the governor.
    pub fn record_vote(&mut self, voter: Address, support: VoteSupport, weight: Amount) -> Result<(), GovernanceError> {
        if self.votes.contains_key(&voter) {
            return Err(GovernanceError::AlreadyVoted { id: self.id, voter });
        }

        let tally = match support {
            VoteSupport::For => &mut self.for_votes,
            VoteSupport::Against => &mut self.against_votes,
            VoteSupport::Abstain => &mut self.abstain_votes,
        };
        *tally = tally.checked_add(weight).ok_or(GovernanceError::Overflow)?;

        self.votes.insert(voter, VoteRecord { support, weight });
        Ok(())
    }

    /// Get total votes cast.
    pub fn total_votes(&self) -> Amount {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }

    /// Strict majority of for over against.
    pub fn vote_succeeded(&self) -> bool {
        self.for_votes > self.against_votes
    }

    /// Check if voter has voted.
    pub fn has_voted(&self, voter: &Address) -> bool {
        self.votes.contains_key(voter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treasury() -> Address {
        Address::from_bytes([9u8; 20])
    }

    fn proposal() -> Proposal {
        let actions = ActionBatch::single(treasury(), vec![1, 2, 3]);
        let id = actions.proposal_id(&hash_description("Add milestone 1")).unwrap();
        Proposal::new(id, Address::ZERO, actions, "Add milestone 1".to_string(), 1, 51)
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(ProposalState::Pending.code(), 0);
        assert_eq!(ProposalState::Succeeded.code(), 3);
        assert_eq!(ProposalState::Canceled.code(), 7);
        for state in ProposalState::ALL {
            assert_eq!(ProposalState::from_code(state.code()), Some(state));
        }
        assert_eq!(ProposalState::from_code(8), None);
    }

    #[test]
    fn test_can_reach() {
        use ProposalState::*;

        assert!(Pending.can_reach(Executed));
        assert!(Pending.can_reach(Canceled));
        assert!(Queued.can_reach(Canceled));
        assert!(Active.can_reach(Expired));
        assert!(Succeeded.can_reach(Queued));

        assert!(!Active.can_reach(Canceled));
        assert!(!Succeeded.can_reach(Canceled));
        assert!(!Queued.can_reach(Active));
        assert!(!Succeeded.can_reach(Defeated));
        assert!(!Defeated.can_reach(Expired));
        assert!(!Executed.can_reach(Canceled));
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!("queued".parse::<ProposalState>().unwrap(), ProposalState::Queued);
        assert_eq!("1".parse::<ProposalState>().unwrap(), ProposalState::Active);
        assert!("Approved".parse::<ProposalState>().is_err());
    }

    #[test]
    fn test_vote_support_from_u8() {
        assert_eq!(VoteSupport::try_from(1).unwrap(), VoteSupport::For);
        assert_eq!(VoteSupport::try_from(3), Err(GovernanceError::InvalidVoteType(3)));
    }

    #[test]
    fn test_batch_validation() {
        assert!(ActionBatch::new(vec![], vec![], vec![]).is_err());
        assert!(ActionBatch::new(vec![treasury()], vec![0, 0], vec![vec![]]).is_err());
        assert!(ActionBatch::new(vec![treasury()], vec![0], vec![vec![]]).is_ok());
    }

    #[test]
    fn test_proposal_id_is_deterministic() {
        let batch = ActionBatch::single(treasury(), vec![7]);
        let desc = hash_description("Release milestone 1");

        let a = batch.proposal_id(&desc).unwrap();
        let b = hash_proposal(&[treasury()], &[0], &[vec![7]], &desc).unwrap();
        assert_eq!(a, b);

        let other_desc = batch.proposal_id(&hash_description("Release milestone 2")).unwrap();
        assert_ne!(a, other_desc);

        let other_value = hash_proposal(&[treasury()], &[1], &[vec![7]], &desc).unwrap();
        assert_ne!(a, other_value);
    }

    #[test]
    fn test_record_vote_once() {
        let mut p = proposal();
        let voter = Address::from_bytes([1u8; 20]);

        p.record_vote(voter, VoteSupport::For, 100).unwrap();
        assert_eq!(p.for_votes, 100);
        assert!(p.has_voted(&voter));

        let err = p.record_vote(voter, VoteSupport::Against, 100).unwrap_err();
        assert!(matches!(err, GovernanceError::AlreadyVoted { .. }));
        assert_eq!(p.against_votes, 0);
    }

    #[test]
    fn test_zero_weight_vote_is_recorded() {
        let mut p = proposal();
        let voter = Address::from_bytes([2u8; 20]);

        p.record_vote(voter, VoteSupport::Abstain, 0).unwrap();
        assert!(p.has_voted(&voter));
        assert_eq!(p.total_votes(), 0);
    }

    #[test]
    fn test_vote_succeeded_requires_strict_majority() {
        let mut p = proposal();
        p.record_vote(Address::from_bytes([1u8; 20]), VoteSupport::For, 50).unwrap();
        p.record_vote(Address::from_bytes([2u8; 20]), VoteSupport::Against, 50).unwrap();
        assert!(!p.vote_succeeded());

        p.record_vote(Address::from_bytes([3u8; 20]), VoteSupport::For, 1).unwrap();
        assert!(p.vote_succeeded());
    }
}
