//! Scripted end-to-end run: fund a treasury, then add and release a
//! milestone through two governance proposals.

use std::sync::Arc;

use crowdchain_funding::Milestone;
use crowdchain_governance::{ProposalState, VoteSupport};
use crowdchain_types::{Address, Amount, Clock, Hash, ManualClock};
use serde::Serialize;
use tracing::info;

use crate::config::DaoConfig;
use crate::deployment::Dao;
use crate::error::DaoError;
use crate::poll::{wait_for_state, PollError};

/// Deterministic account for a well-known name.
pub fn named_account(name: &str) -> Address {
    let digest = Hash::compute(name.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest.as_bytes()[..20]);
    Address::from_bytes(bytes)
}

/// Walkthrough inputs.
#[derive(Debug, Clone)]
pub struct WalkthroughParams {
    pub voting_tokens: Amount,
    pub campaign_goal: Amount,
    pub campaign_days: u64,
    pub treasury_deposit: Amount,
    pub milestone_id: u64,
    pub milestone_amount: Amount,
    pub milestone_description: String,
}

impl Default for WalkthroughParams {
    fn default() -> Self {
        Self {
            voting_tokens: 100,
            campaign_goal: 10,
            campaign_days: 30,
            treasury_deposit: 50,
            milestone_id: 1,
            milestone_amount: 10,
            milestone_description: "Purchase school supplies".to_string(),
        }
    }
}

/// One observed proposal state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub proposal: String,
    pub state: ProposalState,
    pub at: u64,
}

/// Outcome of a walkthrough run.
#[derive(Debug, Clone, Serialize)]
pub struct WalkthroughReport {
    pub campaign: Address,
    pub treasury: Address,
    pub beneficiary: Address,
    pub add_proposal: Hash,
    pub release_proposal: Hash,
    pub milestones: Vec<Milestone>,
    pub beneficiary_balance: Amount,
    pub treasury_balance: Amount,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkthroughError {
    #[error(transparent)]
    Dao(#[from] DaoError),

    #[error("polling failed: {0}")]
    Poll(#[from] PollError),
}

/// Drive one add-milestone and one release-milestone proposal to execution.
pub async fn run_walkthrough(
    config: &DaoConfig,
    clock: Arc<ManualClock>,
    params: &WalkthroughParams,
) -> Result<WalkthroughReport, WalkthroughError> {
    let deployer = named_account("deployer");
    let alice = named_account("alice");
    let bob = named_account("bob");

    let mut dao = Dao::deploy(config, clock.clone(), deployer)?;
    dao.mint_and_delegate(alice, params.voting_tokens)?;
    dao.mint_and_delegate(bob, params.voting_tokens)?;

    let campaign = dao.create_campaign(
        deployer,
        "Test Campaign",
        "A campaign for testing",
        params.campaign_goal,
        params.campaign_days,
        alice,
    )?;
    let treasury = dao.deploy_treasury(campaign)?;

    dao.funding_mut().credit(deployer, params.treasury_deposit).map_err(DaoError::from)?;
    dao.deposit(deployer, &treasury, params.treasury_deposit)?;
    info!(treasury = %treasury, amount = params.treasury_deposit, "treasury funded");

    let mut transitions = Vec::new();

    let add_description = format!("Add milestone {}", params.milestone_id);
    let add_batch = Dao::add_milestone_batch(
        treasury,
        params.milestone_id,
        params.milestone_amount,
        &params.milestone_description,
    )?;
    let add_proposal = pass_proposal(&mut dao, &clock, config, alice, &[alice, bob], &add_batch, &add_description, &mut transitions).await?;

    let release_description = format!("Release milestone {}", params.milestone_id);
    let release_batch = Dao::release_milestone_batch(treasury, params.milestone_id)?;
    let release_proposal = pass_proposal(
        &mut dao,
        &clock,
        config,
        alice,
        &[alice, bob],
        &release_batch,
        &release_description,
        &mut transitions,
    )
    .await?;

    let funding = dao.funding();
    let milestones = funding
        .treasury(&treasury)
        .map(|t| t.milestones().cloned().collect())
        .unwrap_or_default();

    Ok(WalkthroughReport {
        campaign,
        treasury,
        beneficiary: alice,
        add_proposal,
        release_proposal,
        milestones,
        beneficiary_balance: funding.balance_of(&alice),
        treasury_balance: funding.balance_of(&treasury),
        transitions,
    })
}

/// Propose, vote, queue, wait out the delay and execute one batch.
#[allow(clippy::too_many_arguments)]
async fn pass_proposal(
    dao: &mut Dao,
    clock: &Arc<ManualClock>,
    config: &DaoConfig,
    proposer: Address,
    voters: &[Address],
    batch: &crowdchain_governance::ActionBatch,
    description: &str,
    transitions: &mut Vec<Transition>,
) -> Result<Hash, WalkthroughError> {
    let id = dao.propose(proposer, batch, description)?;
    record(transitions, description, dao.state(&id)?, clock.now());

    let options = config.poll_options();
    let snapshot = dao.governor().proposal_snapshot(&id).map_err(DaoError::from)?;
    let now = clock.now();
    if snapshot > now {
        clock.advance(snapshot - now);
    }
    let active = wait_for_state(
        || dao.governor().state_with_timelock(&id, dao.scheduler()),
        &[ProposalState::Active],
        &options,
    )
    .await?;
    record(transitions, description, active, clock.now());

    for voter in voters {
        dao.cast_vote(*voter, id, VoteSupport::For)?;
    }

    let deadline = dao.governor().proposal_deadline(&id).map_err(DaoError::from)?;
    let now = clock.now();
    if deadline >= now {
        clock.advance(deadline - now + 1);
    }
    let outcome = wait_for_state(
        || dao.governor().state_with_timelock(&id, dao.scheduler()),
        &[ProposalState::Succeeded, ProposalState::Defeated],
        &options,
    )
    .await?;
    record(transitions, description, outcome, clock.now());
    if outcome == ProposalState::Defeated {
        return Err(PollError::Unreachable(outcome).into());
    }

    dao.queue(batch, description)?;
    record(transitions, description, dao.state(&id)?, clock.now());

    clock.advance(config.timelock.min_delay);
    dao.execute(batch, description)?;
    record(transitions, description, dao.state(&id)?, clock.now());

    Ok(id)
}

fn record(transitions: &mut Vec<Transition>, proposal: &str, state: ProposalState, at: u64) {
    info!(proposal, state = %state, at, "proposal state");
    transitions.push(Transition {
        proposal: proposal.to_string(),
        state,
        at,
    });
}
