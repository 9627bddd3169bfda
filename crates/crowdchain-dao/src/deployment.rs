//! In-memory deployment of the full system.
//!
//! Wires one scheduler, one governor, the voting ledger and the funding
//! ledger together the way the production setup does: the governor holds
//! the scheduler's proposer, executor and admin roles, and every treasury is
//! handed to the scheduler right after deployment.

use std::sync::Arc;

use crowdchain_funding::{FundingLedger, TreasuryCall};
use crowdchain_governance::{
    hash_description, ActionBatch, ProposalGovernor, ProposalState, Role, Scheduler, VoteSupport, VotingPowerLedger,
};
use crowdchain_types::{Address, Amount, Hash, SharedClock, Timestamp};
use parking_lot::RwLock;
use tracing::info;

use crate::config::DaoConfig;
use crate::error::DaoError;

/// A deployed Crowdchain DAO.
#[derive(Debug)]
pub struct Dao {
    deployer: Address,
    clock: SharedClock,
    token_address: Address,
    token: Arc<RwLock<VotingPowerLedger>>,
    governor: ProposalGovernor,
    scheduler: Scheduler,
    funding: FundingLedger,
}

impl Dao {
    /// Deploy factory, token, scheduler and governor from `deployer`.
    pub fn deploy(config: &DaoConfig, clock: SharedClock, deployer: Address) -> Result<Self, DaoError> {
        config.validate()?;
        if deployer.is_zero() {
            return Err(DaoError::Config("deployer must not be the zero address".to_string()));
        }

        let mut funding = FundingLedger::new(deployer, clock.clone());

        let token_address = funding.reserve_address(deployer)?;
        let token = Arc::new(RwLock::new(VotingPowerLedger::new(clock.clone())));

        let scheduler_address = funding.reserve_address(deployer)?;
        let mut scheduler = Scheduler::new(
            scheduler_address,
            clock.clone(),
            config.timelock.min_delay,
            &[deployer],
            &[deployer],
            deployer,
        );

        let governor_address = funding.reserve_address(deployer)?;
        let governor = ProposalGovernor::new(
            governor_address,
            config.governor_settings(),
            clock.clone(),
            token.clone(),
            deployer,
        )?;

        for role in [Role::Admin, Role::Proposer, Role::Executor] {
            scheduler.grant_role(deployer, role, governor_address)?;
        }

        info!(
            deployer = %deployer,
            factory = %funding.factory().address(),
            token = %token_address,
            scheduler = %scheduler_address,
            governor = %governor_address,
            "dao deployed"
        );

        Ok(Self {
            deployer,
            clock,
            token_address,
            token,
            governor,
            scheduler,
            funding,
        })
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn token_address(&self) -> Address {
        self.token_address
    }

    pub fn token(&self) -> &Arc<RwLock<VotingPowerLedger>> {
        &self.token
    }

    pub fn governor(&self) -> &ProposalGovernor {
        &self.governor
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn funding(&self) -> &FundingLedger {
        &self.funding
    }

    pub fn funding_mut(&mut self) -> &mut FundingLedger {
        &mut self.funding
    }

    /// Seed voting tokens and self-delegate them so they count as votes.
    pub fn mint_and_delegate(&mut self, holder: Address, amount: Amount) -> Result<(), DaoError> {
        let mut token = self.token.write();
        token.mint(holder, amount)?;
        token.delegate(holder, holder)?;
        Ok(())
    }

    pub fn create_campaign(
        &mut self,
        creator: Address,
        title: &str,
        description: &str,
        goal: Amount,
        duration_days: u64,
        beneficiary: Address,
    ) -> Result<Address, DaoError> {
        Ok(self
            .funding
            .create_campaign(creator, title, description, goal, duration_days, beneficiary)?)
    }

    /// Deploy a treasury for `campaign` and hand it to the scheduler.
    pub fn deploy_treasury(&mut self, campaign: Address) -> Result<Address, DaoError> {
        let treasury = self.funding.deploy_treasury(self.deployer, campaign)?;
        self.funding
            .transfer_treasury_ownership(self.deployer, &treasury, self.scheduler.address())?;
        Ok(treasury)
    }

    pub fn deposit(&mut self, from: Address, treasury: &Address, amount: Amount) -> Result<(), DaoError> {
        Ok(self.funding.deposit(from, treasury, amount)?)
    }

    /// Single-call batch adding a milestone to `treasury`.
    pub fn add_milestone_batch(treasury: Address, id: u64, amount: Amount, description: &str) -> Result<ActionBatch, DaoError> {
        let calldata = TreasuryCall::AddMilestone {
            id,
            amount,
            description: description.to_string(),
        }
        .encode()?;
        Ok(ActionBatch::single(treasury, calldata))
    }

    /// Single-call batch releasing a milestone of `treasury`.
    pub fn release_milestone_batch(treasury: Address, id: u64) -> Result<ActionBatch, DaoError> {
        let calldata = TreasuryCall::ReleaseMilestone { id }.encode()?;
        Ok(ActionBatch::single(treasury, calldata))
    }

    pub fn propose(&mut self, proposer: Address, batch: &ActionBatch, description: &str) -> Result<Hash, DaoError> {
        Ok(self.governor.propose(
            proposer,
            batch.targets.clone(),
            batch.values.clone(),
            batch.calldatas.clone(),
            description,
        )?)
    }

    pub fn cast_vote(&mut self, voter: Address, id: Hash, support: VoteSupport) -> Result<Amount, DaoError> {
        Ok(self.governor.cast_vote(voter, id, support)?)
    }

    /// Proposal state as seen through the scheduler.
    pub fn state(&self, id: &Hash) -> Result<ProposalState, DaoError> {
        Ok(self.governor.state_with_timelock(id, &self.scheduler)?)
    }

    pub fn queue(&mut self, batch: &ActionBatch, description: &str) -> Result<Timestamp, DaoError> {
        Ok(self.governor.queue(
            &mut self.scheduler,
            &batch.targets,
            &batch.values,
            &batch.calldatas,
            &hash_description(description),
        )?)
    }

    pub fn execute(&mut self, batch: &ActionBatch, description: &str) -> Result<(), DaoError> {
        Ok(self.governor.execute(
            &mut self.scheduler,
            &mut self.funding,
            &batch.targets,
            &batch.values,
            &batch.calldatas,
            &hash_description(description),
        )?)
    }

    /// Withdraw a pending proposal.
    pub fn cancel(&mut self, caller: Address, id: Hash) -> Result<(), DaoError> {
        Ok(self.governor.cancel(caller, id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdchain_types::ManualClock;

    fn deployer() -> Address {
        Address::from_bytes([0xde; 20])
    }

    fn dao() -> Dao {
        Dao::deploy(&DaoConfig::default(), Arc::new(ManualClock::new(0)), deployer()).unwrap()
    }

    #[test]
    fn test_governor_holds_scheduler_roles() {
        let dao = dao();
        let governor = dao.governor().address();
        for role in [Role::Admin, Role::Proposer, Role::Executor] {
            assert!(dao.scheduler().has_role(role, &governor));
            assert!(dao.scheduler().has_role(role, &deployer()));
        }
    }

    #[test]
    fn test_system_addresses_distinct() {
        let dao = dao();
        let addrs = [
            dao.funding().factory().address(),
            dao.token_address(),
            dao.scheduler().address(),
            dao.governor().address(),
        ];
        for (i, a) in addrs.iter().enumerate() {
            for b in &addrs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_treasury_owned_by_scheduler() {
        let mut dao = dao();
        let campaign = dao
            .create_campaign(deployer(), "Test Campaign", "A campaign for testing", 10, 30, Address::from_bytes([0xa1; 20]))
            .unwrap();
        let treasury = dao.deploy_treasury(campaign).unwrap();

        let t = dao.funding().treasury(&treasury).unwrap();
        assert_eq!(t.owner(), dao.scheduler().address());
        assert_eq!(t.campaign(), campaign);
    }

    #[test]
    fn test_zero_deployer_rejected() {
        let result = Dao::deploy(&DaoConfig::default(), Arc::new(ManualClock::new(0)), Address::ZERO);
        assert!(matches!(result, Err(DaoError::Config(_))));
    }
}
