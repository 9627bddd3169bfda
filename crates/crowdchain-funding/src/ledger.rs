//! Shared funding state and the scheduler's call target.
//!
//! [`FundingLedger`] owns the bank, the campaign factory and every treasury,
//! and routes calls by target address. The scheduler dispatches into a clone
//! of it and keeps the clone only when a whole batch succeeds.

use std::collections::HashMap;

use crowdchain_governance::CallDispatcher;
use crowdchain_types::{Address, Amount, SharedClock};
use tracing::{debug, info};

use crate::bank::Bank;
use crate::calls::TreasuryCall;
use crate::campaign::{Campaign, CampaignFactory};
use crate::error::FundingError;
use crate::treasury::Treasury;

#[derive(Debug, Clone)]
pub struct FundingLedger {
    bank: Bank,
    factory: CampaignFactory,
    treasuries: HashMap<Address, Treasury>,
    /// Deployment counter per deployer
    deploy_nonces: HashMap<Address, u64>,
}

impl FundingLedger {
    /// Create the ledger with its campaign factory deployed by `deployer`.
    pub fn new(deployer: Address, clock: SharedClock) -> Self {
        let factory_address = Address::derive_contract(&deployer, 0);
        let mut deploy_nonces = HashMap::new();
        deploy_nonces.insert(deployer, 1);
        Self {
            bank: Bank::new(),
            factory: CampaignFactory::new(factory_address, clock),
            treasuries: HashMap::new(),
            deploy_nonces,
        }
    }

    /// Claim the next contract address of `deployer`.
    pub fn reserve_address(&mut self, deployer: Address) -> Result<Address, FundingError> {
        let nonce = self.deploy_nonces.get(&deployer).copied().unwrap_or(0);
        let next_nonce = nonce.checked_add(1).ok_or(FundingError::Overflow)?;
        self.deploy_nonces.insert(deployer, next_nonce);
        Ok(Address::derive_contract(&deployer, nonce))
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn factory(&self) -> &CampaignFactory {
        &self.factory
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.bank.balance_of(account)
    }

    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<Amount, FundingError> {
        self.bank.credit(account, amount)
    }

    pub fn set_rejects_incoming(&mut self, account: Address, rejects: bool) {
        self.bank.set_rejects_incoming(account, rejects);
    }

    pub fn create_campaign(
        &mut self,
        creator: Address,
        title: &str,
        description: &str,
        goal: Amount,
        duration_days: u64,
        beneficiary: Address,
    ) -> Result<Address, FundingError> {
        self.factory
            .create_campaign(creator, title, description, goal, duration_days, beneficiary)
    }

    pub fn fund_campaign(&mut self, contributor: Address, campaign: &Address, amount: Amount) -> Result<Amount, FundingError> {
        self.factory.fund(&mut self.bank, campaign, contributor, amount)
    }

    pub fn campaign(&self, address: &Address) -> Option<&Campaign> {
        self.factory.campaign(address)
    }

    /// Deploy a treasury for `campaign`, initially owned by `deployer`.
    pub fn deploy_treasury(&mut self, deployer: Address, campaign: Address) -> Result<Address, FundingError> {
        if self.factory.campaign(&campaign).is_none() {
            return Err(FundingError::CampaignNotFound(campaign));
        }
        if deployer.is_zero() {
            return Err(FundingError::ZeroAddress("owner"));
        }
        let address = self.reserve_address(deployer)?;
        let treasury = Treasury::new(address, campaign, deployer)?;
        self.treasuries.insert(address, treasury);

        info!(treasury = %address, campaign = %campaign, owner = %deployer, "treasury deployed");
        Ok(address)
    }

    pub fn treasury(&self, address: &Address) -> Option<&Treasury> {
        self.treasuries.get(address)
    }

    /// Native balance held by a treasury.
    pub fn treasury_balance(&self, address: &Address) -> Result<Amount, FundingError> {
        self.treasury_ref(address)?;
        Ok(self.bank.balance_of(address))
    }

    /// Send value into a treasury. Anyone but the treasury itself may deposit.
    pub fn deposit(&mut self, from: Address, treasury: &Address, amount: Amount) -> Result<(), FundingError> {
        let t = self.treasuries.get_mut(treasury).ok_or(FundingError::TreasuryNotFound(*treasury))?;
        if from == *treasury {
            return Err(FundingError::SelfPayment(*treasury));
        }
        if amount == 0 {
            return Err(FundingError::ZeroAmount);
        }
        if t.total_deposited().checked_add(amount).is_none() {
            return Err(FundingError::Overflow);
        }
        self.bank.transfer(from, *treasury, amount)?;
        t.record_deposit(from, amount)
    }

    pub fn add_milestone(
        &mut self,
        caller: Address,
        treasury: &Address,
        id: u64,
        amount: Amount,
        description: &str,
    ) -> Result<(), FundingError> {
        self.treasury_mut(treasury)?.add_milestone(caller, id, amount, description)
    }

    /// Release a milestone to the beneficiary of the treasury's campaign.
    ///
    /// A beneficiary that is itself a treasury receives the payment as a
    /// deposit, so its own accounting covers what it can later release.
    pub fn release_milestone(&mut self, caller: Address, treasury: &Address, id: u64) -> Result<Amount, FundingError> {
        let campaign = self.treasury_ref(treasury)?.campaign();
        let beneficiary = self
            .factory
            .campaign(&campaign)
            .map(|c| c.beneficiary)
            .ok_or(FundingError::CampaignNotFound(campaign))?;
        if beneficiary == *treasury {
            return Err(FundingError::SelfPayment(*treasury));
        }
        let balance = self.bank.balance_of(treasury);

        let from = *treasury;
        let mut source = self.treasuries.remove(&from).ok_or(FundingError::TreasuryNotFound(from))?;
        let bank = &mut self.bank;
        let treasuries = &mut self.treasuries;
        let result = source.release_milestone(caller, id, balance, beneficiary, |to, amount| match treasuries.get_mut(&to) {
            Some(dest) => {
                if dest.total_deposited().checked_add(amount).is_none() {
                    return Err(FundingError::Overflow);
                }
                bank.transfer(from, to, amount)?;
                dest.record_deposit(from, amount)
            }
            None => bank.transfer(from, to, amount),
        });
        self.treasuries.insert(from, source);
        result
    }

    pub fn transfer_treasury_ownership(&mut self, caller: Address, treasury: &Address, new_owner: Address) -> Result<(), FundingError> {
        self.treasury_mut(treasury)?.transfer_ownership(caller, new_owner)
    }

    fn treasury_ref(&self, address: &Address) -> Result<&Treasury, FundingError> {
        self.treasuries.get(address).ok_or(FundingError::TreasuryNotFound(*address))
    }

    fn treasury_mut(&mut self, address: &Address) -> Result<&mut Treasury, FundingError> {
        self.treasuries.get_mut(address).ok_or(FundingError::TreasuryNotFound(*address))
    }
}

impl CallDispatcher for FundingLedger {
    type Error = FundingError;

    fn dispatch(&mut self, caller: Address, target: Address, value: Amount, calldata: &[u8]) -> Result<(), FundingError> {
        if calldata.is_empty() {
            debug!(caller = %caller, target = %target, value, "value transfer");
            if self.treasuries.contains_key(&target) {
                return self.deposit(caller, &target, value);
            }
            if self.factory.campaign(&target).is_some() {
                return self.fund_campaign(caller, &target, value).map(|_| ());
            }
            return self.bank.transfer(caller, target, value);
        }

        if !self.treasuries.contains_key(&target) {
            return Err(FundingError::TreasuryNotFound(target));
        }
        if value != 0 {
            return Err(FundingError::InvalidParameter("treasury calls do not accept value".to_string()));
        }

        let call = TreasuryCall::decode(calldata)?;
        debug!(caller = %caller, target = %target, call = call.name(), "treasury call");
        match call {
            TreasuryCall::AddMilestone { id, amount, description } => {
                self.add_milestone(caller, &target, id, amount, &description)
            }
            TreasuryCall::ReleaseMilestone { id } => self.release_milestone(caller, &target, id).map(|_| ()),
            TreasuryCall::TransferOwnership { new_owner } => {
                self.transfer_treasury_ownership(caller, &target, new_owner)
            }
        }
    }
}
