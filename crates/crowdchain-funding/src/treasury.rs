//! Milestone treasury.
//!
//! Holds native funds for one campaign and pays them out only in recorded
//! milestones. Mutating entry points are owner-only; after setup the owner
//! is the scheduler, so every milestone change is the result of an executed
//! proposal.

use std::collections::BTreeMap;

use crowdchain_types::{Address, Amount};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::FundingError;
use crate::events::FundingEvent;

/// A discrete, amount-bounded disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub id: u64,
    pub amount: Amount,
    pub description: String,
    /// Flips false -> true exactly once
    pub released: bool,
}

/// Treasury bound to one campaign.
#[derive(Debug, Clone)]
pub struct Treasury {
    address: Address,
    /// Campaign whose beneficiary receives releases
    campaign: Address,
    owner: Address,
    ownership_transferred: bool,
    milestones: BTreeMap<u64, Milestone>,
    total_deposited: Amount,
    total_released: Amount,
    events: Vec<FundingEvent>,
}

impl Treasury {
    pub fn new(address: Address, campaign: Address, owner: Address) -> Result<Self, FundingError> {
        if campaign.is_zero() {
            return Err(FundingError::ZeroAddress("campaign"));
        }
        if owner.is_zero() {
            return Err(FundingError::ZeroAddress("owner"));
        }
        Ok(Self {
            address,
            campaign,
            owner,
            ownership_transferred: false,
            milestones: BTreeMap::new(),
            total_deposited: 0,
            total_released: 0,
            events: Vec::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn campaign(&self) -> Address {
        self.campaign
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn total_released(&self) -> Amount {
        self.total_released
    }

    pub fn events(&self) -> &[FundingEvent] {
        &self.events
    }

    pub fn milestone(&self, id: u64) -> Option<&Milestone> {
        self.milestones.get(&id)
    }

    /// Milestones ordered by id.
    pub fn milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.milestones.values()
    }

    /// Account an incoming deposit. The value itself moves in the bank.
    pub fn record_deposit(&mut self, from: Address, amount: Amount) -> Result<(), FundingError> {
        if amount == 0 {
            return Err(FundingError::ZeroAmount);
        }
        self.total_deposited = self.total_deposited.checked_add(amount).ok_or(FundingError::Overflow)?;

        info!(treasury = %self.address, from = %from, amount, "deposit received");
        self.events.push(FundingEvent::Deposit {
            treasury: self.address,
            from,
            amount,
        });
        Ok(())
    }

    pub fn add_milestone(&mut self, caller: Address, id: u64, amount: Amount, description: &str) -> Result<(), FundingError> {
        self.only_owner(&caller)?;
        if amount == 0 {
            return Err(FundingError::ZeroAmount);
        }
        if self.milestones.contains_key(&id) {
            return Err(FundingError::DuplicateMilestone(id));
        }

        self.milestones.insert(
            id,
            Milestone {
                id,
                amount,
                description: description.to_string(),
                released: false,
            },
        );

        info!(treasury = %self.address, milestone = id, amount, "milestone added");
        self.events.push(FundingEvent::MilestoneAdded {
            treasury: self.address,
            id,
            amount,
            description: description.to_string(),
        });
        Ok(())
    }

    /// Release a milestone. `balance` is the treasury's current native
    /// balance; `pay` moves the amount to `beneficiary`. If `pay` fails the
    /// milestone stays unreleased.
    pub fn release_milestone<F>(
        &mut self,
        caller: Address,
        id: u64,
        balance: Amount,
        beneficiary: Address,
        pay: F,
    ) -> Result<Amount, FundingError>
    where
        F: FnOnce(Address, Amount) -> Result<(), FundingError>,
    {
        self.only_owner(&caller)?;

        let milestone = self.milestones.get_mut(&id).ok_or(FundingError::MilestoneNotFound(id))?;
        if milestone.released {
            return Err(FundingError::AlreadyReleased(id));
        }
        let amount = milestone.amount;
        if balance < amount {
            return Err(FundingError::InsufficientBalance {
                account: self.address,
                required: amount,
                available: balance,
            });
        }
        let total_released = self.total_released.checked_add(amount).ok_or(FundingError::Overflow)?;

        milestone.released = true;
        if let Err(e) = pay(beneficiary, amount) {
            milestone.released = false;
            warn!(treasury = %self.address, milestone = id, error = %e, "milestone payment failed, release rolled back");
            return Err(e);
        }
        self.total_released = total_released;

        info!(treasury = %self.address, milestone = id, amount, beneficiary = %beneficiary, "milestone released");
        self.events.push(FundingEvent::MilestoneReleased {
            treasury: self.address,
            id,
            amount,
            beneficiary,
        });
        Ok(amount)
    }

    /// One-time hand-over of control, normally to the scheduler.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), FundingError> {
        self.only_owner(&caller)?;
        if self.ownership_transferred {
            return Err(FundingError::OwnershipAlreadyTransferred);
        }
        if new_owner.is_zero() {
            return Err(FundingError::ZeroAddress("new owner"));
        }

        let previous = self.owner;
        self.owner = new_owner;
        self.ownership_transferred = true;

        info!(treasury = %self.address, previous = %previous, new_owner = %new_owner, "ownership transferred");
        self.events.push(FundingEvent::OwnershipTransferred {
            treasury: self.address,
            previous,
            new_owner,
        });
        Ok(())
    }

    fn only_owner(&self, caller: &Address) -> Result<(), FundingError> {
        if *caller != self.owner {
            return Err(FundingError::NotOwner {
                caller: *caller,
                owner: self.owner,
            });
        }
        Ok(())
    }
}
