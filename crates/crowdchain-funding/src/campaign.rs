//! Campaigns and the factory that creates them.
//!
//! Contributions are deliberately unconstrained: neither the goal nor the
//! deadline caps or rejects a contribution. Nothing downstream reads campaign
//! state to gate treasury behavior.

use std::collections::BTreeMap;

use crowdchain_types::{Address, Amount, SharedClock, Timestamp};
use serde::Serialize;
use tracing::info;

use crate::bank::Bank;
use crate::error::FundingError;
use crate::events::FundingEvent;

/// Seconds per day for campaign durations.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// A single crowdfunding campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    /// Campaign account (receives contributions)
    pub address: Address,
    /// Sequence number within the factory
    pub id: u64,
    pub creator: Address,
    pub title: String,
    pub description: String,
    /// Funding goal
    pub goal: Amount,
    pub deadline: Timestamp,
    /// Recipient of released milestones
    pub beneficiary: Address,
    /// Running total of contributions
    pub total_funded: Amount,
    pub created_at: Timestamp,
}

impl Campaign {
    /// Record a contribution, moving value from the contributor to the
    /// campaign account. Returns the new total.
    pub fn fund(&mut self, bank: &mut Bank, contributor: Address, amount: Amount) -> Result<Amount, FundingError> {
        if amount == 0 {
            return Err(FundingError::ZeroAmount);
        }
        let total = self.total_funded.checked_add(amount).ok_or(FundingError::Overflow)?;
        bank.transfer(contributor, self.address, amount)?;
        self.total_funded = total;
        Ok(total)
    }

    pub fn goal_reached(&self) -> bool {
        self.total_funded >= self.goal
    }

    pub fn is_past_deadline(&self, now: Timestamp) -> bool {
        now > self.deadline
    }
}

/// Creates campaigns and keeps the discovery index.
#[derive(Debug, Clone)]
pub struct CampaignFactory {
    address: Address,
    clock: SharedClock,
    campaigns: BTreeMap<u64, Campaign>,
    nonce: u64,
    events: Vec<FundingEvent>,
}

impl CampaignFactory {
    pub fn new(address: Address, clock: SharedClock) -> Self {
        Self {
            address,
            clock,
            campaigns: BTreeMap::new(),
            nonce: 0,
            events: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn events(&self) -> &[FundingEvent] {
        &self.events
    }

    /// Create a campaign. Returns the campaign address.
    pub fn create_campaign(
        &mut self,
        creator: Address,
        title: &str,
        description: &str,
        goal: Amount,
        duration_days: u64,
        beneficiary: Address,
    ) -> Result<Address, FundingError> {
        if goal == 0 {
            return Err(FundingError::InvalidParameter("goal must be greater than zero".to_string()));
        }
        if duration_days == 0 {
            return Err(FundingError::InvalidParameter("duration must be at least one day".to_string()));
        }
        if beneficiary.is_zero() {
            return Err(FundingError::ZeroAddress("beneficiary"));
        }

        let now = self.clock.now();
        let deadline = duration_days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|d| now.checked_add(d))
            .ok_or(FundingError::Overflow)?;
        let next_nonce = self.nonce.checked_add(1).ok_or(FundingError::Overflow)?;

        let id = self.nonce;
        let address = Address::derive_contract(&self.address, id);
        self.campaigns.insert(
            id,
            Campaign {
                address,
                id,
                creator,
                title: title.to_string(),
                description: description.to_string(),
                goal,
                deadline,
                beneficiary,
                total_funded: 0,
                created_at: now,
            },
        );
        self.nonce = next_nonce;

        info!(campaign = %address, creator = %creator, goal, deadline, "campaign created");
        self.events.push(FundingEvent::CampaignCreated {
            campaign: address,
            creator,
            title: title.to_string(),
            goal,
            deadline,
            beneficiary,
        });
        Ok(address)
    }

    /// Contribute to a campaign.
    pub fn fund(
        &mut self,
        bank: &mut Bank,
        campaign: &Address,
        contributor: Address,
        amount: Amount,
    ) -> Result<Amount, FundingError> {
        let entry = self
            .campaigns
            .values_mut()
            .find(|c| c.address == *campaign)
            .ok_or(FundingError::CampaignNotFound(*campaign))?;
        let total = entry.fund(bank, contributor, amount)?;

        info!(campaign = %campaign, contributor = %contributor, amount, total, "campaign funded");
        self.events.push(FundingEvent::CampaignFunded {
            campaign: *campaign,
            contributor,
            amount,
            total_funded: total,
        });
        Ok(total)
    }

    pub fn campaign(&self, address: &Address) -> Option<&Campaign> {
        self.campaigns.values().find(|c| c.address == *address)
    }

    /// All campaigns in creation order.
    pub fn campaigns(&self) -> Vec<&Campaign> {
        self.campaigns.values().collect()
    }

    pub fn campaigns_by_creator(&self, creator: &Address) -> Vec<&Campaign> {
        self.campaigns.values().filter(|c| c.creator == *creator).collect()
    }

    pub fn campaign_count(&self) -> usize {
        self.campaigns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdchain_types::ManualClock;
    use std::sync::Arc;

    fn creator() -> Address {
        Address::from_bytes([0xde; 20])
    }

    fn beneficiary() -> Address {
        Address::from_bytes([0xa1; 20])
    }

    fn factory() -> CampaignFactory {
        CampaignFactory::new(Address::from_bytes([0xfa; 20]), Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn test_create_campaign() {
        let mut f = factory();
        let addr = f
            .create_campaign(creator(), "Test Campaign", "A campaign for testing", 10, 30, beneficiary())
            .unwrap();

        let c = f.campaign(&addr).unwrap();
        assert_eq!(c.deadline, 1_000 + 30 * SECONDS_PER_DAY);
        assert_eq!(c.total_funded, 0);
        assert_eq!(c.creator, creator());

        match &f.events()[0] {
            FundingEvent::CampaignCreated { campaign, creator: by, goal, .. } => {
                assert_eq!(*campaign, addr);
                assert_eq!(*by, creator());
                assert_eq!(*goal, 10);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_create_campaign_validation() {
        let mut f = factory();
        assert!(f.create_campaign(creator(), "t", "d", 0, 30, beneficiary()).is_err());
        assert!(f.create_campaign(creator(), "t", "d", 10, 0, beneficiary()).is_err());
        assert_eq!(
            f.create_campaign(creator(), "t", "d", 10, 30, Address::ZERO),
            Err(FundingError::ZeroAddress("beneficiary"))
        );
        assert_eq!(f.campaign_count(), 0);
    }

    #[test]
    fn test_campaign_addresses_are_distinct() {
        let mut f = factory();
        let a = f.create_campaign(creator(), "a", "d", 10, 30, beneficiary()).unwrap();
        let b = f.create_campaign(beneficiary(), "b", "d", 10, 30, beneficiary()).unwrap();
        assert_ne!(a, b);
        assert_eq!(f.campaigns().len(), 2);
        assert_eq!(f.campaigns_by_creator(&creator()).len(), 1);
    }

    #[test]
    fn test_funding_is_permissive() {
        let mut f = factory();
        let mut bank = Bank::new();
        let contributor = Address::from_bytes([7u8; 20]);
        bank.credit(contributor, 100).unwrap();

        let addr = f.create_campaign(creator(), "t", "d", 10, 1, beneficiary()).unwrap();
        assert_eq!(f.fund(&mut bank, &addr, contributor, 25).unwrap(), 25);
        // Beyond goal is still accepted.
        assert_eq!(f.fund(&mut bank, &addr, contributor, 25).unwrap(), 50);
        assert!(f.campaign(&addr).unwrap().goal_reached());
        assert_eq!(bank.balance_of(&addr), 50);

        assert_eq!(f.fund(&mut bank, &addr, contributor, 0), Err(FundingError::ZeroAmount));
    }

    #[test]
    fn test_failed_contribution_keeps_total() {
        let mut f = factory();
        let mut bank = Bank::new();
        let contributor = Address::from_bytes([7u8; 20]);
        let addr = f.create_campaign(creator(), "t", "d", 10, 1, beneficiary()).unwrap();

        assert!(f.fund(&mut bank, &addr, contributor, 5).is_err());
        assert_eq!(f.campaign(&addr).unwrap().total_funded, 0);
    }
}
