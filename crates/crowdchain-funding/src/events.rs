use crowdchain_types::{Address, Amount, Timestamp};
use serde::Serialize;

/// Records emitted by campaigns, the factory and treasuries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FundingEvent {
    CampaignCreated {
        campaign: Address,
        creator: Address,
        title: String,
        goal: Amount,
        deadline: Timestamp,
        beneficiary: Address,
    },
    CampaignFunded {
        campaign: Address,
        contributor: Address,
        amount: Amount,
        total_funded: Amount,
    },
    Deposit {
        treasury: Address,
        from: Address,
        amount: Amount,
    },
    MilestoneAdded {
        treasury: Address,
        id: u64,
        amount: Amount,
        description: String,
    },
    MilestoneReleased {
        treasury: Address,
        id: u64,
        amount: Amount,
        beneficiary: Address,
    },
    OwnershipTransferred {
        treasury: Address,
        previous: Address,
        new_owner: Address,
    },
}
