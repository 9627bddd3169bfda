//! Calldata accepted by treasuries.

use borsh::{BorshDeserialize, BorshSerialize};
use crowdchain_types::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::error::FundingError;

/// Owner-only treasury entry points, borsh-encoded into proposal calldata.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum TreasuryCall {
    AddMilestone { id: u64, amount: Amount, description: String },
    ReleaseMilestone { id: u64 },
    TransferOwnership { new_owner: Address },
}

impl TreasuryCall {
    pub fn encode(&self) -> Result<Vec<u8>, FundingError> {
        borsh::to_vec(self).map_err(|e| FundingError::InvalidCalldata(e.to_string()))
    }

    pub fn decode(calldata: &[u8]) -> Result<Self, FundingError> {
        borsh::from_slice(calldata).map_err(|e| FundingError::InvalidCalldata(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TreasuryCall::AddMilestone { .. } => "addMilestone",
            TreasuryCall::ReleaseMilestone { .. } => "releaseMilestone",
            TreasuryCall::TransferOwnership { .. } => "transferOwnership",
        }
    }
}
