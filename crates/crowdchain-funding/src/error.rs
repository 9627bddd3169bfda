use crowdchain_governance::{ErrorClass, ErrorKind};
use crowdchain_types::{Address, Amount};
use thiserror::Error;

/// Errors raised by campaigns, treasuries and the value ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FundingError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(Address),

    #[error("Treasury not found: {0}")]
    TreasuryNotFound(Address),

    #[error("Invalid calldata: {0}")]
    InvalidCalldata(String),

    #[error("Milestone {0} already exists")]
    DuplicateMilestone(u64),

    #[error("Milestone {0} not found")]
    MilestoneNotFound(u64),

    #[error("Milestone {0} already released")]
    AlreadyReleased(u64),

    #[error("Caller {caller} is not the owner {owner}")]
    NotOwner { caller: Address, owner: Address },

    #[error("Ownership was already transferred")]
    OwnershipAlreadyTransferred,

    #[error("Insufficient balance of {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Treasury {0} cannot pay itself")]
    SelfPayment(Address),

    #[error("Transfer to {0} was rejected")]
    TransferRejected(Address),

    #[error("Arithmetic overflow")]
    Overflow,
}

impl FundingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FundingError::InvalidParameter(_)
            | FundingError::ZeroAmount
            | FundingError::ZeroAddress(_)
            | FundingError::CampaignNotFound(_)
            | FundingError::TreasuryNotFound(_)
            | FundingError::InvalidCalldata(_)
            | FundingError::DuplicateMilestone(_)
            | FundingError::MilestoneNotFound(_)
            | FundingError::SelfPayment(_) => ErrorKind::Validation,

            FundingError::NotOwner { .. } => ErrorKind::Authorization,

            FundingError::AlreadyReleased(_) | FundingError::OwnershipAlreadyTransferred => {
                ErrorKind::StatePrecondition
            }

            FundingError::InsufficientBalance { .. } | FundingError::TransferRejected(_) | FundingError::Overflow => {
                ErrorKind::Resource
            }
        }
    }
}

impl ErrorClass for FundingError {
    fn kind(&self) -> ErrorKind {
        FundingError::kind(self)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, FundingError::AlreadyReleased(_) | FundingError::OwnershipAlreadyTransferred)
    }
}
