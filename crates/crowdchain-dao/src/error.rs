use crowdchain_funding::FundingError;
use crowdchain_governance::{ErrorKind, GovernanceError};
use thiserror::Error;

/// Errors surfaced by the deployment wrapper.
#[derive(Debug, Error)]
pub enum DaoError {
    #[error("Governance error: {0}")]
    Governance(#[from] GovernanceError),

    #[error("Funding error: {0}")]
    Funding(#[from] FundingError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaoError {
    /// Category of the underlying failure; configuration and I/O problems
    /// count as validation errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaoError::Governance(e) => e.kind(),
            DaoError::Funding(e) => e.kind(),
            DaoError::Config(_) | DaoError::Io(_) => ErrorKind::Validation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            DaoError::Governance(e) => e.is_terminal(),
            DaoError::Funding(e) => crowdchain_governance::ErrorClass::is_terminal(e),
            DaoError::Config(_) | DaoError::Io(_) => false,
        }
    }
}
