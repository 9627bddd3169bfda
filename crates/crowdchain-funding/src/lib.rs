//! Crowdchain Funding - campaigns, milestone treasuries and native value.
//!
//! This crate provides:
//! - Campaigns and the factory that indexes them
//! - Treasuries that pay out only through owner-approved milestones
//! - The native value bank
//! - [`FundingLedger`], the call target the scheduler dispatches into

pub mod bank;
pub mod calls;
pub mod campaign;
pub mod error;
pub mod events;
pub mod ledger;
pub mod treasury;

pub use bank::Bank;
pub use calls::TreasuryCall;
pub use campaign::{Campaign, CampaignFactory, SECONDS_PER_DAY};
pub use error::FundingError;
pub use events::FundingEvent;
pub use ledger::FundingLedger;
pub use treasury::{Milestone, Treasury};
