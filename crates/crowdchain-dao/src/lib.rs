//! Crowdchain DAO - wiring, configuration and consumer helpers.
//!
//! This crate provides:
//! - [`Dao`], an in-memory deployment of governor, scheduler, voting
//!   ledger and funding ledger with production role wiring
//! - TOML configuration
//! - Bounded polling for proposal state transitions
//! - A scripted walkthrough of the full milestone flow

pub mod config;
pub mod deployment;
pub mod error;
pub mod poll;
pub mod walkthrough;

pub use config::{DaoConfig, GovernorConfig, LoggingConfig, PollingConfig, TimelockConfig};
pub use deployment::Dao;
pub use error::DaoError;
pub use poll::{wait_for_state, PollError, PollOptions};
pub use walkthrough::{named_account, run_walkthrough, Transition, WalkthroughError, WalkthroughParams, WalkthroughReport};
