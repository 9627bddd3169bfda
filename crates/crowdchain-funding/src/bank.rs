//! Native value balances.

use std::collections::{HashMap, HashSet};

use crowdchain_types::{Address, Amount};
use tracing::trace;

use crate::error::FundingError;

/// Native balances of every account, contracts included.
#[derive(Debug, Clone, Default)]
pub struct Bank {
    balances: HashMap<Address, Amount>,
    /// Accounts that refuse incoming value
    rejecting: HashSet<Address>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Seed an account with native value.
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<Amount, FundingError> {
        if account.is_zero() {
            return Err(FundingError::ZeroAddress("credited account"));
        }
        let balance = self.balance_of(&account).checked_add(amount).ok_or(FundingError::Overflow)?;
        self.balances.insert(account, balance);
        Ok(balance)
    }

    /// Mark an account as refusing (or accepting again) incoming value.
    pub fn set_rejects_incoming(&mut self, account: Address, rejects: bool) {
        if rejects {
            self.rejecting.insert(account);
        } else {
            self.rejecting.remove(&account);
        }
    }

    /// Move value between accounts. Nothing changes on failure.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), FundingError> {
        if to.is_zero() {
            return Err(FundingError::ZeroAddress("recipient"));
        }
        if self.rejecting.contains(&to) {
            return Err(FundingError::TransferRejected(to));
        }

        let available = self.balance_of(&from);
        if available < amount {
            return Err(FundingError::InsufficientBalance {
                account: from,
                required: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self.balance_of(&to).checked_add(amount).ok_or(FundingError::Overflow)?;

        self.balances.insert(from, available - amount);
        self.balances.insert(to, credited);
        trace!(from = %from, to = %to, amount, "value transferred");
        Ok(())
    }

    /// Sum of all balances.
    pub fn total(&self) -> Amount {
        self.balances.values().fold(0, |acc, b| acc.saturating_add(*b))
    }
}
