//! Checkpointed voting power with delegation.
//!
//! Token balances only count as voting power once delegated (self-delegation
//! included). Every change to a delegate's power, and to the total supply, is
//! written as a checkpoint at the current logical time so that historical
//! lookups stay exact.
//!
//! Past lookups return the value in force at the *start* of the requested
//! timepoint: a change written at time `t` is only visible to lookups at
//! `t + 1` or later. A snapshot is therefore final as soon as it is reached.

use std::collections::HashMap;

use crowdchain_types::{Address, Amount, SharedClock, Timestamp};
use tracing::debug;

use crate::error::GovernanceError;

/// Voting power of one delegate (or the total supply) from `timepoint` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub timepoint: Timestamp,
    pub votes: Amount,
}

/// Token balances, delegation and voting-power history.
#[derive(Debug)]
pub struct VotingPowerLedger {
    clock: SharedClock,
    /// Token balance per holder
    balances: HashMap<Address, Amount>,
    /// holder -> delegate
    delegates: HashMap<Address, Address>,
    /// delegate -> voting power history
    checkpoints: HashMap<Address, Vec<Checkpoint>>,
    /// Total supply history
    supply_checkpoints: Vec<Checkpoint>,
    total_supply: Amount,
}

impl VotingPowerLedger {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            balances: HashMap::new(),
            delegates: HashMap::new(),
            checkpoints: HashMap::new(),
            supply_checkpoints: Vec::new(),
            total_supply: 0,
        }
    }

    /// Genesis allocation of voting tokens.
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<(), GovernanceError> {
        if to.is_zero() {
            return Err(GovernanceError::InvalidParameter("cannot mint to the zero address".to_string()));
        }

        let supply = self.total_supply.checked_add(amount).ok_or(GovernanceError::Overflow)?;
        let balance = self.balance_of(&to).checked_add(amount).ok_or(GovernanceError::Overflow)?;

        let delegate = self.delegates.get(&to).copied();
        self.move_voting_power(None, delegate, amount)?;

        self.total_supply = supply;
        self.balances.insert(to, balance);
        let now = self.clock.now();
        write_checkpoint(&mut self.supply_checkpoints, now, supply);

        debug!(to = %to, amount, "minted voting tokens");
        Ok(())
    }

    /// Move tokens between holders, carrying delegated power along.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), GovernanceError> {
        if to.is_zero() {
            return Err(GovernanceError::InvalidParameter("cannot transfer to the zero address".to_string()));
        }

        let available = self.balance_of(&from);
        if available < amount {
            return Err(GovernanceError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        let credited = self.balance_of(&to).checked_add(amount).ok_or(GovernanceError::Overflow)?;

        let from_delegate = self.delegates.get(&from).copied();
        let to_delegate = self.delegates.get(&to).copied();
        self.move_voting_power(from_delegate, to_delegate, amount)?;

        self.balances.insert(from, available - amount);
        let credited = if from == to { available } else { credited };
        self.balances.insert(to, credited);

        debug!(from = %from, to = %to, amount, "transferred voting tokens");
        Ok(())
    }

    /// Point `account`'s whole balance at `delegatee`. The zero address
    /// clears the delegation.
    pub fn delegate(&mut self, account: Address, delegatee: Address) -> Result<(), GovernanceError> {
        let previous = self.delegates.get(&account).copied();
        let next = if delegatee.is_zero() { None } else { Some(delegatee) };
        if previous == next {
            return Ok(());
        }

        let balance = self.balance_of(&account);
        self.move_voting_power(previous, next, balance)?;

        match next {
            Some(d) => self.delegates.insert(account, d),
            None => self.delegates.remove(&account),
        };

        debug!(account = %account, delegatee = %delegatee, "delegate changed");
        Ok(())
    }

    pub fn delegates(&self, account: &Address) -> Option<Address> {
        self.delegates.get(account).copied()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Current voting power.
    pub fn get_votes(&self, account: &Address) -> Amount {
        self.checkpoints
            .get(account)
            .and_then(|cps| cps.last())
            .map(|cp| cp.votes)
            .unwrap_or(0)
    }

    /// Voting power in force at the start of `timepoint`.
    pub fn get_past_votes(&self, account: &Address, timepoint: Timestamp) -> Result<Amount, GovernanceError> {
        self.check_lookup(timepoint)?;
        Ok(self
            .checkpoints
            .get(account)
            .map(|cps| lookup(cps, timepoint))
            .unwrap_or(0))
    }

    /// Total supply in force at the start of `timepoint`.
    pub fn get_past_total_supply(&self, timepoint: Timestamp) -> Result<Amount, GovernanceError> {
        self.check_lookup(timepoint)?;
        Ok(lookup(&self.supply_checkpoints, timepoint))
    }

    /// Raw history for a delegate.
    pub fn checkpoints(&self, account: &Address) -> &[Checkpoint] {
        self.checkpoints.get(account).map(Vec::as_slice).unwrap_or(&[])
    }

    fn check_lookup(&self, timepoint: Timestamp) -> Result<(), GovernanceError> {
        let now = self.clock.now();
        if timepoint > now {
            return Err(GovernanceError::FutureLookup {
                requested: timepoint,
                now,
            });
        }
        Ok(())
    }

    fn move_voting_power(&mut self, from: Option<Address>, to: Option<Address>, amount: Amount) -> Result<(), GovernanceError> {
        if from == to || amount == 0 {
            return Ok(());
        }

        // Compute both sides before writing so a failure leaves no trace.
        let debit = match from {
            Some(src) => Some((src, self.get_votes(&src).checked_sub(amount).ok_or(GovernanceError::Overflow)?)),
            None => None,
        };
        let credit = match to {
            Some(dst) => Some((dst, self.get_votes(&dst).checked_add(amount).ok_or(GovernanceError::Overflow)?)),
            None => None,
        };

        let now = self.clock.now();
        for (account, votes) in debit.into_iter().chain(credit) {
            write_checkpoint(self.checkpoints.entry(account).or_default(), now, votes);
        }
        Ok(())
    }
}

fn write_checkpoint(history: &mut Vec<Checkpoint>, timepoint: Timestamp, votes: Amount) {
    match history.last_mut() {
        Some(last) if last.timepoint == timepoint => last.votes = votes,
        _ => history.push(Checkpoint { timepoint, votes }),
    }
}

fn lookup(history: &[Checkpoint], timepoint: Timestamp) -> Amount {
    let idx = history.partition_point(|cp| cp.timepoint < timepoint);
    if idx == 0 {
        0
    } else {
        history[idx - 1].votes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdchain_types::ManualClock;
    use std::sync::Arc;

    fn alice() -> Address {
        Address::from_bytes([1u8; 20])
    }

    fn bob() -> Address {
        Address::from_bytes([2u8; 20])
    }

    fn setup() -> (Arc<ManualClock>, VotingPowerLedger) {
        let clock = Arc::new(ManualClock::new(0));
        let ledger = VotingPowerLedger::new(clock.clone());
        (clock, ledger)
    }

    #[test]
    fn test_undelegated_balance_has_no_votes() {
        let (_clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();

        assert_eq!(ledger.balance_of(&alice()), 100);
        assert_eq!(ledger.get_votes(&alice()), 0);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_self_delegation_activates_votes() {
        let (_clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        ledger.delegate(alice(), alice()).unwrap();

        assert_eq!(ledger.get_votes(&alice()), 100);
        assert_eq!(ledger.delegates(&alice()), Some(alice()));
    }

    #[test]
    fn test_delegation_moves_power() {
        let (_clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        ledger.delegate(alice(), alice()).unwrap();
        ledger.delegate(alice(), bob()).unwrap();

        assert_eq!(ledger.get_votes(&alice()), 0);
        assert_eq!(ledger.get_votes(&bob()), 100);

        ledger.delegate(alice(), Address::ZERO).unwrap();
        assert_eq!(ledger.get_votes(&bob()), 0);
        assert_eq!(ledger.delegates(&alice()), None);
    }

    #[test]
    fn test_transfer_moves_delegated_power() {
        let (_clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        ledger.delegate(alice(), alice()).unwrap();
        ledger.delegate(bob(), bob()).unwrap();

        ledger.transfer(alice(), bob(), 40).unwrap();
        assert_eq!(ledger.get_votes(&alice()), 60);
        assert_eq!(ledger.get_votes(&bob()), 40);

        let err = ledger.transfer(alice(), bob(), 61).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::InsufficientBalance {
                required: 61,
                available: 60
            }
        );
    }

    #[test]
    fn test_self_transfer_keeps_balance() {
        let (_clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        ledger.transfer(alice(), alice(), 30).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 100);
    }

    #[test]
    fn test_past_votes_see_start_of_timepoint() {
        let (clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        ledger.delegate(alice(), alice()).unwrap();

        // Written at t=0, visible from t=1.
        assert_eq!(ledger.get_past_votes(&alice(), 0).unwrap(), 0);

        clock.advance(1);
        assert_eq!(ledger.get_past_votes(&alice(), 1).unwrap(), 100);

        // A change at t=1 does not alter the value recorded for t=1.
        ledger.delegate(alice(), bob()).unwrap();
        assert_eq!(ledger.get_past_votes(&alice(), 1).unwrap(), 100);

        clock.advance(1);
        assert_eq!(ledger.get_past_votes(&alice(), 2).unwrap(), 0);
        assert_eq!(ledger.get_past_votes(&bob(), 2).unwrap(), 100);
        assert_eq!(ledger.get_past_votes(&alice(), 1).unwrap(), 100);
    }

    #[test]
    fn test_future_lookup_fails() {
        let (_clock, ledger) = setup();
        assert_eq!(
            ledger.get_past_votes(&alice(), 5),
            Err(GovernanceError::FutureLookup { requested: 5, now: 0 })
        );
        assert!(ledger.get_past_total_supply(5).is_err());
    }

    #[test]
    fn test_past_total_supply() {
        let (clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        clock.advance(10);
        ledger.mint(bob(), 50).unwrap();
        clock.advance(1);

        assert_eq!(ledger.get_past_total_supply(5).unwrap(), 100);
        assert_eq!(ledger.get_past_total_supply(11).unwrap(), 150);
    }

    #[test]
    fn test_same_time_changes_share_one_checkpoint() {
        let (_clock, mut ledger) = setup();
        ledger.mint(alice(), 100).unwrap();
        ledger.delegate(alice(), alice()).unwrap();
        ledger.mint(alice(), 20).unwrap();

        assert_eq!(ledger.checkpoints(&alice()).len(), 1);
        assert_eq!(ledger.get_votes(&alice()), 120);
    }

    #[test]
    fn test_mint_to_zero_fails() {
        let (_clock, mut ledger) = setup();
        assert!(ledger.mint(Address::ZERO, 1).is_err());
    }
}
