//! Scheduler (timelock).
//!
//! Every action batch passes through here between approval and execution.
//! Scheduling fixes `ready_at = now + min_delay`; running checks the delay,
//! the optional predecessor and replay protection, then performs the calls
//! in order against a working copy of the target state. The copy only
//! replaces the live state when every call succeeded.

use std::collections::{HashMap, HashSet};

use crowdchain_types::{Address, Amount, Hash, SharedClock, Timestamp};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ErrorClass, GovernanceError};
use crate::proposal::validate_batch;

/// Scheduler roles. Membership is an explicit set per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    /// Grants and revokes roles
    Admin,
    /// Schedules and cancels operations
    Proposer,
    /// Runs ready operations
    Executor,
}

/// Target side of the scheduler: performs one call on behalf of `caller`.
pub trait CallDispatcher {
    type Error: std::error::Error + ErrorClass;

    fn dispatch(&mut self, caller: Address, target: Address, value: Amount, calldata: &[u8]) -> Result<(), Self::Error>;
}

/// Lifecycle of a scheduled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    /// Never scheduled (or canceled)
    Unset,
    /// Scheduled, delay not elapsed
    Waiting,
    /// Delay elapsed, not yet run
    Ready,
    /// Ran successfully
    Done,
}

/// A scheduled action batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledOperation {
    pub id: Hash,
    pub predecessor: Hash,
    pub scheduled_at: Timestamp,
    pub ready_at: Timestamp,
    pub executed: bool,
}

/// Scheduler event log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TimelockEvent {
    CallScheduled {
        id: Hash,
        calls: usize,
        predecessor: Hash,
        ready_at: Timestamp,
    },
    CallExecuted {
        id: Hash,
        calls: usize,
    },
    Cancelled {
        id: Hash,
    },
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
}

/// Deterministic operation id: blake3 over the borsh encoding of
/// `(targets, values, calldatas, predecessor, salt)`.
pub fn hash_operation(
    targets: &[Address],
    values: &[Amount],
    calldatas: &[Vec<u8>],
    predecessor: &Hash,
    salt: &Hash,
) -> Result<Hash, GovernanceError> {
    let encoded = borsh::to_vec(&(targets, values, calldatas, predecessor, salt))
        .map_err(|e| GovernanceError::Encoding(e.to_string()))?;
    Ok(Hash::compute(&encoded))
}

/// Role-gated delay queue.
#[derive(Debug)]
pub struct Scheduler {
    /// Own address; the caller seen by dispatched targets
    address: Address,
    clock: SharedClock,
    /// Fixed at construction
    min_delay: u64,
    roles: HashMap<Role, HashSet<Address>>,
    operations: HashMap<Hash, ScheduledOperation>,
    events: Vec<TimelockEvent>,
}

impl Scheduler {
    /// Create a scheduler. The scheduler itself always holds `Admin`;
    /// `admin` may be `Address::ZERO` to skip the external admin.
    pub fn new(
        address: Address,
        clock: SharedClock,
        min_delay: u64,
        proposers: &[Address],
        executors: &[Address],
        admin: Address,
    ) -> Self {
        let mut scheduler = Self {
            address,
            clock,
            min_delay,
            roles: HashMap::new(),
            operations: HashMap::new(),
            events: Vec::new(),
        };

        scheduler.insert_role(Role::Admin, address, address);
        if !admin.is_zero() {
            scheduler.insert_role(Role::Admin, admin, address);
        }
        for proposer in proposers {
            scheduler.insert_role(Role::Proposer, *proposer, address);
        }
        for executor in executors {
            scheduler.insert_role(Role::Executor, *executor, address);
        }

        info!(address = %address, min_delay, "scheduler created");
        scheduler
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn min_delay(&self) -> u64 {
        self.min_delay
    }

    pub fn events(&self) -> &[TimelockEvent] {
        &self.events
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles.get(&role).map(|members| members.contains(account)).unwrap_or(false)
    }

    pub fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), GovernanceError> {
        self.require_role(Role::Admin, &caller)?;
        self.insert_role(role, account, caller);
        Ok(())
    }

    pub fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), GovernanceError> {
        self.require_role(Role::Admin, &caller)?;
        let removed = self.roles.get_mut(&role).map(|members| members.remove(&account)).unwrap_or(false);
        if removed {
            info!(role = ?role, account = %account, "role revoked");
            self.events.push(TimelockEvent::RoleRevoked {
                role,
                account,
                sender: caller,
            });
        }
        Ok(())
    }

    /// Queue a batch. Returns the time from which it may run.
    pub fn schedule(
        &mut self,
        caller: Address,
        targets: &[Address],
        values: &[Amount],
        calldatas: &[Vec<u8>],
        predecessor: Hash,
        salt: Hash,
    ) -> Result<Timestamp, GovernanceError> {
        self.require_role(Role::Proposer, &caller)?;
        validate_batch(targets, values, calldatas)?;

        let id = hash_operation(targets, values, calldatas, &predecessor, &salt)?;
        if self.operations.contains_key(&id) {
            return Err(GovernanceError::OperationAlreadyScheduled(id));
        }

        let now = self.clock.now();
        let ready_at = now.checked_add(self.min_delay).ok_or(GovernanceError::Overflow)?;
        self.operations.insert(
            id,
            ScheduledOperation {
                id,
                predecessor,
                scheduled_at: now,
                ready_at,
                executed: false,
            },
        );

        info!(operation = %id.short(), ready_at, calls = targets.len(), "operation scheduled");
        self.events.push(TimelockEvent::CallScheduled {
            id,
            calls: targets.len(),
            predecessor,
            ready_at,
        });
        Ok(ready_at)
    }

    /// Drop a scheduled operation that has not run.
    pub fn cancel(&mut self, caller: Address, id: Hash) -> Result<(), GovernanceError> {
        self.require_role(Role::Proposer, &caller)?;
        match self.operations.get(&id) {
            None => return Err(GovernanceError::OperationNotScheduled(id)),
            Some(op) if op.executed => return Err(GovernanceError::AlreadyExecuted(id)),
            Some(_) => {}
        }
        self.operations.remove(&id);

        info!(operation = %id.short(), "operation cancelled");
        self.events.push(TimelockEvent::Cancelled { id });
        Ok(())
    }

    pub fn operation(&self, id: &Hash) -> Option<&ScheduledOperation> {
        self.operations.get(id)
    }

    pub fn operation_state(&self, id: &Hash) -> OperationState {
        match self.operations.get(id) {
            None => OperationState::Unset,
            Some(op) if op.executed => OperationState::Done,
            Some(op) if self.clock.now() >= op.ready_at => OperationState::Ready,
            Some(_) => OperationState::Waiting,
        }
    }

    /// Scheduled and not executed.
    pub fn is_operation_pending(&self, id: &Hash) -> bool {
        matches!(self.operation_state(id), OperationState::Waiting | OperationState::Ready)
    }

    pub fn is_operation_ready(&self, id: &Hash) -> bool {
        self.operation_state(id) == OperationState::Ready
    }

    pub fn is_operation_done(&self, id: &Hash) -> bool {
        self.operation_state(id) == OperationState::Done
    }

    /// Ready time of a scheduled operation.
    pub fn timestamp(&self, id: &Hash) -> Option<Timestamp> {
        self.operations.get(id).map(|op| op.ready_at)
    }

    /// Run a ready batch. All calls succeed together or none take effect.
    #[allow(clippy::too_many_arguments)]
    pub fn run<D>(
        &mut self,
        caller: Address,
        targets: &[Address],
        values: &[Amount],
        calldatas: &[Vec<u8>],
        predecessor: Hash,
        salt: Hash,
        dispatcher: &mut D,
    ) -> Result<(), GovernanceError>
    where
        D: CallDispatcher + Clone,
    {
        self.require_role(Role::Executor, &caller)?;
        validate_batch(targets, values, calldatas)?;

        let id = hash_operation(targets, values, calldatas, &predecessor, &salt)?;
        let now = self.clock.now();
        match self.operations.get(&id) {
            None => return Err(GovernanceError::OperationNotScheduled(id)),
            Some(op) if op.executed => return Err(GovernanceError::AlreadyExecuted(id)),
            Some(op) if now < op.ready_at => {
                return Err(GovernanceError::NotReady {
                    id,
                    ready_at: op.ready_at,
                    now,
                })
            }
            Some(_) => {}
        }

        if !predecessor.is_zero() && !self.is_operation_done(&predecessor) {
            return Err(GovernanceError::PredecessorNotExecuted(predecessor));
        }

        let mut working = dispatcher.clone();
        for (index, ((target, value), calldata)) in targets.iter().zip(values).zip(calldatas).enumerate() {
            debug!(operation = %id.short(), index, target = %target, value, "dispatching call");
            if let Err(e) = working.dispatch(self.address, *target, *value, calldata) {
                warn!(operation = %id.short(), index, error = %e, "call failed, operation not executed");
                return Err(GovernanceError::CallFailed {
                    index,
                    kind: e.kind(),
                    reason: e.to_string(),
                });
            }
        }
        *dispatcher = working;

        if let Some(op) = self.operations.get_mut(&id) {
            op.executed = true;
        }

        info!(operation = %id.short(), calls = targets.len(), "operation executed");
        self.events.push(TimelockEvent::CallExecuted {
            id,
            calls: targets.len(),
        });
        Ok(())
    }

    fn require_role(&self, role: Role, account: &Address) -> Result<(), GovernanceError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(GovernanceError::MissingRole { account: *account, role })
        }
    }

    fn insert_role(&mut self, role: Role, account: Address, sender: Address) {
        if self.roles.entry(role).or_default().insert(account) {
            info!(role = ?role, account = %account, "role granted");
            self.events.push(TimelockEvent::RoleGranted { role, account, sender });
        }
    }
}
