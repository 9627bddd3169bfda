//! Consumer-side waiting for proposal state transitions.
//!
//! The core never blocks on time. Callers that need a proposal to reach a
//! state poll it here with a bounded, backing-off loop.

use std::time::Duration;

use crowdchain_governance::{GovernanceError, ProposalState};
use thiserror::Error;
use tracing::{debug, warn};

/// Loop bounds for [`wait_for_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay before the second probe
    pub interval: Duration,
    pub max_tries: u32,
    /// Interval multiplier after each miss
    pub backoff_factor: u32,
    /// Upper bound for the interval
    pub max_interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_tries: 20,
            backoff_factor: 2,
            max_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PollError {
    #[error("no target states given")]
    NoTargets,

    #[error("timed out after {tries} tries (last observed: {last:?})")]
    Timeout { tries: u32, last: Option<ProposalState> },

    #[error("proposal is {0}, no target state can follow")]
    Unreachable(ProposalState),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

/// Probe until the state is one of `targets`.
///
/// Fails fast when the observed state can no longer lead to any target, or
/// when the probe returns an error that retrying cannot clear.
pub async fn wait_for_state<F>(mut probe: F, targets: &[ProposalState], options: &PollOptions) -> Result<ProposalState, PollError>
where
    F: FnMut() -> Result<ProposalState, GovernanceError>,
{
    if targets.is_empty() {
        return Err(PollError::NoTargets);
    }

    let mut delay = options.interval;
    let mut last = None;

    for attempt in 1..=options.max_tries {
        match probe() {
            Ok(state) if targets.contains(&state) => {
                debug!(attempt, state = %state, "target state reached");
                return Ok(state);
            }
            Ok(state) => {
                if !targets.iter().any(|t| state.can_reach(*t)) {
                    return Err(PollError::Unreachable(state));
                }
                debug!(attempt, state = %state, "waiting for state");
                last = Some(state);
            }
            Err(e) if e.is_retryable() => {
                warn!(attempt, error = %e, "probe failed, retrying");
            }
            Err(e) => return Err(e.into()),
        }

        if attempt < options.max_tries {
            tokio::time::sleep(delay).await;
            delay = delay
                .saturating_mul(options.backoff_factor.max(1))
                .min(options.max_interval);
        }
    }

    Err(PollError::Timeout {
        tries: options.max_tries,
        last,
    })
}
