//! End-to-end milestone flow through governance.

use std::sync::Arc;

use crowdchain_dao::{named_account, Dao, DaoConfig, DaoError};
use crowdchain_funding::FundingError;
use crowdchain_governance::{ActionBatch, ErrorKind, GovernanceError, ProposalState, VoteSupport};
use crowdchain_types::{Address, Hash, ManualClock};

const MIN_DELAY: u64 = 3600;

struct Env {
    clock: Arc<ManualClock>,
    dao: Dao,
    deployer: Address,
    alice: Address,
    bob: Address,
    treasury: Address,
}

fn setup() -> Env {
    let clock = Arc::new(ManualClock::new(1_000));
    let deployer = named_account("deployer");
    let alice = named_account("alice");
    let bob = named_account("bob");

    let mut dao = Dao::deploy(&DaoConfig::default(), clock.clone(), deployer).unwrap();
    dao.mint_and_delegate(alice, 100).unwrap();
    dao.mint_and_delegate(bob, 100).unwrap();

    let campaign = dao
        .create_campaign(deployer, "Test Campaign", "A campaign for testing", 10, 30, alice)
        .unwrap();
    let treasury = dao.deploy_treasury(campaign).unwrap();

    dao.funding_mut().credit(deployer, 50).unwrap();
    dao.deposit(deployer, &treasury, 50).unwrap();

    Env {
        clock,
        dao,
        deployer,
        alice,
        bob,
        treasury,
    }
}

/// Propose and vote For with both holders, then close the vote.
fn approve(env: &mut Env, batch: &ActionBatch, description: &str) -> Hash {
    let id = env.dao.propose(env.alice, batch, description).unwrap();
    env.clock.advance(2);
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Active);

    env.dao.cast_vote(env.alice, id, VoteSupport::For).unwrap();
    env.dao.cast_vote(env.bob, id, VoteSupport::For).unwrap();
    env.clock.advance(50);
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Succeeded);
    id
}

fn pass(env: &mut Env, batch: &ActionBatch, description: &str) -> Hash {
    let id = approve(env, batch, description);
    env.dao.queue(batch, description).unwrap();
    env.clock.advance(MIN_DELAY);
    env.dao.execute(batch, description).unwrap();
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Executed);
    id
}

#[test]
fn test_deploys_correctly() {
    let env = setup();
    let treasury = env.dao.funding().treasury(&env.treasury).unwrap();
    assert_eq!(treasury.owner(), env.dao.scheduler().address());
    assert!(env.dao.funding().campaign(&treasury.campaign()).is_some());
    assert_eq!(env.dao.funding().treasury_balance(&env.treasury).unwrap(), 50);
}

#[test]
fn test_add_then_release_milestone() {
    let mut env = setup();
    let treasury = env.treasury;

    let add = Dao::add_milestone_batch(treasury, 1, 10, "Purchase school supplies").unwrap();
    pass(&mut env, &add, "Add milestone 1");

    let m = env.dao.funding().treasury(&treasury).unwrap().milestone(1).unwrap().clone();
    assert_eq!(m.amount, 10);
    assert!(!m.released);

    let release = Dao::release_milestone_batch(treasury, 1).unwrap();
    pass(&mut env, &release, "Release milestone 1");

    let m = env.dao.funding().treasury(&treasury).unwrap().milestone(1).unwrap().clone();
    assert!(m.released);
    assert_eq!(m.amount, 10);
    assert_eq!(m.description, "Purchase school supplies");
    assert_eq!(env.dao.funding().balance_of(&env.alice), 10);
    assert_eq!(env.dao.funding().treasury_balance(&treasury).unwrap(), 40);
}

#[test]
fn test_execute_before_delay_is_not_ready() {
    let mut env = setup();
    let add = Dao::add_milestone_batch(env.treasury, 1, 10, "supplies").unwrap();
    let id = approve(&mut env, &add, "Add milestone 1");
    env.dao.queue(&add, "Add milestone 1").unwrap();

    let err = env.dao.execute(&add, "Add milestone 1").unwrap_err();
    assert!(matches!(err, DaoError::Governance(GovernanceError::NotReady { .. })));
    assert_eq!(err.kind(), ErrorKind::StatePrecondition);
    assert!(!err.is_terminal());
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Queued);
    assert!(env.dao.funding().treasury(&env.treasury).unwrap().milestone(1).is_none());

    // Retrying after the delay succeeds.
    env.clock.advance(MIN_DELAY);
    env.dao.execute(&add, "Add milestone 1").unwrap();
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Executed);
}

#[test]
fn test_duplicate_milestone_via_second_proposal_fails() {
    let mut env = setup();
    let first = Dao::add_milestone_batch(env.treasury, 1, 10, "supplies").unwrap();
    pass(&mut env, &first, "Add milestone 1");

    let second = Dao::add_milestone_batch(env.treasury, 1, 25, "different").unwrap();
    let id = approve(&mut env, &second, "Add milestone 1 again");
    env.dao.queue(&second, "Add milestone 1 again").unwrap();
    env.clock.advance(MIN_DELAY);

    let err = env.dao.execute(&second, "Add milestone 1 again").unwrap_err();
    match err {
        DaoError::Governance(GovernanceError::CallFailed { index, kind, ref reason }) => {
            assert_eq!(index, 0);
            assert_eq!(kind, ErrorKind::Validation);
            assert!(reason.contains("already exists"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Queued);

    let m = env.dao.funding().treasury(&env.treasury).unwrap().milestone(1).unwrap();
    assert_eq!(m.amount, 10);
    assert_eq!(m.description, "supplies");
}

#[test]
fn test_second_release_fails() {
    let mut env = setup();
    let add = Dao::add_milestone_batch(env.treasury, 1, 10, "supplies").unwrap();
    pass(&mut env, &add, "Add milestone 1");
    let release = Dao::release_milestone_batch(env.treasury, 1).unwrap();
    pass(&mut env, &release, "Release milestone 1");

    approve(&mut env, &release, "Release milestone 1 again");
    env.dao.queue(&release, "Release milestone 1 again").unwrap();
    env.clock.advance(MIN_DELAY);
    let err = env.dao.execute(&release, "Release milestone 1 again").unwrap_err();
    assert!(matches!(
        err,
        DaoError::Governance(GovernanceError::CallFailed {
            kind: ErrorKind::StatePrecondition,
            ..
        })
    ));
    assert_eq!(env.dao.funding().balance_of(&env.alice), 10);
}

#[test]
fn test_failed_batch_is_atomic() {
    let mut env = setup();
    let treasury = env.treasury;

    // Second call releases an unknown milestone, so the first must not stick.
    let add = Dao::add_milestone_batch(treasury, 1, 10, "supplies").unwrap();
    let release = Dao::release_milestone_batch(treasury, 2).unwrap();
    let batch = ActionBatch::new(
        vec![treasury, treasury],
        vec![0, 0],
        vec![add.calldatas[0].clone(), release.calldatas[0].clone()],
    )
    .unwrap();

    approve(&mut env, &batch, "Add 1 and release 2");
    env.dao.queue(&batch, "Add 1 and release 2").unwrap();
    env.clock.advance(MIN_DELAY);

    let err = env.dao.execute(&batch, "Add 1 and release 2").unwrap_err();
    assert!(matches!(err, DaoError::Governance(GovernanceError::CallFailed { index: 1, .. })));
    assert!(env.dao.funding().treasury(&treasury).unwrap().milestone(1).is_none());
}

#[test]
fn test_release_beyond_balance_rolls_back() {
    let mut env = setup();
    let add = Dao::add_milestone_batch(env.treasury, 1, 80, "too much").unwrap();
    pass(&mut env, &add, "Add milestone 1");

    let release = Dao::release_milestone_batch(env.treasury, 1).unwrap();
    approve(&mut env, &release, "Release milestone 1");
    env.dao.queue(&release, "Release milestone 1").unwrap();
    env.clock.advance(MIN_DELAY);

    let err = env.dao.execute(&release, "Release milestone 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(!env.dao.funding().treasury(&env.treasury).unwrap().milestone(1).unwrap().released);
    assert_eq!(env.dao.funding().treasury_balance(&env.treasury).unwrap(), 50);
}

#[test]
fn test_treasury_rejects_direct_calls_after_handover() {
    let mut env = setup();
    let treasury = env.treasury;
    let deployer = env.deployer;
    let err = env
        .dao
        .funding_mut()
        .add_milestone(deployer, &treasury, 1, 10, "bypass")
        .unwrap_err();
    assert!(matches!(err, FundingError::NotOwner { .. }));
}

#[test]
fn test_defeated_proposal_cannot_queue() {
    let mut env = setup();
    let add = Dao::add_milestone_batch(env.treasury, 1, 10, "supplies").unwrap();
    let id = env.dao.propose(env.alice, &add, "Add milestone 1").unwrap();
    env.clock.advance(2);
    env.dao.cast_vote(env.alice, id, VoteSupport::For).unwrap();
    env.dao.cast_vote(env.bob, id, VoteSupport::Against).unwrap();
    env.clock.advance(50);

    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Defeated);
    let err = env.dao.queue(&add, "Add milestone 1").unwrap_err();
    assert!(err.is_terminal());
}

#[test]
fn test_double_vote_rejected() {
    let mut env = setup();
    let add = Dao::add_milestone_batch(env.treasury, 1, 10, "supplies").unwrap();
    let id = env.dao.propose(env.alice, &add, "Add milestone 1").unwrap();
    env.clock.advance(2);

    env.dao.cast_vote(env.bob, id, VoteSupport::For).unwrap();
    let err = env.dao.cast_vote(env.bob, id, VoteSupport::Against).unwrap_err();
    assert!(matches!(err, DaoError::Governance(GovernanceError::AlreadyVoted { .. })));
    assert_eq!(env.dao.governor().proposal_votes(&id).unwrap(), (0, 100, 0));
}

#[test]
fn test_cancel_pending_proposal() {
    let mut env = setup();
    let add = Dao::add_milestone_batch(env.treasury, 1, 10, "supplies").unwrap();
    let id = env.dao.propose(env.alice, &add, "Add milestone 1").unwrap();

    env.dao.cancel(env.deployer, id).unwrap();
    assert_eq!(env.dao.state(&id).unwrap(), ProposalState::Canceled);

    env.clock.advance(2);
    let err = env.dao.cast_vote(env.alice, id, VoteSupport::For).unwrap_err();
    assert!(matches!(err, DaoError::Governance(GovernanceError::VotingClosed(_))));
}
