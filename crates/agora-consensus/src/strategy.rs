//! Vote strategies.
//!
//! Consensus simulation needs validator decisions from somewhere. The
//! [`VoteStrategy`] seam keeps that pluggable: tests inject deterministic
//! strategies, simulations inject probabilistic ones, and a production
//! deployment feeds real validator input through the engine directly.

use agora_validators::{Validator, ValidatorPool};

use crate::engine::{ConsensusEngine, Phase, ProposalId, SignatureRef};
use crate::Result;

/// Decides how a validator votes on a proposal.
pub trait VoteStrategy {
    /// Whether the validator supports the proposal in this phase.
    fn vote(&mut self, proposal: ProposalId, validator: &Validator) -> bool;
}

/// Every validator votes the same fixed way.
#[derive(Debug, Clone, Copy)]
pub struct FixedStrategy(pub bool);

impl VoteStrategy for FixedStrategy {
    fn vote(&mut self, _proposal: ProposalId, _validator: &Validator) -> bool {
        self.0
    }
}

/// Votes yes with a fixed probability per (proposal, validator) draw.
///
/// Deterministic per seed; the draw is a pure function of the seed and
/// identities, so replays agree.
#[derive(Debug, Clone)]
pub struct ProbabilisticStrategy {
    pub approve_probability: f64,
    pub seed: u64,
}

impl VoteStrategy for ProbabilisticStrategy {
    fn vote(&mut self, proposal: ProposalId, validator: &Validator) -> bool {
        // Cheap splitmix-style scramble of (seed, proposal, validator).
        let mut x = self
            .seed
            .wrapping_add(proposal.0.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add(validator.id.0.wrapping_mul(0xBF58_476D_1CE4_E5B9));
        x ^= x >> 30;
        x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
        x ^= x >> 31;
        (x as f64 / u64::MAX as f64) < self.approve_probability
    }
}

/// Drive one whole round with locally delivered votes.
///
/// Initiates the proposal, then collects prepare and commit messages from
/// every live validator the strategy approves of. Returns the phase the
/// round ended in; a round that stalls below threshold simply stays there.
pub fn simulate_round<S: VoteStrategy>(
    engine: &mut ConsensusEngine,
    proposal: ProposalId,
    leader: agora_validators::ValidatorId,
    pool: &ValidatorPool,
    strategy: &mut S,
) -> Result<Phase> {
    engine.initiate(proposal, leader, pool, SignatureRef::unsigned())?;

    let voters: Vec<&Validator> = pool.live();
    for validator in &voters {
        if strategy.vote(proposal, validator) {
            engine.add_prepare(proposal, validator.id, SignatureRef::unsigned())?;
        }
    }
    if engine.get_state(proposal)?.phase < Phase::Commit {
        return Ok(engine.get_state(proposal)?.phase);
    }
    for validator in &voters {
        if strategy.vote(proposal, validator) {
            engine.add_commit(proposal, validator.id, SignatureRef::unsigned())?;
        }
    }
    Ok(engine.get_state(proposal)?.phase)
}
