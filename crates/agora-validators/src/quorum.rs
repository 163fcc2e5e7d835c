//! Quorum selection.
//!
//! Filters the pool to eligible validators, then samples the quorum
//! randomly without replacement. With the diversity requirement on, no
//! region may contribute more than ⌈minimum/3⌉ members.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::validator::{Validator, ValidatorPool, ValidatorRole};
use crate::{Error, Result};

/// Requirements a selected quorum must satisfy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuorumConfig {
    /// Validators to select.
    pub minimum_validators: usize,
    /// Approvals needed for the downstream decision.
    pub required_approvals: usize,
    pub minimum_stake: f64,
    pub minimum_reputation: f64,
    /// Enforce the per-region cap of ⌈minimum/3⌉.
    pub diversity_requirement: bool,
    /// Prefer spreading the draw across regions even under the cap.
    pub geographic_distribution: bool,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            minimum_validators: 4,
            required_approvals: 3,
            minimum_stake: 100.0,
            minimum_reputation: 0.5,
            diversity_requirement: false,
            geographic_distribution: false,
        }
    }
}

impl QuorumConfig {
    /// Per-region member cap when diversity is required.
    pub fn region_cap(&self) -> usize {
        self.minimum_validators.div_ceil(3)
    }
}

/// Select a quorum for a review task.
///
/// The returned list is sorted by descending reputation. The ordering is
/// presentational only; it carries no decision weight.
pub fn select_quorum<R: Rng>(
    pool: &ValidatorPool,
    role: ValidatorRole,
    config: &QuorumConfig,
    rng: &mut R,
) -> Result<Vec<Validator>> {
    if config.minimum_validators == 0 {
        return Err(Error::EmptyQuorum);
    }
    let mut eligible: Vec<&Validator> = pool
        .iter()
        .filter(|v| {
            v.is_active
                && v.role == role
                && v.staked_influence >= config.minimum_stake
                && v.reputation >= config.minimum_reputation
        })
        .collect();

    if eligible.len() < config.minimum_validators {
        return Err(Error::InsufficientEligibleValidators {
            eligible: eligible.len(),
            required: config.minimum_validators,
        });
    }

    // Stable pre-shuffle order keeps the draw reproducible per seed.
    eligible.sort_by_key(|v| v.id);
    eligible.shuffle(rng);

    let mut selected: Vec<Validator> = if config.diversity_requirement {
        select_with_region_cap(&eligible, config)?
    } else {
        eligible
            .iter()
            .take(config.minimum_validators)
            .map(|v| (*v).clone())
            .collect()
    };

    selected.sort_by(|a, b| {
        b.reputation
            .partial_cmp(&a.reputation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    debug!(
        selected = selected.len(),
        ?role,
        diverse = config.diversity_requirement,
        "quorum selected"
    );
    Ok(selected)
}

/// Draw under the per-region cap, in shuffled order.
///
/// When `geographic_distribution` is also set, the draw round-robins
/// across regions to maximize spread below the cap.
fn select_with_region_cap(eligible: &[&Validator], config: &QuorumConfig) -> Result<Vec<Validator>> {
    let cap = config.region_cap();

    let mut region_counts: HashMap<&str, usize> = HashMap::new();
    for v in eligible {
        *region_counts.entry(v.region.as_str()).or_insert(0) += 1;
    }
    let reachable: usize = region_counts.values().map(|&n| n.min(cap)).sum();
    if reachable < config.minimum_validators {
        return Err(Error::DiversityUnreachable {
            regions: region_counts.len(),
            cap,
            required: config.minimum_validators,
        });
    }

    let mut taken: HashMap<&str, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(config.minimum_validators);

    if config.geographic_distribution {
        // Round-robin: one per region per sweep until full.
        let mut remaining: Vec<&Validator> = eligible.to_vec();
        while selected.len() < config.minimum_validators {
            let mut advanced = false;
            let mut swept: Vec<&str> = Vec::new();
            remaining.retain(|v| {
                if selected.len() >= config.minimum_validators {
                    return true;
                }
                let count = taken.get(v.region.as_str()).copied().unwrap_or(0);
                if count < cap && !swept.contains(&v.region.as_str()) {
                    swept.push(v.region.as_str());
                    *taken.entry(v.region.as_str()).or_insert(0) += 1;
                    selected.push((*v).clone());
                    advanced = true;
                    false
                } else {
                    true
                }
            });
            if !advanced {
                break;
            }
        }
    } else {
        for v in eligible {
            if selected.len() >= config.minimum_validators {
                break;
            }
            let count = taken.entry(v.region.as_str()).or_insert(0);
            if *count < cap {
                *count += 1;
                selected.push((*v).clone());
            }
        }
    }

    // The reachability check above guarantees the target.
    debug_assert_eq!(selected.len(), config.minimum_validators);
    Ok(selected)
}
