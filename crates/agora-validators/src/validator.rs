//! Validator records and the pool.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Uptime above which a validator counts as active for consensus.
pub const ACTIVE_UPTIME_FLOOR: f64 = 0.95;

/// A unique validator identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorId(pub u64);

impl std::fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validator-{}", self.0)
    }
}

/// Role a validator serves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorRole {
    /// Resident reviewers for local problems.
    Community,
    /// Credentialed domain professionals.
    Professional,
    /// Institutional notaries for credential validation.
    Institutional,
}

/// A participant in review and consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    pub id: ValidatorId,
    /// Ed25519 verifying key bytes; verification itself is delegated.
    pub public_key: [u8; 32],
    pub role: ValidatorRole,
    pub specializations: Vec<String>,
    pub jurisdictions: Vec<String>,
    pub staked_influence: f64,
    /// In 0..=1; mutated only through settlement outcomes.
    pub reputation: f64,
    pub validations_completed: u32,
    /// Running prediction accuracy in 0..=1.
    pub accuracy: f64,
    pub region: String,
    pub is_active: bool,
    /// Liveness over the recent window, 0..=1.
    pub uptime: f64,
}

impl Validator {
    /// A registered validator with neutral starting stats.
    pub fn new(
        id: ValidatorId,
        public_key: [u8; 32],
        role: ValidatorRole,
        region: impl Into<String>,
        staked_influence: f64,
    ) -> Self {
        Self {
            id,
            public_key,
            role,
            specializations: Vec::new(),
            jurisdictions: Vec::new(),
            staked_influence,
            reputation: 0.5,
            validations_completed: 0,
            accuracy: 0.0,
            region: region.into(),
            is_active: true,
            uptime: 1.0,
        }
    }

    /// Counts toward consensus quorums: flagged active with high uptime.
    pub fn is_live(&self) -> bool {
        self.is_active && self.uptime > ACTIVE_UPTIME_FLOOR
    }
}

/// The registered validator set.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ValidatorPool {
    validators: HashMap<ValidatorId, Validator>,
}

impl ValidatorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a validator.
    pub fn upsert(&mut self, validator: Validator) {
        self.validators.insert(validator.id, validator);
    }

    pub fn get(&self, id: ValidatorId) -> Option<&Validator> {
        self.validators.get(&id)
    }

    pub fn get_mut(&mut self, id: ValidatorId) -> Option<&mut Validator> {
        self.validators.get_mut(&id)
    }

    /// All registered validators.
    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    /// Validators counting toward consensus quorums.
    pub fn live(&self) -> Vec<&Validator> {
        self.validators.values().filter(|v| v.is_live()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
