//! The civic coordination pipeline.
//!
//! One [`CivicEngine`] owns every stage: trust-gated signal admission,
//! clustering, hierarchical promotion, quorum review under three-phase
//! consensus, capture auditing, zero-sum settlement, and the audit ledger.
//! All state is constructor-injected and explicit.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use agora_audit::{detect_capture, CaptureAlert, CartelReport, VoteContext, VotingHistory};
use agora_consensus::{
    ConsensusEngine, ConsensusState, Phase, ProposalId, SignatureRef, SignatureVerifier,
    VoteStrategy,
};
use agora_economy::{Outcome, Settlement, SettlementEngine};
use agora_geo::{CellId, Resolution};
use agora_ledger::{EventKind, Ledger, LedgerExport};
use agora_signals::{
    Category, ClusterId, ClusterIdGen, Problem, ProblemId, PromotionEngine, PromotionEvent,
    Signal, SignalCluster, SignalClusterer, SignalId, SignalStatus, Summarizer,
};
use agora_trust::{AccountId, LocationProof, LocationVerdict, TrustScorer, VerificationKind};
use agora_validators::{
    select_quorum, CredentialDecision, CredentialOutcome, CredentialValidationRequest,
    QuorumConfig, RequestId, Validator, ValidatorId, ValidatorPool, ValidatorRole,
};

use crate::store::{ContentArchive, ContentId, KvStore};
use crate::{Error, Result};

/// Neighborhood-scale cells; fine enough to localize a report, coarse
/// enough to blur the submitter.
const DEFAULT_RESOLUTION: Resolution = match Resolution::new(9) {
    Ok(resolution) => resolution,
    Err(_) => panic!("resolution 9 is within range"),
};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cell resolution signals are blurred into.
    pub resolution: Resolution,
    /// Quorum requirements for problem review and credential validation.
    pub quorum: QuorumConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            quorum: QuorumConfig::default(),
        }
    }
}

/// Result of admitting (or quarantining) one signal.
#[derive(Debug, Clone)]
pub struct SignalAdmission {
    pub signal_id: SignalId,
    pub cell: CellId,
    /// The trust gate's decision; rejected signals are stored but never
    /// clustered.
    pub verdict: LocationVerdict,
    /// Archive address of the full description, when an archive is wired.
    pub content: Option<ContentId>,
}

/// What one clustering-and-promotion sweep produced.
#[derive(Debug, Clone, Default)]
pub struct ClusteringReport {
    pub clusters_formed: Vec<ClusterId>,
    /// Signals still waiting for enough neighbors.
    pub deferred: Vec<SignalId>,
    pub promotions: Vec<PromotionEvent>,
    pub new_problems: Vec<Problem>,
}

/// Result of one problem review round.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub proposal: ProposalId,
    pub phase: Phase,
    /// Quorum membership, descending reputation.
    pub quorum: Vec<ValidatorId>,
    /// Present only when the round finalized and settled.
    pub settlement: Option<Settlement>,
    pub cartel: CartelReport,
    pub capture: Option<CaptureAlert>,
}

/// The assembled pipeline.
///
/// The ledger sits behind a mutex because it is the one strictly ordered
/// sequence in the system; everything else is owned single-threaded state.
pub struct CivicEngine {
    config: EngineConfig,
    trust: TrustScorer,
    clusterer: SignalClusterer,
    cluster_ids: ClusterIdGen,
    promotion: PromotionEngine,
    pool: ValidatorPool,
    consensus: ConsensusEngine,
    settlement: SettlementEngine,
    consensus_history: VotingHistory,
    credential_history: VotingHistory,
    credentials: HashMap<RequestId, CredentialValidationRequest>,
    ledger: Mutex<Ledger>,
    summarizer: Option<Box<dyn Summarizer>>,
    archive: Option<Box<dyn ContentArchive>>,
    signals: Vec<Signal>,
    quarantined: Vec<Signal>,
    surfaced: usize,
    next_signal: u64,
    next_proposal: u64,
    next_request: u64,
}

impl CivicEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            trust: TrustScorer::new(),
            clusterer: SignalClusterer::new(),
            cluster_ids: ClusterIdGen::new(),
            promotion: PromotionEngine::new(),
            pool: ValidatorPool::new(),
            consensus: ConsensusEngine::new(),
            settlement: SettlementEngine::new(),
            consensus_history: VotingHistory::new(),
            credential_history: VotingHistory::new(),
            credentials: HashMap::new(),
            ledger: Mutex::new(Ledger::new()),
            summarizer: None,
            archive: None,
            signals: Vec::new(),
            quarantined: Vec::new(),
            surfaced: 0,
            next_signal: 0,
            next_proposal: 0,
            next_request: 0,
        }
    }

    /// Wire an external semantic summarizer; the lexical fallback still
    /// covers its failures.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Wire a content archive for bulk payloads.
    #[must_use]
    pub fn with_archive(mut self, archive: Box<dyn ContentArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Replace the consensus signature verifier (default accepts all).
    #[must_use]
    pub fn with_signature_verifier(mut self, verifier: Box<dyn SignatureVerifier>) -> Self {
        self.consensus = ConsensusEngine::with_verifier(verifier);
        self
    }

    // --- membership and trust ---

    /// Register or replace a validator.
    pub fn register_validator(&mut self, validator: Validator) {
        self.pool.upsert(validator);
    }

    pub fn pool(&self) -> &ValidatorPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ValidatorPool {
        &mut self.pool
    }

    /// Record a completed account verification.
    pub fn record_verification(&mut self, account: AccountId, kind: VerificationKind) {
        self.trust.record_verification(account, kind);
    }

    /// Composite trust score for an account, 0..=100.
    pub fn trust_score(&self, account: AccountId) -> u32 {
        self.trust.trust_score(account)
    }

    // --- signal intake ---

    /// Submit a signal through the trust gate.
    ///
    /// The location proof is always evaluated and recorded; a rejected
    /// signal is quarantined (stored, never clustered) and the verdict
    /// says why. Admission itself is never an error.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_signal(
        &mut self,
        account: AccountId,
        lat: f64,
        lng: f64,
        category: Category,
        description: impl Into<String>,
        submitted_at: u64,
        proof: LocationProof,
    ) -> SignalAdmission {
        let cell = CellId::from_lat_lng(lat, lng, self.config.resolution);
        let verdict = self.trust.verify_location(account, proof);

        let signal_id = SignalId(self.next_signal);
        self.next_signal += 1;
        let signal = Signal::new(signal_id, cell, category, description, submitted_at);

        let content = self
            .archive
            .as_mut()
            .map(|archive| archive.store(signal.description.as_bytes()));

        if verdict.accepted {
            self.record(
                EventKind::SignalSubmitted,
                json!({
                    "signal": signal_id.0,
                    "cell": cell.to_string(),
                    "category": category,
                    "content": &content,
                }),
            );
            self.signals.push(signal);
        } else {
            warn!(signal = %signal_id, reason = ?verdict.reason, "signal quarantined");
            self.quarantined.push(signal);
        }

        SignalAdmission {
            signal_id,
            cell,
            verdict,
            content,
        }
    }

    /// Attest an admitted signal.
    pub fn attest(&mut self, signal: SignalId) -> Result<()> {
        let found = self
            .signals
            .iter_mut()
            .find(|s| s.id == signal)
            .ok_or(Error::UnknownSignal(signal))?;
        found.attest();
        Ok(())
    }

    /// Admitted signals, in submission order.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Signals the trust gate rejected.
    pub fn quarantined(&self) -> &[Signal] {
        &self.quarantined
    }

    // --- clustering and promotion ---

    /// Run one clustering pass and cascade promotions.
    ///
    /// Newly formed clusters, promotions, and surfaced problems all land
    /// in the ledger.
    pub fn run_clustering(&mut self) -> Result<ClusteringReport> {
        let pass = self.clusterer.pass(
            &mut self.signals,
            &mut self.cluster_ids,
            self.summarizer.as_deref(),
        );

        let mut report = ClusteringReport {
            deferred: pass.deferred,
            ..ClusteringReport::default()
        };
        for cluster in pass.clusters {
            self.record(
                EventKind::ClusterFormed,
                json!({
                    "cluster": cluster.id.0,
                    "cell": cluster.cell.to_string(),
                    "category": cluster.category,
                    "weight": cluster.weight,
                    "signals": cluster.signal_count,
                }),
            );
            report.clusters_formed.push(cluster.id);
            self.promotion.ingest(cluster);
        }

        report.promotions = self.promotion.evaluate(&mut self.cluster_ids);
        for event in &report.promotions {
            self.record(EventKind::ClusterPromoted, serde_json::to_value(event)?);
        }

        // Promotion marks the member snapshots inside the clusters; the
        // canonical signal records here must mirror that transition.
        let promoted: HashSet<SignalId> = report
            .promotions
            .iter()
            .flat_map(|event| event.child_cluster_ids.iter())
            .filter_map(|id| self.promotion.cluster(*id).ok())
            .flat_map(|cluster| cluster.members.iter().map(|m| m.id))
            .collect();
        for signal in &mut self.signals {
            if promoted.contains(&signal.id) {
                signal.status = SignalStatus::Promoted;
            }
        }

        let problems = self.promotion.problems();
        for problem in &problems[self.surfaced..] {
            self.record(EventKind::ProblemSurfaced, serde_json::to_value(problem)?);
            report.new_problems.push(problem.clone());
        }
        self.surfaced = problems.len();

        if !report.new_problems.is_empty() {
            info!(problems = report.new_problems.len(), "problems surfaced");
        }
        Ok(report)
    }

    /// Problems surfaced so far.
    pub fn problems(&self) -> &[Problem] {
        self.promotion.problems()
    }

    /// All tracked clusters.
    pub fn clusters(&self) -> impl Iterator<Item = &SignalCluster> {
        self.promotion.clusters()
    }

    // --- review, audit, settlement ---

    /// Run a full review round over a surfaced problem.
    ///
    /// Selects a quorum, drives three-phase consensus with the supplied
    /// strategy, feeds the votes to cartel detection, checks stake
    /// concentration, and settles influence if the round finalized. The
    /// round stalling below threshold is a valid outcome, not an error.
    pub fn review_problem<S, R>(
        &mut self,
        problem: ProblemId,
        role: ValidatorRole,
        strategy: &mut S,
        rng: &mut R,
    ) -> Result<ReviewOutcome>
    where
        S: VoteStrategy,
        R: Rng,
    {
        self.promotion
            .problems()
            .iter()
            .find(|p| p.id == problem)
            .ok_or(Error::UnknownProblem(problem))?;

        let quorum = select_quorum(&self.pool, role, &self.config.quorum, rng)?;
        let proposal = ProposalId(self.next_proposal);
        self.next_proposal += 1;

        // The round runs over the selected quorum, led by its most
        // reputable member.
        let mut round_pool = ValidatorPool::new();
        for validator in &quorum {
            round_pool.upsert(validator.clone());
        }
        let leader = quorum[0].id;

        let votes: Vec<(ValidatorId, bool)> = quorum
            .iter()
            .map(|v| (v.id, strategy.vote(proposal, v)))
            .collect();

        self.consensus
            .initiate(proposal, leader, &round_pool, SignatureRef::unsigned())?;
        for &(validator, approve) in &votes {
            if approve {
                self.consensus
                    .add_prepare(proposal, validator, SignatureRef::unsigned())?;
            }
        }
        if self.consensus.get_state(proposal)?.phase >= Phase::Commit {
            for &(validator, approve) in &votes {
                if approve {
                    self.consensus
                        .add_commit(proposal, validator, SignatureRef::unsigned())?;
                }
            }
        }
        let phase = self.consensus.get_state(proposal)?.phase;

        self.consensus_history.record_round(&votes);
        let cartel = self.consensus_history.detect_cartels(VoteContext::Consensus);
        if !cartel.is_clean() {
            self.record(
                EventKind::CaptureAlert,
                json!({
                    "kind": "cartel",
                    "context": VoteContext::Consensus,
                    "flagged": cartel.flagged,
                }),
            );
        }

        let stakes: Vec<(ValidatorId, f64)> =
            self.pool.iter().map(|v| (v.id, v.staked_influence)).collect();
        let capture = detect_capture(&stakes);
        if let Some(alert) = &capture {
            self.record(EventKind::CaptureAlert, json!({ "kind": "whale", "alert": alert }));
        }

        let settlement = if phase == Phase::Finalized {
            // A finalized round means the proposal carried; each member's
            // vote is scored against that result at their reputation.
            let outcomes: Vec<Outcome> = votes
                .iter()
                .map(|&(id, approve)| {
                    let confidence = self
                        .pool
                        .get(id)
                        .map_or(0.5, |v| v.reputation);
                    Outcome::from_prediction(id, approve, true, confidence)
                })
                .collect();
            let settlement = self.settlement.settle(proposal, &outcomes)?;
            self.settlement
                .apply_to_pool(&settlement, &outcomes, &mut self.pool)?;

            self.record(
                EventKind::ConsensusFinalized,
                json!({
                    "proposal": proposal.0,
                    "problem": problem.0,
                    "members": votes.len(),
                }),
            );
            self.record(
                EventKind::SettlementCommitted,
                serde_json::to_value(&settlement)?,
            );
            Some(settlement)
        } else {
            None
        };

        Ok(ReviewOutcome {
            proposal,
            phase,
            quorum: quorum.iter().map(|v| v.id).collect(),
            settlement,
            cartel,
            capture,
        })
    }

    /// Round state for a proposal.
    pub fn consensus_state(&self, proposal: ProposalId) -> Result<&ConsensusState> {
        Ok(self.consensus.get_state(proposal)?)
    }

    // --- credential validation ---

    /// Open a credential validation round over an institutional quorum.
    pub fn open_credential_request<R: Rng>(
        &mut self,
        credential_type: impl Into<String>,
        rng: &mut R,
    ) -> Result<RequestId> {
        let quorum = select_quorum(
            &self.pool,
            ValidatorRole::Institutional,
            &self.config.quorum,
            rng,
        )?;
        let id = RequestId(self.next_request);
        self.next_request += 1;
        let request = CredentialValidationRequest::new(
            id,
            credential_type,
            quorum.iter().map(|v| v.id).collect(),
            self.config.quorum.required_approvals,
        );
        self.credentials.insert(id, request);
        Ok(id)
    }

    /// Record one validator's credential decision.
    ///
    /// When this decision settles the round, the votes feed credential
    /// cartel detection and the outcome lands in the ledger.
    pub fn record_credential_decision(
        &mut self,
        request: RequestId,
        validator: ValidatorId,
        approve: bool,
        confidence: f64,
    ) -> Result<CredentialOutcome> {
        let stake = self
            .pool
            .get(validator)
            .map_or(0.0, |v| v.staked_influence);
        let entry = self
            .credentials
            .get_mut(&request)
            .ok_or(Error::UnknownRequest(request))?;
        let was_pending = entry.outcome() == CredentialOutcome::Pending;

        let outcome = entry.record_decision(
            validator,
            CredentialDecision {
                approve,
                confidence,
                stake,
            },
        )?;

        if was_pending && outcome != CredentialOutcome::Pending {
            let votes: Vec<(ValidatorId, bool)> = entry.votes().collect();
            self.credential_history.record_round(&votes);
            let cartel = self
                .credential_history
                .detect_cartels(VoteContext::Credential);
            if !cartel.is_clean() {
                self.record(
                    EventKind::CaptureAlert,
                    json!({
                        "kind": "cartel",
                        "context": VoteContext::Credential,
                        "flagged": cartel.flagged,
                    }),
                );
            }
            self.record(
                EventKind::CredentialDecided,
                json!({ "request": request.0, "outcome": outcome }),
            );
        }
        Ok(outcome)
    }

    /// Where a credential round stands.
    pub fn credential_outcome(&self, request: RequestId) -> Result<CredentialOutcome> {
        self.credentials
            .get(&request)
            .map(CredentialValidationRequest::outcome)
            .ok_or(Error::UnknownRequest(request))
    }

    // --- ledger and externalization ---

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, kind: EventKind, payload: serde_json::Value) {
        self.ledger().append(kind, payload);
    }

    /// Recompute the whole ledger chain.
    pub fn verify_ledger(&self) -> Result<()> {
        Ok(self.ledger().verify_chain_integrity()?)
    }

    /// Full ledger export for third-party re-verification.
    pub fn ledger_export(&self) -> LedgerExport {
        self.ledger().export()
    }

    /// Ledger export as JSON.
    pub fn export_audit(&self) -> Result<String> {
        Ok(self.ledger().export_json()?)
    }

    /// Externalize durable state to a key-value store.
    ///
    /// Ledger, validator pool, tracked clusters, and the cluster id
    /// allocator round-trip as JSON under fixed keys.
    pub fn snapshot(&self, store: &mut dyn KvStore) -> Result<()> {
        store.set("ledger", serde_json::to_value(self.ledger().export())?);
        store.set("validators", serde_json::to_value(&self.pool)?);
        let clusters: Vec<&SignalCluster> = self.promotion.clusters().collect();
        store.set("clusters", serde_json::to_value(&clusters)?);
        store.set("cluster_ids", serde_json::to_value(&self.cluster_ids)?);
        Ok(())
    }

    /// Restore externalized state from a key-value store.
    ///
    /// Missing keys are skipped; a present-but-tampered ledger is
    /// rejected.
    pub fn restore(&mut self, store: &dyn KvStore) -> Result<()> {
        if let Some(value) = store.get("validators") {
            self.pool = serde_json::from_value(value)?;
        }
        if let Some(value) = store.get("clusters") {
            let clusters: Vec<SignalCluster> = serde_json::from_value(value)?;
            for cluster in clusters {
                self.promotion.ingest(cluster);
            }
        }
        if let Some(value) = store.get("cluster_ids") {
            self.cluster_ids = serde_json::from_value(value)?;
        }
        if let Some(value) = store.get("ledger") {
            let export: LedgerExport = serde_json::from_value(value)?;
            *self.ledger() = Ledger::from_export(export)?;
        }
        Ok(())
    }
}
