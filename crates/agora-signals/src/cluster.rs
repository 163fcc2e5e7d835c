//! Grouping raw signals into weighted clusters.

use std::collections::HashMap;

use agora_geo::CellId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::promote::Level;
use crate::signal::{Category, Signal, SignalId, SignalStatus};
use crate::summary::{LexicalSummarizer, Summarizer, Summary};

/// Minimum same-cell/same-category raw signals needed to form a cluster.
pub const CLUSTER_THRESHOLD: usize = 3;

/// A cluster is mature once it holds this multiple of the formation
/// threshold.
pub const MATURITY_FACTOR: usize = 2;

/// A unique cluster identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u64);

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cluster-{}", self.0)
    }
}

/// Allocator for cluster ids, shared between the clusterer and the
/// promotion engine so ids stay unique across levels.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClusterIdGen {
    next: u64,
}

impl ClusterIdGen {
    /// Start allocating from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> ClusterId {
        let id = ClusterId(self.next);
        self.next += 1;
        id
    }
}

/// Maturity of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    /// Formed at the minimum threshold.
    Forming,
    /// Holds at least `MATURITY_FACTOR x CLUSTER_THRESHOLD` signals.
    Mature,
}

/// A weighted group of signals sharing one cell and category.
///
/// Members are a formation-time snapshot: later attestations on the
/// originals never change the cluster weight. Promotion does update each
/// member's status in place; holders of the original signal records are
/// expected to mirror that transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCluster {
    pub id: ClusterId,
    pub cell: CellId,
    pub category: Category,
    /// Snapshot of member signals (level 1 only; empty above L1).
    pub members: Vec<Signal>,
    /// Σ (attestations + 1) over all signals under this cluster.
    pub weight: u64,
    /// Total signals under this cluster, across all descendants.
    pub signal_count: usize,
    pub status: ClusterStatus,
    pub level: Level,
    pub child_cluster_ids: Vec<ClusterId>,
    pub parent_cluster_id: Option<ClusterId>,
    pub summary: Summary,
}

impl SignalCluster {
    /// Whether this cluster is still awaiting promotion to the next level.
    pub fn is_unpromoted(&self) -> bool {
        self.parent_cluster_id.is_none()
    }
}

/// Outcome of one clustering pass.
#[derive(Debug, Default)]
pub struct ClusterPass {
    /// Newly formed clusters.
    pub clusters: Vec<SignalCluster>,
    /// Raw signals that lacked enough neighbors; retried next pass.
    pub deferred: Vec<SignalId>,
}

/// Groups raw signals into clusters by shared cell and category.
#[derive(Debug, Default)]
pub struct SignalClusterer {
    lexical: LexicalSummarizer,
}

impl SignalClusterer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one clustering pass over the given signals.
    ///
    /// Raw signals sharing a (cell, category) key form a cluster once the
    /// group reaches [`CLUSTER_THRESHOLD`]; members are marked consumed.
    /// Undersized groups are deferred, not failed. An external summarizer
    /// may be supplied; the lexical fallback covers its absence.
    pub fn pass(
        &self,
        signals: &mut [Signal],
        ids: &mut ClusterIdGen,
        summarizer: Option<&dyn Summarizer>,
    ) -> ClusterPass {
        // Group indices by key in first-seen order for deterministic output.
        let mut key_order: Vec<(CellId, Category)> = Vec::new();
        let mut groups: HashMap<(CellId, Category), Vec<usize>> = HashMap::new();
        for (idx, signal) in signals.iter().enumerate() {
            if !signal.is_raw() {
                continue;
            }
            let key = (signal.cell, signal.category);
            let entry = groups.entry(key).or_insert_with(|| {
                key_order.push(key);
                Vec::new()
            });
            entry.push(idx);
        }

        let mut pass = ClusterPass::default();
        for key in key_order {
            let indices = &groups[&key];
            if indices.len() < CLUSTER_THRESHOLD {
                pass.deferred
                    .extend(indices.iter().map(|&i| signals[i].id));
                continue;
            }

            let mut members = Vec::with_capacity(indices.len());
            for &i in indices {
                signals[i].status = SignalStatus::Clustered;
                members.push(signals[i].clone());
            }

            let weight: u64 = members.iter().map(Signal::weight).sum();
            let status = if members.len() >= MATURITY_FACTOR * CLUSTER_THRESHOLD {
                ClusterStatus::Mature
            } else {
                ClusterStatus::Forming
            };
            let descriptions: Vec<String> =
                members.iter().map(|s| s.description.clone()).collect();
            let summary = summarizer
                .and_then(|s| s.summarize(&descriptions))
                .or_else(|| self.lexical.summarize(&descriptions))
                .unwrap_or_else(Summary::empty);

            let id = ids.next_id();
            debug!(
                cluster = %id,
                cell = %key.0,
                members = members.len(),
                weight,
                ?status,
                "cluster formed"
            );
            pass.clusters.push(SignalCluster {
                id,
                cell: key.0,
                category: key.1,
                signal_count: members.len(),
                members,
                weight,
                status,
                level: Level::L1,
                child_cluster_ids: Vec::new(),
                parent_cluster_id: None,
                summary,
            });
        }
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_geo::Resolution;

    fn cell(lat: f64, lng: f64) -> CellId {
        CellId::from_lat_lng(lat, lng, Resolution::new(9).unwrap())
    }

    fn raw(id: u64, cell: CellId, category: Category) -> Signal {
        Signal::new(SignalId(id), cell, category, format!("report {id}"), 1000 + id)
    }

    #[test]
    fn three_signals_form_a_forming_cluster() {
        let c = cell(52.52, 13.405);
        let mut signals: Vec<_> = (0..3).map(|i| raw(i, c, Category::Safety)).collect();
        let mut ids = ClusterIdGen::new();

        let pass = SignalClusterer::new().pass(&mut signals, &mut ids, None);

        assert_eq!(pass.clusters.len(), 1);
        let cluster = &pass.clusters[0];
        assert_eq!(cluster.status, ClusterStatus::Forming);
        assert_eq!(cluster.signal_count, 3);
        assert_eq!(cluster.weight, 3); // no attestations: each weighs 1
        assert!(signals.iter().all(|s| s.status == SignalStatus::Clustered));
        assert!(pass.deferred.is_empty());
    }

    #[test]
    fn six_signals_form_a_mature_cluster() {
        let c = cell(52.52, 13.405);
        let mut signals: Vec<_> = (0..6).map(|i| raw(i, c, Category::Safety)).collect();
        let mut ids = ClusterIdGen::new();

        let pass = SignalClusterer::new().pass(&mut signals, &mut ids, None);

        assert_eq!(pass.clusters.len(), 1);
        assert_eq!(pass.clusters[0].status, ClusterStatus::Mature);
    }

    #[test]
    fn undersized_groups_are_deferred_not_failed() {
        let c = cell(52.52, 13.405);
        let mut signals = vec![
            raw(0, c, Category::Safety),
            raw(1, c, Category::Safety),
            // Different category: its own group of one.
            raw(2, c, Category::Health),
        ];
        let mut ids = ClusterIdGen::new();

        let pass = SignalClusterer::new().pass(&mut signals, &mut ids, None);

        assert!(pass.clusters.is_empty());
        assert_eq!(pass.deferred.len(), 3);
        assert!(signals.iter().all(Signal::is_raw));
    }

    #[test]
    fn deferred_signals_cluster_on_a_later_pass() {
        let c = cell(52.52, 13.405);
        let mut signals = vec![raw(0, c, Category::Safety), raw(1, c, Category::Safety)];
        let mut ids = ClusterIdGen::new();
        let clusterer = SignalClusterer::new();

        let first = clusterer.pass(&mut signals, &mut ids, None);
        assert!(first.clusters.is_empty());

        signals.push(raw(2, c, Category::Safety));
        let second = clusterer.pass(&mut signals, &mut ids, None);
        assert_eq!(second.clusters.len(), 1);
    }

    #[test]
    fn attestations_raise_cluster_weight() {
        let c = cell(52.52, 13.405);
        let mut signals: Vec<_> = (0..3).map(|i| raw(i, c, Category::Safety)).collect();
        signals[0].attest();
        signals[0].attest();
        let mut ids = ClusterIdGen::new();

        let pass = SignalClusterer::new().pass(&mut signals, &mut ids, None);

        // 3 + (2 attested) = 5
        assert_eq!(pass.clusters[0].weight, 5);
    }

    #[test]
    fn consumed_signals_are_not_reclustered() {
        let c = cell(52.52, 13.405);
        let mut signals: Vec<_> = (0..3).map(|i| raw(i, c, Category::Safety)).collect();
        let mut ids = ClusterIdGen::new();
        let clusterer = SignalClusterer::new();

        let first = clusterer.pass(&mut signals, &mut ids, None);
        assert_eq!(first.clusters.len(), 1);

        let second = clusterer.pass(&mut signals, &mut ids, None);
        assert!(second.clusters.is_empty());
        assert!(second.deferred.is_empty());
    }

    #[test]
    fn separate_cells_cluster_separately() {
        let near = cell(52.52, 13.405);
        let far = cell(48.8566, 2.3522);
        let mut signals: Vec<_> = (0..3)
            .map(|i| raw(i, near, Category::Safety))
            .chain((3..6).map(|i| raw(i, far, Category::Safety)))
            .collect();
        let mut ids = ClusterIdGen::new();

        let pass = SignalClusterer::new().pass(&mut signals, &mut ids, None);
        assert_eq!(pass.clusters.len(), 2);
        assert_ne!(pass.clusters[0].cell, pass.clusters[1].cell);
    }

    struct FixedSummarizer;
    impl Summarizer for FixedSummarizer {
        fn summarize(&self, _descriptions: &[String]) -> Option<Summary> {
            Some(Summary::new("broken streetlights", 0.92))
        }
    }

    #[test]
    fn external_summary_wins_over_lexical_fallback() {
        let c = cell(52.52, 13.405);
        let mut signals: Vec<_> = (0..3).map(|i| raw(i, c, Category::Safety)).collect();
        let mut ids = ClusterIdGen::new();

        let pass =
            SignalClusterer::new().pass(&mut signals, &mut ids, Some(&FixedSummarizer));
        assert_eq!(pass.clusters[0].summary.text, "broken streetlights");
        assert_eq!(pass.clusters[0].summary.similarity, 0.92);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Every input signal ends up clustered or deferred, never both,
            // never dropped.
            #[test]
            fn pass_accounts_for_every_signal(
                spread in proptest::collection::vec((0u8..4, 0u8..3), 1..40),
            ) {
                let cells = [
                    cell(52.52, 13.405),
                    cell(48.8566, 2.3522),
                    cell(40.7128, -74.006),
                    cell(35.6762, 139.6503),
                ];
                let categories =
                    [Category::Safety, Category::Infrastructure, Category::Health];
                let mut signals: Vec<_> = spread
                    .iter()
                    .enumerate()
                    .map(|(i, &(c, cat))| {
                        raw(i as u64, cells[c as usize], categories[cat as usize])
                    })
                    .collect();
                let mut ids = ClusterIdGen::new();

                let pass = SignalClusterer::new().pass(&mut signals, &mut ids, None);

                let clustered: usize =
                    pass.clusters.iter().map(|c| c.signal_count).sum();
                prop_assert_eq!(clustered + pass.deferred.len(), signals.len());
                for cluster in &pass.clusters {
                    prop_assert!(cluster.signal_count >= CLUSTER_THRESHOLD);
                }
            }
        }
    }
}
