//! Hierarchical cluster promotion.
//!
//! Clusters climb four severity levels. A set of same-category clusters in
//! one region promotes into a single parent at the next level once three
//! thresholds hold simultaneously: enough child clusters, enough cumulative
//! weight, enough cumulative signals. Promotion is idempotent; a promoted
//! cluster never promotes again.

use std::collections::HashMap;

use agora_geo::CellId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cluster::{ClusterId, ClusterIdGen, ClusterStatus, SignalCluster};
use crate::signal::{Category, SignalStatus};
use crate::summary::Summary;
use crate::{Error, Result};

/// Severity level of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    L1,
    L2,
    L3,
    L4,
}

impl Level {
    /// The next level up, or `None` at the top.
    pub const fn next(&self) -> Option<Level> {
        match self {
            Level::L1 => Some(Level::L2),
            Level::L2 => Some(Level::L3),
            Level::L3 => Some(Level::L4),
            Level::L4 => None,
        }
    }

    /// Numeric rank 1..=4.
    pub const fn rank(&self) -> u8 {
        match self {
            Level::L1 => 1,
            Level::L2 => 2,
            Level::L3 => 3,
            Level::L4 => 4,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.rank())
    }
}

/// Threshold row for one promotion transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionThresholds {
    pub min_children: usize,
    pub min_weight: u64,
    pub min_signals: usize,
}

/// Thresholds for L1→L2, L2→L3, L3→L4.
///
/// Weight and signal requirements are strictly increasing by level.
pub const PROMOTION_THRESHOLDS: [PromotionThresholds; 3] = [
    PromotionThresholds {
        min_children: 3,
        min_weight: 50,
        min_signals: 9,
    },
    PromotionThresholds {
        min_children: 5,
        min_weight: 200,
        min_signals: 45,
    },
    PromotionThresholds {
        min_children: 3,
        min_weight: 1000,
        min_signals: 135,
    },
];

/// Record of one promotion, fed into the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub from_level: Level,
    pub to_level: Level,
    /// The newly created parent cluster.
    pub cluster_id: ClusterId,
    pub child_cluster_ids: Vec<ClusterId>,
    pub weight: u64,
    pub reason: String,
}

/// A unique problem identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemId(pub u64);

impl std::fmt::Display for ProblemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "problem-{}", self.0)
    }
}

/// Problem priority, derived from cluster weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Band an L4 cluster weight into a priority.
    pub const fn from_weight(weight: u64) -> Self {
        match weight {
            w if w >= 5000 => Priority::Critical,
            w if w >= 2500 => Priority::High,
            w if w >= 1500 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// A validated problem surfaced from an L4 cluster.
///
/// Immutable once created; downstream proposals reference it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub cell: CellId,
    pub category: Category,
    pub description: String,
    pub priority: Priority,
    pub cluster_id: ClusterId,
}

/// Tracks all clusters and drives them up the severity hierarchy.
#[derive(Debug, Default)]
pub struct PromotionEngine {
    clusters: HashMap<ClusterId, SignalCluster>,
    problems: Vec<Problem>,
    next_problem: u64,
}

impl PromotionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly formed cluster.
    pub fn ingest(&mut self, cluster: SignalCluster) {
        self.clusters.insert(cluster.id, cluster);
    }

    /// Look up a tracked cluster.
    pub fn cluster(&self, id: ClusterId) -> Result<&SignalCluster> {
        self.clusters.get(&id).ok_or(Error::UnknownCluster(id))
    }

    /// All tracked clusters.
    pub fn clusters(&self) -> impl Iterator<Item = &SignalCluster> {
        self.clusters.values()
    }

    /// Problems surfaced so far.
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Evaluate every transition bottom-up, cascading within one call.
    ///
    /// Re-running with no new clusters is a no-op: promoted children carry
    /// their parent id and are never grouped again.
    pub fn evaluate(&mut self, ids: &mut ClusterIdGen) -> Vec<PromotionEvent> {
        let mut events = Vec::new();
        for level in [Level::L1, Level::L2, Level::L3] {
            events.extend(self.evaluate_level(level, ids));
        }
        events
    }

    fn evaluate_level(&mut self, level: Level, ids: &mut ClusterIdGen) -> Vec<PromotionEvent> {
        let Some(to_level) = level.next() else {
            return Vec::new();
        };
        let thresholds = PROMOTION_THRESHOLDS[level.rank() as usize - 1];

        // Group unpromoted clusters at this level by category and region,
        // in first-seen order so allocation is deterministic.
        let mut key_order: Vec<(Category, CellId)> = Vec::new();
        let mut groups: HashMap<(Category, CellId), Vec<ClusterId>> = HashMap::new();
        let mut ordered: Vec<&SignalCluster> = self
            .clusters
            .values()
            .filter(|c| c.level == level && c.is_unpromoted())
            .collect();
        ordered.sort_by_key(|c| c.id);
        for cluster in ordered {
            let region = cluster.cell.parent().unwrap_or(cluster.cell);
            let key = (cluster.category, region);
            groups
                .entry(key)
                .or_insert_with(|| {
                    key_order.push(key);
                    Vec::new()
                })
                .push(cluster.id);
        }

        let mut events = Vec::new();
        for key in key_order {
            let child_ids = &groups[&key];
            let weight: u64 = child_ids.iter().map(|id| self.clusters[id].weight).sum();
            let signals: usize = child_ids
                .iter()
                .map(|id| self.clusters[id].signal_count)
                .sum();

            if child_ids.len() < thresholds.min_children
                || weight < thresholds.min_weight
                || signals < thresholds.min_signals
            {
                continue;
            }

            let (category, region) = key;
            let parent_id = ids.next_id();
            let summary = self.best_child_summary(child_ids);
            for child_id in child_ids {
                let child = self
                    .clusters
                    .get_mut(child_id)
                    .expect("grouped cluster exists");
                child.parent_cluster_id = Some(parent_id);
                for member in &mut child.members {
                    member.status = SignalStatus::Promoted;
                }
            }

            let reason = format!(
                "{} child clusters, cumulative weight {weight}, {signals} signals",
                child_ids.len()
            );
            info!(
                parent = %parent_id,
                from = %level,
                to = %to_level,
                children = child_ids.len(),
                weight,
                "cluster promoted"
            );
            let parent = SignalCluster {
                id: parent_id,
                cell: region,
                category,
                members: Vec::new(),
                weight,
                signal_count: signals,
                status: ClusterStatus::Mature,
                level: to_level,
                child_cluster_ids: child_ids.clone(),
                parent_cluster_id: None,
                summary,
            };
            if to_level == Level::L4 {
                self.surface_problem(&parent);
            }
            events.push(PromotionEvent {
                from_level: level,
                to_level,
                cluster_id: parent_id,
                child_cluster_ids: child_ids.clone(),
                weight,
                reason,
            });
            self.clusters.insert(parent_id, parent);
        }
        events
    }

    /// Carry the heaviest child's summary up to the parent.
    fn best_child_summary(&self, child_ids: &[ClusterId]) -> Summary {
        child_ids
            .iter()
            .filter_map(|id| self.clusters.get(id))
            .max_by_key(|c| c.weight)
            .map(|c| c.summary.clone())
            .unwrap_or_else(Summary::empty)
    }

    fn surface_problem(&mut self, cluster: &SignalCluster) {
        let id = ProblemId(self.next_problem);
        self.next_problem += 1;
        let description = if cluster.summary.text.is_empty() {
            format!("{:?} problem in cell {}", cluster.category, cluster.cell)
        } else {
            cluster.summary.text.clone()
        };
        info!(problem = %id, cluster = %cluster.id, weight = cluster.weight, "problem surfaced");
        self.problems.push(Problem {
            id,
            cell: cluster.cell,
            category: cluster.category,
            description,
            priority: Priority::from_weight(cluster.weight),
            cluster_id: cluster.id,
        });
    }
}
