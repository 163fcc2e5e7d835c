//! Wealth-concentration metrics.

use agora_validators::ValidatorId;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Gini above which stake concentration counts as capture.
pub const WHALE_GINI_THRESHOLD: f64 = 0.6;

/// Gini at which the redistribution tax starts.
const TAX_ONSET_GINI: f64 = 0.3;

/// Tax rate ceiling.
const MAX_TAX_RATE: f64 = 0.5;

/// Gini coefficient of a distribution, in 0..=1.
///
/// G = Σ_i (2i − n − 1)·x_i / (n·Σx_i) over the values sorted ascending,
/// with i counted from 1. Zero for empty, single-element, or all-zero
/// input.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - n as f64 - 1.0) * x)
        .sum();
    (weighted / (n as f64 * total)).clamp(0.0, 1.0)
}

/// Redistribution tax rate for a given Gini: clamp((G − 0.3)×2, 0, 0.5).
pub fn gini_tax_rate(gini: f64) -> f64 {
    ((gini - TAX_ONSET_GINI) * 2.0).clamp(0.0, MAX_TAX_RATE)
}

/// A whale-capture alert. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureAlert {
    pub gini: f64,
    /// Tax rate that would apply at this concentration.
    pub tax_rate: f64,
    pub holders: usize,
}

/// Check a stake distribution for whale capture.
pub fn detect_capture(stakes: &[(ValidatorId, f64)]) -> Option<CaptureAlert> {
    let values: Vec<f64> = stakes.iter().map(|(_, s)| *s).collect();
    let g = gini(&values);
    if g <= WHALE_GINI_THRESHOLD {
        return None;
    }
    let alert = CaptureAlert {
        gini: g,
        tax_rate: gini_tax_rate(g),
        holders: stakes.len(),
    };
    warn!(gini = g, tax_rate = alert.tax_rate, "whale_capture alert");
    Some(alert)
}

/// Per-holder redistribution amounts under the Gini tax.
///
/// Each holder's taxable excess is their share above the equal share 1/n;
/// the levy is excess × total stake × tax rate. Holders at or below the
/// equal share owe nothing.
pub fn redistribution(stakes: &[(ValidatorId, f64)]) -> Vec<(ValidatorId, f64)> {
    let n = stakes.len();
    if n == 0 {
        return Vec::new();
    }
    let values: Vec<f64> = stakes.iter().map(|(_, s)| *s).collect();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return stakes.iter().map(|(id, _)| (*id, 0.0)).collect();
    }
    let rate = gini_tax_rate(gini(&values));
    let equal_share = 1.0 / n as f64;

    stakes
        .iter()
        .map(|&(id, stake)| {
            let excess = (stake / total - equal_share).max(0.0);
            (id, excess * total * rate)
        })
        .collect()
}
