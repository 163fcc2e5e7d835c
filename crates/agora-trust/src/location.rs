//! Location proof evaluation.
//!
//! A proof is judged on anonymization layers, timezone consistency,
//! corroborating radio observations, and movement plausibility against the
//! previous proof. Failure is a verdict, not an error.

use serde::{Deserialize, Serialize};

/// Retained proofs per account.
pub const MAX_PROOF_HISTORY: usize = 100;

/// Minimum consistency score for acceptance.
pub const CONSISTENCY_FLOOR: i32 = 50;

/// Minimum account trust score for acceptance.
pub const TRUST_FLOOR: u32 = 40;

/// Fastest physically realistic travel between consecutive proofs
/// (commercial-airliner cruise).
pub const MAX_VELOCITY_KMH: f64 = 900.0;

/// Consistency baseline for a bare satellite fix.
const BASE_CONSISTENCY: i32 = 70;

const VPN_PENALTY: i32 = 40;
const TOR_PENALTY: i32 = 50;
const PROXY_PENALTY: i32 = 30;
const TIMEZONE_PENALTY: i32 = 20;

const WIFI_REWARD: i32 = 10;
const CELL_REWARD: i32 = 15;
const BLUETOOTH_REWARD: i32 = 12;

/// Mean earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geolocation proof submitted with a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationProof {
    pub lat: f64,
    pub lng: f64,
    /// Unix seconds.
    pub timestamp: u64,
    pub via_vpn: bool,
    pub via_tor: bool,
    pub via_proxy: bool,
    /// Device timezone agrees with the claimed longitude band.
    pub timezone_matches: bool,
    /// Nearby Wi-Fi networks consistent with the claimed position.
    pub wifi_observations: u32,
    /// Cell towers consistent with the claimed position.
    pub cell_observations: u32,
    /// Bluetooth beacons consistent with the claimed position.
    pub bluetooth_observations: u32,
}

impl LocationProof {
    /// A proof with no anonymization layers and no corroboration.
    pub fn clean(lat: f64, lng: f64, timestamp: u64) -> Self {
        Self {
            lat,
            lng,
            timestamp,
            via_vpn: false,
            via_tor: false,
            via_proxy: false,
            timezone_matches: true,
            wifi_observations: 0,
            cell_observations: 0,
            bluetooth_observations: 0,
        }
    }

    /// Consistency score in 0..=100.
    pub fn consistency(&self) -> i32 {
        let mut score = BASE_CONSISTENCY;
        if self.via_vpn {
            score -= VPN_PENALTY;
        }
        if self.via_tor {
            score -= TOR_PENALTY;
        }
        if self.via_proxy {
            score -= PROXY_PENALTY;
        }
        if !self.timezone_matches {
            score -= TIMEZONE_PENALTY;
        }
        score += self.wifi_observations as i32 * WIFI_REWARD;
        score += self.cell_observations as i32 * CELL_REWARD;
        score += self.bluetooth_observations as i32 * BLUETOOTH_REWARD;
        score.clamp(0, 100)
    }
}

/// Outcome of evaluating a location proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationVerdict {
    pub accepted: bool,
    /// Present when rejected.
    pub reason: Option<String>,
    /// Confidence in the claimed position, 0..=1.
    pub confidence: f64,
}

impl LocationVerdict {
    fn accept(confidence: f64) -> Self {
        Self {
            accepted: true,
            reason: None,
            confidence,
        }
    }

    fn reject(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            confidence,
        }
    }
}

/// Evaluate a proof against the account's previous proof and trust score.
pub(crate) fn evaluate(
    proof: &LocationProof,
    previous: Option<&LocationProof>,
    trust: u32,
) -> LocationVerdict {
    let consistency = proof.consistency();
    let confidence = f64::from(consistency) / 100.0;

    if proof.via_tor {
        return LocationVerdict::reject("tor exit node detected", confidence);
    }
    if proof.via_vpn {
        return LocationVerdict::reject("vpn detected", confidence);
    }
    if !proof.timezone_matches {
        return LocationVerdict::reject("timezone mismatch", confidence);
    }
    if consistency < CONSISTENCY_FLOOR {
        return LocationVerdict::reject(
            format!("consistency score {consistency} below {CONSISTENCY_FLOOR}"),
            confidence,
        );
    }
    if trust < TRUST_FLOOR {
        return LocationVerdict::reject(
            format!("trust score {trust} below {TRUST_FLOOR}"),
            confidence,
        );
    }
    if let Some(prev) = previous {
        if let Some(velocity) = implied_velocity_kmh(prev, proof) {
            if velocity > MAX_VELOCITY_KMH {
                return LocationVerdict::reject(
                    format!("implied travel velocity {velocity:.0} km/h is not physically realistic"),
                    confidence,
                );
            }
        }
    }

    LocationVerdict::accept(confidence)
}

/// Velocity implied by moving between two proofs, or `None` when the
/// timestamps do not advance (an instantaneous jump is reported as
/// infinite velocity instead).
fn implied_velocity_kmh(prev: &LocationProof, next: &LocationProof) -> Option<f64> {
    let distance = haversine_km(prev.lat, prev.lng, next.lat, next.lng);
    let dt_secs = next.timestamp.saturating_sub(prev.timestamp);
    if dt_secs == 0 {
        // Two proofs in the same second from different places is a jump.
        return (distance > 0.5).then_some(f64::INFINITY);
    }
    Some(distance / (dt_secs as f64 / 3600.0))
}

/// Great-circle distance between two coordinates.
fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trusted() -> u32 {
        TRUST_FLOOR
    }

    #[test]
    fn clean_proof_passes() {
        let proof = LocationProof::clean(52.52, 13.405, 1000);
        let verdict = evaluate(&proof, None, trusted());
        assert!(verdict.accepted);
        assert_eq!(verdict.reason, None);
        assert!(verdict.confidence >= 0.5);
    }

    #[test]
    fn tor_is_rejected() {
        let proof = LocationProof {
            via_tor: true,
            ..LocationProof::clean(52.52, 13.405, 1000)
        };
        let verdict = evaluate(&proof, None, trusted());
        assert!(!verdict.accepted);
        assert!(verdict.reason.unwrap().contains("tor"));
    }

    #[test]
    fn vpn_is_rejected() {
        let proof = LocationProof {
            via_vpn: true,
            ..LocationProof::clean(52.52, 13.405, 1000)
        };
        assert!(!evaluate(&proof, None, trusted()).accepted);
    }

    #[test]
    fn proxy_sinks_consistency_below_floor() {
        let proof = LocationProof {
            via_proxy: true,
            ..LocationProof::clean(52.52, 13.405, 1000)
        };
        assert_eq!(proof.consistency(), 40);
        let verdict = evaluate(&proof, None, trusted());
        assert!(!verdict.accepted);
        assert!(verdict.reason.unwrap().contains("consistency"));
    }

    #[test]
    fn corroboration_rescues_a_proxied_proof_consistency() {
        // Proxy −30 but one cell tower and two wifi networks +35.
        let proof = LocationProof {
            via_proxy: true,
            wifi_observations: 2,
            cell_observations: 1,
            ..LocationProof::clean(52.52, 13.405, 1000)
        };
        assert_eq!(proof.consistency(), 75);
        assert!(evaluate(&proof, None, trusted()).accepted);
    }

    #[test]
    fn low_trust_is_rejected() {
        let proof = LocationProof::clean(52.52, 13.405, 1000);
        let verdict = evaluate(&proof, None, TRUST_FLOOR - 1);
        assert!(!verdict.accepted);
        assert!(verdict.reason.unwrap().contains("trust"));
    }

    #[test]
    fn timezone_mismatch_is_rejected() {
        let proof = LocationProof {
            timezone_matches: false,
            ..LocationProof::clean(52.52, 13.405, 1000)
        };
        assert!(!evaluate(&proof, None, trusted()).accepted);
    }

    #[test]
    fn teleportation_is_rejected() {
        // Berlin → Sydney in one hour: far beyond 900 km/h.
        let prev = LocationProof::clean(52.52, 13.405, 0);
        let next = LocationProof::clean(-33.87, 151.21, 3600);
        let verdict = evaluate(&next, Some(&prev), trusted());
        assert!(!verdict.accepted);
        assert!(verdict.reason.unwrap().contains("velocity"));
    }

    #[test]
    fn plausible_flight_is_accepted() {
        // Berlin → Paris (~880 km) in two hours.
        let prev = LocationProof::clean(52.52, 13.405, 0);
        let next = LocationProof::clean(48.8566, 2.3522, 2 * 3600);
        assert!(evaluate(&next, Some(&prev), trusted()).accepted);
    }

    #[test]
    fn same_second_jump_is_rejected() {
        let prev = LocationProof::clean(52.52, 13.405, 1000);
        let next = LocationProof::clean(48.8566, 2.3522, 1000);
        assert!(!evaluate(&next, Some(&prev), trusted()).accepted);
    }

    #[test]
    fn stationary_resubmission_is_fine() {
        let prev = LocationProof::clean(52.52, 13.405, 1000);
        let next = LocationProof::clean(52.52, 13.405, 1000);
        assert!(evaluate(&next, Some(&prev), trusted()).accepted);
    }

    #[test]
    fn haversine_sanity() {
        // Berlin → Paris is roughly 880 km.
        let d = haversine_km(52.52, 13.405, 48.8566, 2.3522);
        assert!((d - 880.0).abs() < 30.0, "got {d}");
    }
}
