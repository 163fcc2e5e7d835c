//! Agora Capture Detection
//!
//! After-the-fact auditing of governance health: statistically improbable
//! voting agreement between validator pairs (cartels) and concentration of
//! staked influence (whales), measured with the Gini coefficient.
//!
//! Detection only ever produces alerts. It never vetoes a decision; the
//! follow-up is a human/governance concern.

mod cartel;
mod gini;

pub use cartel::{
    CartelReport, SuspiciousPair, VoteContext, VotingHistory, MIN_JOINT_DECISIONS,
};
pub use gini::{
    detect_capture, gini, gini_tax_rate, redistribution, CaptureAlert, WHALE_GINI_THRESHOLD,
};
