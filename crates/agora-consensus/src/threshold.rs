//! Byzantine fault tolerance threshold.

/// Minimum agreeing validators out of `n`: ⌈2n/3⌉.
///
/// Tolerates up to ⌊n/3⌋ faulty or malicious participants.
///
/// # Examples
///
/// ```
/// use agora_consensus::bft_threshold;
///
/// assert_eq!(bft_threshold(1), 1);
/// assert_eq!(bft_threshold(3), 2);
/// assert_eq!(bft_threshold(4), 3);
/// assert_eq!(bft_threshold(100), 67);
/// ```
pub const fn bft_threshold(n: usize) -> usize {
    // ceil(2n/3) = (2n + 2) / 3
    (2 * n).div_ceil(3)
}
