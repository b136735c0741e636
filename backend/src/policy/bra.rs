//! Biased-randomized selection
//!
//! Draws a full permutation of an ordered candidate list, skewed toward
//! the front: at every step `U ~ Uniform(0, 1)` is drawn and the candidate
//! at `⌊ln U / ln(1 − β)⌋ mod remaining` is removed and yielded. With β
//! near 1 the permutation stays close to the input order; with β near 0 it
//! approaches a uniform shuffle.

use crate::rng::RngManager;

/// Smallest bias accepted
pub const MIN_BIAS: f64 = 0.001;
/// Largest bias accepted
pub const MAX_BIAS: f64 = 0.999;

/// Clamp a sampled bias into `[MIN_BIAS, MAX_BIAS]`
///
/// NaN maps to `MIN_BIAS`.
pub fn clamp_bias(beta: f64) -> f64 {
    if beta.is_nan() {
        MIN_BIAS
    } else {
        beta.clamp(MIN_BIAS, MAX_BIAS)
    }
}

/// Lazy biased-randomized permutation
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::policy::BiasedPermutation;
/// use asrs_simulator_core_rs::rng::RngManager;
///
/// let mut rng = RngManager::new(9);
/// let mut order: Vec<u32> = BiasedPermutation::new(vec![1, 2, 3, 4], 0.7, &mut rng).collect();
/// order.sort();
/// assert_eq!(order, vec![1, 2, 3, 4]);
/// ```
pub struct BiasedPermutation<'a, T> {
    remaining: Vec<T>,
    log_keep: f64,
    rng: &'a mut RngManager,
}

impl<'a, T> BiasedPermutation<'a, T> {
    /// `beta` is clamped into `[MIN_BIAS, MAX_BIAS]`
    pub fn new(candidates: Vec<T>, beta: f64, rng: &'a mut RngManager) -> Self {
        Self {
            remaining: candidates,
            log_keep: (1.0 - clamp_bias(beta)).ln(),
            rng,
        }
    }
}

impl<T> Iterator for BiasedPermutation<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining.is_empty() {
            return None;
        }
        let u = self.rng.next_open_f64();
        let skip = (u.ln() / self.log_keep).floor() as usize;
        Some(self.remaining.remove(skip % self.remaining.len()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.len(), Some(self.remaining.len()))
    }
}

impl<T> ExactSizeIterator for BiasedPermutation<'_, T> {}
