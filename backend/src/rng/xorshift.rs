//! xorshift64* random number generator
//!
//! Fast, deterministic PRNG used for every random draw in a trial: arrival
//! gaps, attribute draws, bias sampling, shuffles and biased permutations.
//!
//! # Determinism
//!
//! Same seed → same sequence of random numbers. Trials of a multistart get
//! their own generator via [`RngManager::fork`], so a trial never observes
//! draws made by another one.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let index = rng.range(0, 10); // [0, 10)
/// assert!((0..10).contains(&index));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// # Arguments
    /// * `seed` - Initial seed value; zero is mapped to 1 since xorshift
    ///   cannot leave the zero state
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let rng = RngManager::new(0);
    /// assert_eq!(rng.get_state(), 1);
    /// ```
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    ///
    /// Advances the internal state.
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut a = RngManager::new(42);
    /// let mut b = RngManager::new(42);
    /// assert_eq!(a.next(), b.next());
    /// ```
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random value in range [min, max)
    ///
    /// # Arguments
    /// * `min` - Minimum value (inclusive)
    /// * `max` - Maximum value (exclusive)
    ///
    /// # Panics
    /// Panics if min >= max
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// let level = rng.range(0, 10); // one of ten rack levels
    /// assert!((0..10).contains(&level));
    /// ```
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Uniform index in `[0, len)`
    ///
    /// # Panics
    /// Panics if `len == 0`
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(3);
    /// let racks = ["A", "B", "C"];
    /// let rack = racks[rng.index(racks.len())];
    /// assert!(racks.contains(&rack));
    /// ```
    pub fn index(&mut self, len: usize) -> usize {
        self.range(0, len as i64) as usize
    }

    /// Get current RNG state (for checkpointing/replay)
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// rng.next();
    /// let mut replay = RngManager::new(rng.get_state());
    /// let mut original = rng.clone();
    /// assert_eq!(replay.next(), original.next());
    /// ```
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Generate random f64 in range [0.0, 1.0)
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// let probability = rng.next_f64();
    /// assert!(probability >= 0.0 && probability < 1.0);
    /// ```
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Generate random f64 in the open interval (0.0, 1.0)
    ///
    /// Used wherever the draw feeds a logarithm.
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(8);
    /// let u = rng.next_open_f64();
    /// assert!(u.ln().is_finite());
    /// ```
    pub fn next_open_f64(&mut self) -> f64 {
        loop {
            let u = self.next_f64();
            if u > 0.0 {
                return u;
            }
        }
    }

    /// Sample from a normal distribution (Box-Muller transform)
    ///
    /// # Arguments
    /// * `mean` - Centre of the distribution
    /// * `std_dev` - Standard deviation; zero returns `mean` exactly
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// assert_eq!(rng.normal(0.7, 0.0), 0.7);
    /// let bias = rng.normal(0.9, 0.05);
    /// assert!(bias.is_finite());
    /// ```
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_open_f64();
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Sample from an exponential distribution
    ///
    /// # Arguments
    /// * `mean` - Expected value (seconds, for inter-arrival gaps)
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// let gap = rng.exponential(120.0);
    /// assert!(gap > 0.0);
    /// ```
    pub fn exponential(&mut self, mean: f64) -> f64 {
        -self.next_open_f64().ln() * mean
    }

    /// Fisher-Yates shuffle in place
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(7);
    /// let mut locations: Vec<usize> = (0..20).collect();
    /// rng.shuffle(&mut locations);
    ///
    /// locations.sort_unstable();
    /// assert_eq!(locations, (0..20).collect::<Vec<_>>());
    /// ```
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }

    /// Pick an index with probability proportional to `weights`
    ///
    /// # Arguments
    /// * `weights` - Non-negative weights; they need not sum to one
    ///
    /// Returns `None` when the weights do not sum to a positive value.
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(99);
    /// assert_eq!(rng.choose_weighted(&[0.0, 0.25, 0.0]), Some(1));
    /// assert_eq!(rng.choose_weighted(&[0.0, 0.0]), None);
    /// ```
    pub fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if total.is_nan() || total <= 0.0 {
            return None;
        }

        let mut target = self.next_f64() * total;
        for (i, weight) in weights.iter().enumerate() {
            target -= weight;
            if target < 0.0 {
                return Some(i);
            }
        }

        // Rounding can leave a sliver of mass past the last entry.
        weights.iter().rposition(|w| *w > 0.0)
    }

    /// Derive an independent generator for a sub-run (e.g. one trial)
    ///
    /// Consumes one draw from `self`, so successive forks differ.
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::RngManager;
    ///
    /// let mut master = RngManager::new(42);
    /// let mut first = master.fork();
    /// let mut second = master.fork();
    /// assert_ne!(first.next(), second.next());
    /// ```
    pub fn fork(&mut self) -> RngManager {
        RngManager::new(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_converted_to_nonzero() {
        let rng = RngManager::new(0);
        assert_ne!(rng.get_state(), 0, "Zero seed should be converted to 1");
    }

    #[test]
    #[should_panic(expected = "min must be less than max")]
    fn test_range_invalid_bounds() {
        let mut rng = RngManager::new(12345);
        rng.range(100, 50);
    }

    #[test]
    fn test_next_f64_in_range() {
        let mut rng = RngManager::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f64();
            assert!(
                (0.0..1.0).contains(&val),
                "next_f64() produced value {} outside [0.0, 1.0)",
                val
            );
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = RngManager::new(7);
        let mut items: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_choose_weighted_skips_zero_weights() {
        let mut rng = RngManager::new(99);
        for _ in 0..500 {
            let idx = rng.choose_weighted(&[0.0, 1.0, 0.0]).unwrap();
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn test_choose_weighted_rejects_empty_mass() {
        let mut rng = RngManager::new(99);
        assert_eq!(rng.choose_weighted(&[]), None);
        assert_eq!(rng.choose_weighted(&[0.0, 0.0]), None);
    }

    #[test]
    fn test_exponential_mean_is_close() {
        let mut rng = RngManager::new(2024);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| rng.exponential(120.0)).sum::<f64>() / n as f64;
        assert!((mean - 120.0).abs() < 6.0, "sample mean {} too far from 120", mean);
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut a = RngManager::new(5);
        let mut b = RngManager::new(5);
        let mut fa = a.fork();
        let mut fb = b.fork();
        for _ in 0..10 {
            assert_eq!(fa.next(), fb.next());
        }
    }
}
