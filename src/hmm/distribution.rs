//! Generators of random probability distributions used to seed a model.
//!
//! Every generator implements [`RandomDistribution`] and owns its RNG, so a seeded
//! generator makes model initialization reproducible. Implementations:
//! - [`DirichletDistribution`]: a draw from a symmetric Dirichlet
//! - [`StickBreaking`]: shuffled stick-breaking with uniform fractions
//! - [`UniformDistribution`]: the deterministic `1/n` distribution

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Dirichlet, Distribution};

use crate::error::{Error, Result};

/// Source of normalized probability distributions over a finite set of labels.
pub trait RandomDistribution {
    /// Draw `len` non-negative probabilities summing to 1.
    fn draw(&mut self, len: usize) -> Result<Vec<f64>>;

    /// Draw a distribution and pair each probability with its label.
    fn draw_over<L: Clone>(&mut self, labels: &[L]) -> Result<Vec<(L, f64)>>
    where
        Self: Sized,
    {
        let probs = self.draw(labels.len())?;
        Ok(labels.iter().cloned().zip(probs).collect())
    }
}

/// Symmetric Dirichlet sampler. With concentration 1 every point of the simplex is
/// equally likely.
#[derive(Debug, Clone)]
pub struct DirichletDistribution {
    concentration: f64,
    rng: ChaCha20Rng,
}

impl DirichletDistribution {
    /// Concentration 1, seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            concentration: 1.0,
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Concentration 1 with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            concentration: 1.0,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Customize the concentration parameter (must be positive).
    pub fn with_concentration(mut self, concentration: f64) -> Self {
        self.concentration = concentration;
        self
    }
}

impl Default for DirichletDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomDistribution for DirichletDistribution {
    fn draw(&mut self, len: usize) -> Result<Vec<f64>> {
        if !(self.concentration > 0.0) {
            return Err(Error::invalid_input(format!(
                "Dirichlet concentration must be positive, got {}",
                self.concentration
            )));
        }
        match len {
            0 => Err(Error::invalid_input("cannot draw a distribution over no labels")),
            // rand_distr only supports two or more components
            1 => Ok(vec![1.0]),
            _ => {
                let dirichlet = Dirichlet::new_with_size(self.concentration, len)
                    .map_err(|e| Error::invalid_input(format!("Dirichlet: {:?}", e)))?;
                Ok(dirichlet.sample(&mut self.rng))
            }
        }
    }
}

/// Stick-breaking generator: the labels are visited in a random order, each but the
/// last takes a uniform fraction of the remaining mass, the last takes the rest.
#[derive(Debug, Clone)]
pub struct StickBreaking {
    rng: ChaCha20Rng,
}

impl StickBreaking {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for StickBreaking {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomDistribution for StickBreaking {
    fn draw(&mut self, len: usize) -> Result<Vec<f64>> {
        if len == 0 {
            return Err(Error::invalid_input("cannot draw a distribution over no labels"));
        }
        // Without the shuffle the first label would get half the mass on average.
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);

        let mut probs = vec![0.0; len];
        let mut remaining = 1.0;
        for &label in &order[..len - 1] {
            let share = self.rng.gen::<f64>() * remaining;
            probs[label] = share;
            remaining -= share;
        }
        probs[order[len - 1]] = remaining;
        Ok(probs)
    }
}

/// Deterministic `1/n` for every label.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformDistribution;

impl RandomDistribution for UniformDistribution {
    fn draw(&mut self, len: usize) -> Result<Vec<f64>> {
        if len == 0 {
            return Err(Error::invalid_input("cannot draw a distribution over no labels"));
        }
        Ok(vec![1.0 / len as f64; len])
    }
}

/// Check that `probs` is a probability distribution within `tolerance`.
pub fn ensure_normalized(what: &str, probs: &[f64], tolerance: f64) -> Result<()> {
    let sum: f64 = probs.iter().sum();
    let in_range = probs.iter().all(|&p| (0.0..=1.0 + tolerance).contains(&p));
    if !in_range || (sum - 1.0).abs() > tolerance {
        return Err(Error::degenerate(what, sum));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_distribution(probs: &[f64]) {
        assert!(probs.iter().all(|&p| p >= 0.0));
        assert_abs_diff_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dirichlet_is_normalized() {
        let mut gen = DirichletDistribution::with_seed(7);
        for len in 1..30 {
            let probs = gen.draw(len).unwrap();
            assert_eq!(probs.len(), len);
            assert_distribution(&probs);
        }
    }

    #[test]
    fn test_dirichlet_seed_is_reproducible() {
        let a = DirichletDistribution::with_seed(42).draw(5).unwrap();
        let b = DirichletDistribution::with_seed(42).draw(5).unwrap();
        let c = DirichletDistribution::with_seed(43).draw(5).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_dirichlet_rejects_bad_concentration() {
        let mut gen = DirichletDistribution::with_seed(1).with_concentration(0.0);
        assert!(matches!(gen.draw(3), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_stick_breaking_is_normalized() {
        let mut gen = StickBreaking::with_seed(3);
        for len in 1..30 {
            let probs = gen.draw(len).unwrap();
            assert_eq!(probs.len(), len);
            assert_distribution(&probs);
        }
    }

    #[test]
    fn test_uniform() {
        let probs = UniformDistribution.draw(4).unwrap();
        assert_eq!(probs, vec![0.25; 4]);
    }

    #[test]
    fn test_empty_label_set_is_rejected() {
        assert!(DirichletDistribution::with_seed(0).draw(0).is_err());
        assert!(StickBreaking::with_seed(0).draw(0).is_err());
        assert!(UniformDistribution.draw(0).is_err());
    }

    #[test]
    fn test_draw_over_pairs_labels() {
        let mut gen = DirichletDistribution::with_seed(11);
        let pairs = gen.draw_over(&['a', 'b', '#']).unwrap();
        let labels: Vec<char> = pairs.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!['a', 'b', '#']);
        let probs: Vec<f64> = pairs.iter().map(|(_, p)| *p).collect();
        assert_distribution(&probs);
    }

    #[test]
    fn test_ensure_normalized() {
        assert!(ensure_normalized("row", &[0.25, 0.75], 1e-6).is_ok());
        assert!(matches!(
            ensure_normalized("row", &[0.25, 0.7], 1e-6),
            Err(Error::DegenerateDistribution { .. })
        ));
        assert!(ensure_normalized("row", &[-0.5, 1.5], 1e-6).is_err());
    }
}
