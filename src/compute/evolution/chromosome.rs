//! Chromosome representation and genetic operators.
//!
//! A chromosome is a candidate initial grid: one gene per cell holding a
//! state index, in row-major order.

use rand::prelude::*;

use crate::schema::{ChromosomeSnapshot, ChromosomeStats, StateId};

/// A candidate initial pattern and the statistics of its last evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome {
    /// Row-major genes.
    pub pattern: Vec<StateId>,
    pub stats: ChromosomeStats,
}

impl Chromosome {
    pub fn new(pattern: Vec<StateId>) -> Self {
        let initial_size = pattern.iter().filter(|s| !s.is_free()).count();
        Self {
            pattern,
            stats: ChromosomeStats {
                initial_size,
                ..ChromosomeStats::default()
            },
        }
    }

    #[inline]
    pub fn fitness(&self) -> f64 {
        self.stats.fitness
    }

    /// Non-`FREE` genes.
    pub fn initial_size(&self) -> usize {
        self.pattern.iter().filter(|s| !s.is_free()).count()
    }

    pub fn to_snapshot(&self, epoch: usize, width: usize, height: usize) -> ChromosomeSnapshot {
        ChromosomeSnapshot {
            epoch,
            stats: self.stats,
            width,
            height,
            pattern: self.pattern.clone(),
        }
    }
}

/// Seeded random source for every stochastic step of the search.
pub struct ChromosomeRng {
    rng: StdRng,
}

impl ChromosomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform draw in [0, 1).
    #[inline]
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// `true` with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Uniform index in `0..n`; `n` must be non-zero.
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    /// Two distinct indices in `0..n`, `n >= 2`.
    pub fn distinct_pair(&mut self, n: usize) -> (usize, usize) {
        let a = self.index(n);
        let mut b = self.index(n - 1);
        if b >= a {
            b += 1;
        }
        (a, b)
    }

    /// Random chromosome of `area` genes.
    ///
    /// A fill probability is drawn once per chromosome, then every gene
    /// independently becomes a random live state if a second draw falls at
    /// or below it, so the population spans a range of densities.
    pub fn random_chromosome(&mut self, area: usize, live_states: usize) -> Chromosome {
        let fill = self.unit();
        let pattern = (0..area)
            .map(|_| {
                if live_states > 0 && self.unit() <= fill {
                    StateId(self.rng.gen_range(1..=live_states) as u16)
                } else {
                    StateId::FREE
                }
            })
            .collect();
        Chromosome::new(pattern)
    }

    /// Two-point crossover: swap the genes between two distinct cut points,
    /// both inclusive.
    pub fn crossover(&mut self, a: &mut Chromosome, b: &mut Chromosome) {
        let len = a.pattern.len().min(b.pattern.len());
        if len < 2 {
            return;
        }
        let (x, y) = self.distinct_pair(len);
        let (start, end) = (x.min(y), x.max(y));
        a.pattern[start..=end].swap_with_slice(&mut b.pattern[start..=end]);
    }

    /// Replace each gene with probability `rate` by a uniformly random state
    /// index in `0..states`, `FREE` included.
    pub fn mutate(&mut self, chromosome: &mut Chromosome, rate: f64, states: usize) {
        if rate <= 0.0 || states == 0 {
            return;
        }
        for gene in &mut chromosome.pattern {
            if self.chance(rate) {
                *gene = StateId(self.rng.gen_range(0..states) as u16);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_chromosome() {
        let mut rng = ChromosomeRng::new(42);
        let densities: Vec<usize> = (0..20)
            .map(|_| {
                let c = rng.random_chromosome(400, 3);
                assert_eq!(c.pattern.len(), 400);
                assert!(c.pattern.iter().all(|s| s.0 <= 3));
                assert_eq!(c.stats.initial_size, c.initial_size());
                c.initial_size()
            })
            .collect();

        // densities vary from chromosome to chromosome
        let min = densities.iter().min().copied().unwrap_or(0);
        let max = densities.iter().max().copied().unwrap_or(0);
        assert!(max - min > 100);

        let empty = rng.random_chromosome(50, 0);
        assert_eq!(empty.initial_size(), 0);
    }

    #[test]
    fn test_crossover_swaps_one_segment() {
        let mut rng = ChromosomeRng::new(1);
        for _ in 0..50 {
            let mut a = Chromosome::new(vec![StateId(1); 16]);
            let mut b = Chromosome::new(vec![StateId(2); 16]);
            rng.crossover(&mut a, &mut b);

            let swapped: Vec<usize> = (0..16).filter(|&i| a.pattern[i] == StateId(2)).collect();
            assert!(swapped.len() >= 2);
            // contiguous
            assert_eq!(swapped.last().unwrap() - swapped[0] + 1, swapped.len());
            for i in 0..16 {
                assert_ne!(a.pattern[i], b.pattern[i]);
            }
        }
    }

    #[test]
    fn test_crossover_single_gene_is_noop() {
        let mut rng = ChromosomeRng::new(1);
        let mut a = Chromosome::new(vec![StateId(1)]);
        let mut b = Chromosome::new(vec![StateId(2)]);
        rng.crossover(&mut a, &mut b);
        assert_eq!(a.pattern, vec![StateId(1)]);
    }

    #[test]
    fn test_mutation_rate() {
        let mut rng = ChromosomeRng::new(9);
        let original = Chromosome::new(vec![StateId(1); 1000]);

        let mut c = original.clone();
        rng.mutate(&mut c, 0.0, 3);
        assert_eq!(c, original);

        let mut c = original.clone();
        rng.mutate(&mut c, 1.0, 3);
        assert!(c.pattern.iter().all(|s| s.0 < 3));
        assert!(c.pattern.iter().any(|s| s.is_free()));
        assert!(c.pattern.iter().any(|s| *s == StateId(2)));
    }

    #[test]
    fn test_distinct_pair() {
        let mut rng = ChromosomeRng::new(5);
        for _ in 0..100 {
            let (a, b) = rng.distinct_pair(2);
            assert_ne!(a, b);
            assert!(a < 2 && b < 2);
        }
    }
}
