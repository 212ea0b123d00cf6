//! Selection strategies.
//!
//! Each strategy builds the next population, of the same size, from the
//! evaluated one. Steady state also recombines, restricted to the weakest
//! chromosomes.

use crate::compute::{CancelToken, Cancelled};
use crate::schema::{EvolutionConfig, SelectionMethod};

use super::chromosome::{Chromosome, ChromosomeRng};

/// Apply the configured selection method.
pub fn select(
    population: &[Chromosome],
    config: &EvolutionConfig,
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<Chromosome>, Cancelled> {
    match config.selection {
        SelectionMethod::RouletteWheel => roulette_wheel(population, rng, cancel),
        SelectionMethod::Rank => rank(population, rng, cancel),
        SelectionMethod::SteadyState => steady_state(
            population,
            config.crossover_rate,
            config.unfit_fraction,
            rng,
            cancel,
        ),
        SelectionMethod::Tournament => {
            tournament(population, config.tournament_win_rate, rng, cancel)
        }
        // elites are protected later, during crossover and mutation
        SelectionMethod::Elitism => Ok(population.to_vec()),
        SelectionMethod::Random => random(population, rng, cancel),
    }
}

/// Fitness-proportional selection with replacement.
pub fn roulette_wheel(
    population: &[Chromosome],
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<Chromosome>, Cancelled> {
    let weights: Vec<f64> = population.iter().map(|c| c.fitness().max(0.0)).collect();
    let picks = spin(&weights, population.len(), rng, cancel)?;
    Ok(picks.into_iter().map(|i| population[i].clone()).collect())
}

/// Selection proportional to rank (1 = worst, n = best).
pub fn rank(
    population: &[Chromosome],
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<Chromosome>, Cancelled> {
    let order = ascending(population);
    let weights: Vec<f64> = (1..=order.len()).map(|r| r as f64).collect();
    let picks = spin(&weights, population.len(), rng, cancel)?;
    Ok(picks
        .into_iter()
        .map(|k| population[order[k]].clone())
        .collect())
}

/// Two distinct contenders; the fitter one wins with probability `win_rate`,
/// otherwise the weaker one is kept.
pub fn tournament(
    population: &[Chromosome],
    win_rate: f64,
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<Chromosome>, Cancelled> {
    let n = population.len();
    if n < 2 {
        return Ok(population.to_vec());
    }

    let mut selected = Vec::with_capacity(n);
    while selected.len() < n {
        cancel.check()?;
        let (a, b) = rng.distinct_pair(n);
        let (fitter, weaker) = if population[b].fitness() > population[a].fitness() {
            (b, a)
        } else {
            (a, b)
        };
        let winner = if rng.chance(win_rate) { fitter } else { weaker };
        selected.push(population[winner].clone());
    }
    Ok(selected)
}

/// Sweep the population including each chromosome with probability one half,
/// until the new population is full.
pub fn random(
    population: &[Chromosome],
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<Chromosome>, Cancelled> {
    let n = population.len();
    let mut selected = Vec::with_capacity(n);
    while selected.len() < n {
        for chromosome in population {
            cancel.check()?;
            if selected.len() == n {
                break;
            }
            if rng.unit() > 0.5 {
                selected.push(chromosome.clone());
            }
        }
    }
    Ok(selected)
}

/// Sort ascending by fitness and recombine adjacent pairs, keeping only the
/// recombinations that involve one of the `unfit_fraction` weakest.
pub fn steady_state(
    population: &[Chromosome],
    crossover_rate: f64,
    unfit_fraction: f64,
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<Chromosome>, Cancelled> {
    let mut sorted: Vec<Chromosome> = ascending(population)
        .into_iter()
        .map(|i| population[i].clone())
        .collect();
    let unfit = unfit_count(sorted.len(), unfit_fraction);

    for (pair, chunk) in sorted.chunks_exact_mut(2).enumerate() {
        cancel.check()?;
        let [a, b] = chunk else { continue };
        if !rng.chance(crossover_rate) {
            continue;
        }
        // the pair's first member is the weaker; pairs past the unfit
        // cut-off are left as they were
        if 2 * pair < unfit {
            rng.crossover(a, b);
        }
    }

    Ok(sorted)
}

/// Size of the unfit group: `ceil(fraction * n)`, at least one.
pub fn unfit_count(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64).ceil() as usize).max(1)
}

/// Indices of the `count` fittest chromosomes, best first. Ties keep the
/// earlier chromosome first.
pub fn elite_indices(population: &[Chromosome], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| population[b].fitness().total_cmp(&population[a].fitness()));
    order.truncate(count);
    order
}

/// Indices sorted by ascending fitness (stable).
fn ascending(population: &[Chromosome]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| population[a].fitness().total_cmp(&population[b].fitness()));
    order
}

/// Draw `count` indices with probability proportional to `weights`.
///
/// Each draw falls in one cumulative interval `(q[i-1], q[i]]`. Falls back
/// to uniform draws when the weights sum to zero.
fn spin(
    weights: &[f64],
    count: usize,
    rng: &mut ChromosomeRng,
    cancel: &CancelToken,
) -> Result<Vec<usize>, Cancelled> {
    let n = weights.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let total: f64 = weights.iter().sum();
    let mut cumulative = Vec::with_capacity(n);
    let mut acc = 0.0;
    for w in weights {
        acc += w / total;
        cumulative.push(acc);
    }

    let mut picks = Vec::with_capacity(count);
    for _ in 0..count {
        cancel.check()?;
        let pick = if total > 0.0 && total.is_finite() {
            let r = rng.unit();
            cumulative.partition_point(|&q| q < r).min(n - 1)
        } else {
            rng.index(n)
        };
        picks.push(pick);
    }
    Ok(picks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChromosomeStats, StateId};

    /// Chromosome `i` has all genes set to `i + 1` and the given fitness.
    fn population(fitness: &[f64]) -> Vec<Chromosome> {
        fitness
            .iter()
            .enumerate()
            .map(|(i, &f)| Chromosome {
                pattern: vec![StateId(i as u16 + 1); 20],
                stats: ChromosomeStats {
                    fitness: f,
                    ..ChromosomeStats::default()
                },
            })
            .collect()
    }

    fn tag(c: &Chromosome) -> u16 {
        c.pattern[0].0 - 1
    }

    #[test]
    fn test_roulette_wheel_prefers_fit() {
        let pop = population(&[1.0, 1.0, 1.0, 97.0]);
        let mut rng = ChromosomeRng::new(3);
        let mut hits = 0;
        for _ in 0..25 {
            let next = roulette_wheel(&pop, &mut rng, &CancelToken::new()).unwrap();
            assert_eq!(next.len(), 4);
            hits += next.iter().filter(|c| tag(c) == 3).count();
        }
        assert!(hits > 85, "fittest chosen {hits} of 100 times");
    }

    #[test]
    fn test_rank_dampens_outliers() {
        let pop = population(&[1.0, 2.0, 3.0, 1000.0]);
        let mut rng = ChromosomeRng::new(8);
        let mut counts = [0usize; 4];
        for _ in 0..500 {
            for c in rank(&pop, &mut rng, &CancelToken::new()).unwrap() {
                counts[tag(&c) as usize] += 1;
            }
        }
        // expected shares 0.1 / 0.2 / 0.3 / 0.4 of 2000 draws
        assert!(counts[3] > 700 && counts[3] < 900, "{counts:?}");
        assert!(counts[0] > 120 && counts[0] < 280, "{counts:?}");
        assert!(counts[0] < counts[1] && counts[1] < counts[2]);
    }

    #[test]
    fn test_tournament_win_rate() {
        let pop = population(&[5.0, 1.0, 3.0]);
        let mut rng = ChromosomeRng::new(4);
        let next = tournament(&pop, 1.0, &mut rng, &CancelToken::new()).unwrap();
        assert_eq!(next.len(), 3);
        assert!(next.iter().all(|c| tag(c) != 1));

        let next = tournament(&pop, 0.0, &mut rng, &CancelToken::new()).unwrap();
        assert!(next.iter().all(|c| tag(c) != 0));
    }

    #[test]
    fn test_random_fills_population() {
        let pop = population(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut rng = ChromosomeRng::new(10);
        let next = random(&pop, &mut rng, &CancelToken::new()).unwrap();
        assert_eq!(next.len(), 5);
    }

    #[test]
    fn test_elitism_passes_through() {
        let pop = population(&[1.0, 2.0, 3.0]);
        let config = EvolutionConfig {
            selection: SelectionMethod::Elitism,
            ..Default::default()
        };
        let next = select(&pop, &config, &mut ChromosomeRng::new(0), &CancelToken::new()).unwrap();
        assert_eq!(next, pop);
    }

    #[test]
    fn test_steady_state_recombines_only_unfit_pairs() {
        let fitness = [9.0, 4.0, 7.0, 0.5, 2.0, 8.0, 6.0, 3.0, 5.0, 1.0];
        let pop = population(&fitness);
        let mut rng = ChromosomeRng::new(2);
        let next = steady_state(&pop, 1.0, 0.1, &mut rng, &CancelToken::new()).unwrap();

        assert_eq!(next.len(), 10);
        let order: Vec<f64> = next.iter().map(|c| c.fitness()).collect();
        assert_eq!(order, vec![0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);

        // the weakest pair is mixed
        assert!(next[0].pattern.iter().any(|s| *s == StateId(10)));
        assert!(next[1].pattern.iter().any(|s| *s == StateId(4)));
        // every other chromosome keeps its genes
        for c in &next[2..] {
            let first = c.pattern[0];
            assert!(c.pattern.iter().all(|s| *s == first));
        }
    }

    #[test]
    fn test_unfit_count() {
        assert_eq!(unfit_count(10, 0.1), 1);
        assert_eq!(unfit_count(11, 0.1), 2);
        assert_eq!(unfit_count(30, 0.1), 3);
        assert_eq!(unfit_count(5, 0.0), 1);
    }

    #[test]
    fn test_elite_indices() {
        let pop = population(&[3.0, 9.0, 1.0, 9.0, 5.0]);
        assert_eq!(elite_indices(&pop, 2), vec![1, 3]);
        assert_eq!(elite_indices(&pop, 3), vec![1, 3, 4]);
        assert_eq!(elite_indices(&pop, 0), Vec::<usize>::new());
    }

    #[test]
    fn test_selection_cancelled() {
        let pop = population(&[1.0, 2.0]);
        let cancel = CancelToken::new();
        cancel.cancel();
        for method in SelectionMethod::ALL {
            if method == SelectionMethod::Elitism {
                continue;
            }
            let config = EvolutionConfig {
                selection: method,
                ..Default::default()
            };
            assert_eq!(
                select(&pop, &config, &mut ChromosomeRng::new(0), &cancel),
                Err(Cancelled)
            );
        }
    }
}
