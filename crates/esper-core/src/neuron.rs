use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::random::{self, MUTATION_SCALE, WEIGHT_INIT_RANGE};

static NEXT_NEURON_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide identifier of a genetic identity.
///
/// A fresh id is drawn from a monotonic atomic counter at construction and
/// again whenever a genome's weights are mutated, so an id names a *genetic*
/// identity rather than an object: two neurons with the same id carry the
/// same weights (the converse does not hold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct NeuronId(u64);

impl NeuronId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NEURON_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One hidden unit's genome: a weight vector plus fitness bookkeeping.
///
/// The weight vector covers every incoming connection of the unit (inputs
/// plus recurrent feedback, depending on the network variant). Fitness is an
/// accumulator over all the networks the genome participated in during the
/// current generation; [`Neuron::fitness`] normalizes it by the trial count.
#[derive(Debug, Clone)]
pub struct Neuron {
    id: NeuronId,
    parent1: Option<NeuronId>,
    parent2: Option<NeuronId>,
    weights: Vec<f64>,
    fitness: f64,
    trials: u32,
    /// Marker maintained for external lesion analysis; breeding never
    /// consults it.
    pub lesioned: bool,
    /// Transient marker: participated in the most recent trial.
    pub tag: bool,
}

impl Neuron {
    /// Creates a genome with `gene_size` zeroed weights.
    #[must_use]
    pub fn new(gene_size: usize) -> Self {
        Self {
            id: NeuronId::next(),
            parent1: None,
            parent2: None,
            weights: vec![0.0; gene_size],
            fitness: 0.0,
            trials: 0,
            lesioned: false,
            tag: false,
        }
    }

    /// Creates a genome owning the given weight vector.
    #[must_use]
    pub fn from_weights(weights: Vec<f64>) -> Self {
        let mut neuron = Self::new(0);
        neuron.weights = weights;
        neuron
    }

    /// Creates a genome with weights drawn uniformly from the traditional
    /// initial range `[-6, +6]`.
    #[must_use]
    pub fn random<R>(gene_size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut neuron = Self::new(gene_size);
        neuron.randomize(rng);
        neuron
    }

    /// Refills the weights with independent uniform draws from `[-6, +6]` and
    /// resets the fitness accumulator.
    pub fn randomize<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for w in &mut self.weights {
            *w = rng.random_range(-WEIGHT_INIT_RANGE..=WEIGHT_INIT_RANGE);
        }
        self.reset_fitness();
        self.id = NeuronId::next();
    }

    #[must_use]
    pub fn id(&self) -> NeuronId {
        self.id
    }

    /// Ids of the parents this genome was bred from, if any.
    #[must_use]
    pub fn parents(&self) -> (Option<NeuronId>, Option<NeuronId>) {
        (self.parent1, self.parent2)
    }

    pub fn set_parents(&mut self, parent1: Option<NeuronId>, parent2: Option<NeuronId>) {
        self.parent1 = parent1;
        self.parent2 = parent2;
    }

    /// Number of weights (the genome's gene size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns weight `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn weight(&self, i: usize) -> f64 {
        assert!(
            i < self.weights.len(),
            "weight index {i} out of bounds in Neuron::weight"
        );
        self.weights[i]
    }

    /// Overwrites weight `i` and regenerates the id: the genome is now a new
    /// genetic identity.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn set_weight(&mut self, i: usize, w: f64) {
        assert!(
            i < self.weights.len(),
            "weight index {i} out of bounds in Neuron::set_weight"
        );
        self.weights[i] = w;
        self.id = NeuronId::next();
    }

    /// Adds one trial's fitness to the accumulator.
    pub fn add_fitness(&mut self, fitness: f64) {
        self.fitness += fitness;
        self.trials += 1;
    }

    /// Zeroes the fitness accumulator and trial count.
    pub fn reset_fitness(&mut self) {
        self.fitness = 0.0;
        self.trials = 0;
    }

    /// Effective fitness: the accumulator normalized by the trial count, or
    /// the raw accumulator when the genome has not been tried yet.
    #[must_use]
    pub fn fitness(&self) -> f64 {
        if self.trials > 0 {
            self.fitness / f64::from(self.trials)
        } else {
            self.fitness
        }
    }

    /// Un-normalized fitness accumulator.
    #[must_use]
    pub fn fitness_total(&self) -> f64 {
        self.fitness
    }

    /// Number of trials the genome contributed to since the last reset.
    #[must_use]
    pub fn trials(&self) -> u32 {
        self.trials
    }

    /// Inserts a new connection weight of `1.0` at index `i`, growing the
    /// genome by one gene.
    ///
    /// Callers are responsible for keeping all genomes of a sub-population at
    /// equal length.
    ///
    /// # Panics
    ///
    /// Panics if `i` is past the end of the weight vector.
    pub fn add_connection(&mut self, i: usize) {
        assert!(
            i <= self.weights.len(),
            "connection index {i} out of bounds in Neuron::add_connection"
        );
        self.weights.insert(i, 1.0);
    }

    /// Erases the connection weight at index `i`, shrinking the genome by one
    /// gene.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn remove_connection(&mut self, i: usize) {
        assert!(
            i < self.weights.len(),
            "connection index {i} out of bounds in Neuron::remove_connection"
        );
        self.weights.remove(i);
    }

    /// Perturbs one uniformly random gene with Cauchy noise at the standard
    /// mutation scale.
    pub fn mutate<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let i = rng.random_range(0..self.weights.len());
        self.weights[i] += random::rnd_cauchy(rng, MUTATION_SCALE);
        self.id = NeuronId::next();
    }

    /// Rebuilds this genome as a Cauchy perturbation of `other`, resetting
    /// fitness. Used by burst mutation to search the neighbourhood of a
    /// champion genome.
    ///
    /// # Panics
    ///
    /// Panics if the genomes have different gene sizes.
    pub fn perturb_from<R>(&mut self, other: &Neuron, coeff: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        assert_eq!(
            self.weights.len(),
            other.weights.len(),
            "gene size mismatch in Neuron::perturb_from"
        );
        for (w, o) in self.weights.iter_mut().zip(&other.weights) {
            *w = o + random::rnd_cauchy(rng, coeff);
        }
        self.reset_fitness();
        self.id = NeuronId::next();
    }

    /// Returns a fresh genome whose weights are a Cauchy perturbation of this
    /// one.
    #[must_use]
    pub fn perturbed<R>(&self, coeff: f64, rng: &mut R) -> Neuron
    where
        R: Rng + ?Sized,
    {
        let weights = self
            .weights
            .iter()
            .map(|w| w + random::rnd_cauchy(rng, coeff))
            .collect();
        Self::from_weights(weights)
    }
}

/// Two genomes are equal when their weight vectors are equal; ids and fitness
/// bookkeeping are ignored.
impl PartialEq for Neuron {
    fn eq(&self, other: &Self) -> bool {
        self.weights == other.weights
    }
}

#[cfg(test)]
mod tests {
    use crate::random::{CAUCHY_CUT, EspSeed, WEIGHT_INIT_RANGE};

    use super::*;

    #[test]
    fn effective_fitness_normalizes_by_trials() {
        let mut neuron = Neuron::new(3);
        assert_eq!(neuron.fitness(), 0.0);

        neuron.add_fitness(4.0);
        neuron.add_fitness(2.0);
        assert_eq!(neuron.trials(), 2);
        assert_eq!(neuron.fitness_total(), 6.0);
        assert_eq!(neuron.fitness(), 3.0);

        neuron.reset_fitness();
        assert_eq!(neuron.trials(), 0);
        assert_eq!(neuron.fitness(), 0.0);
    }

    #[test]
    fn untried_genome_reports_raw_accumulator() {
        let mut neuron = Neuron::new(1);
        neuron.fitness = 5.0;
        assert_eq!(neuron.fitness(), 5.0);
    }

    #[test]
    fn set_weight_regenerates_the_id() {
        let mut neuron = Neuron::new(2);
        let before = neuron.id();
        neuron.set_weight(1, 0.5);
        assert_ne!(neuron.id(), before);
        assert_eq!(neuron.weight(1), 0.5);
    }

    #[test]
    fn ids_are_process_wide_monotonic() {
        let a = Neuron::new(1);
        let b = Neuron::new(1);
        assert!(b.id() > a.id());
    }

    #[test]
    fn randomize_stays_in_the_initial_range() {
        let mut rng = EspSeed::from_u64(1).rng();
        let neuron = Neuron::random(64, &mut rng);
        for &w in neuron.weights() {
            assert!(w.abs() <= WEIGHT_INIT_RANGE);
        }
    }

    #[test]
    fn connections_grow_and_shrink_the_genome() {
        let mut neuron = Neuron::from_weights(vec![2.0, 3.0]);
        neuron.add_connection(1);
        assert_eq!(neuron.weights(), &[2.0, 1.0, 3.0]);
        neuron.remove_connection(0);
        assert_eq!(neuron.weights(), &[1.0, 3.0]);
    }

    #[test]
    fn mutate_changes_exactly_one_gene() {
        let mut rng = EspSeed::from_u64(11).rng();
        let mut neuron = Neuron::from_weights(vec![1.0, 2.0, 3.0, 4.0]);
        let before = neuron.weights().to_vec();
        neuron.mutate(&mut rng);
        let changed = neuron
            .weights()
            .iter()
            .zip(&before)
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn perturb_from_tracks_the_source_within_the_cut() {
        let mut rng = EspSeed::from_u64(5).rng();
        let source = Neuron::from_weights(vec![1.0, -2.0, 3.0]);
        let mut neuron = Neuron::new(3);
        neuron.add_fitness(9.0);
        neuron.perturb_from(&source, 0.3, &mut rng);

        assert_eq!(neuron.trials(), 0);
        for (w, s) in neuron.weights().iter().zip(source.weights()) {
            assert!((w - s).abs() <= CAUCHY_CUT);
        }
    }

    #[test]
    fn perturbed_returns_a_fresh_nearby_genome() {
        let mut rng = EspSeed::from_u64(6).rng();
        let source = Neuron::from_weights(vec![0.5, -0.5]);
        let clone = source.perturbed(0.3, &mut rng);
        assert_ne!(clone.id(), source.id());
        assert_eq!(clone.trials(), 0);
        for (c, s) in clone.weights().iter().zip(source.weights()) {
            assert!((c - s).abs() <= CAUCHY_CUT);
        }
    }

    #[test]
    fn equality_ignores_fitness_and_ids() {
        let mut a = Neuron::from_weights(vec![1.0, 2.0]);
        let b = Neuron::from_weights(vec![1.0, 2.0]);
        a.add_fitness(10.0);
        assert_eq!(a, b);

        let c = Neuron::from_weights(vec![1.0, 2.5]);
        assert_ne!(a, c);
    }
}
