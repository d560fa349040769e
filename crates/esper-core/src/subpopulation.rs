use rand::Rng;

use crate::{
    neuron::{Neuron, NeuronId},
    random::MUTATION_SCALE,
};

/// Fixed-size pool of neuron genomes for one hidden-unit slot.
///
/// Candidate networks draw one genome from each slot's pool, so the pools
/// coevolve: a genome's fitness reflects how well it cooperates with genomes
/// drawn from the *other* slots. After every generation the pool is sorted by
/// effective fitness; the top quartile breeds and the offspring overwrite the
/// ranks below it.
#[derive(Debug, Clone)]
pub struct SubPopulation {
    individuals: Vec<Neuron>,
    num_breed: usize,
    best: usize,
    max_id: Option<NeuronId>,
    evolvable: bool,
}

impl SubPopulation {
    /// Creates a pool of `size` freshly randomized genomes of `gene_size`
    /// weights each.
    ///
    /// The breeding quota defaults to a quarter of the pool. A zero-size pool
    /// is marked non-evolvable.
    #[must_use]
    pub fn new<R>(size: usize, gene_size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let individuals: Vec<_> = (0..size).map(|_| Neuron::random(gene_size, rng)).collect();
        let max_id = individuals.iter().map(Neuron::id).max();
        Self {
            individuals,
            num_breed: size / 4,
            best: 0,
            max_id,
            evolvable: size > 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    #[must_use]
    pub fn individuals(&self) -> &[Neuron] {
        &self.individuals
    }

    /// Returns the genome at rank `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn individual(&self, i: usize) -> &Neuron {
        assert!(
            i < self.individuals.len(),
            "index {i} out of bounds in SubPopulation::individual"
        );
        &self.individuals[i]
    }

    /// Mutable access to the genome at rank `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn individual_mut(&mut self, i: usize) -> &mut Neuron {
        assert!(
            i < self.individuals.len(),
            "index {i} out of bounds in SubPopulation::individual_mut"
        );
        &mut self.individuals[i]
    }

    /// The best-ranked genome. Meaningful only after
    /// [`Self::sort_by_fitness`] has run at least once.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    #[must_use]
    pub fn best_individual(&self) -> &Neuron {
        assert!(
            !self.individuals.is_empty(),
            "empty pool in SubPopulation::best_individual"
        );
        &self.individuals[self.best]
    }

    /// Draws a uniformly random rank, for network assembly and breeding-mate
    /// selection.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    pub fn select_rnd<R>(&self, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        assert!(
            !self.individuals.is_empty(),
            "empty pool in SubPopulation::select_rnd"
        );
        rng.random_range(0..self.individuals.len())
    }

    /// Sorts the pool descending by effective fitness and caches the best
    /// rank.
    ///
    /// The sort is stable: genomes with equal fitness keep their relative
    /// order.
    pub fn sort_by_fitness(&mut self) {
        self.individuals
            .sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
        self.best = 0;
    }

    /// Mutates each genome below the elite-plus-offspring band with
    /// independent probability `mutrate`.
    pub fn mutate<R>(&mut self, mutrate: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for neuron in self.individuals.iter_mut().skip(self.num_breed * 2) {
            if rng.random_bool(mutrate) {
                neuron.mutate(rng);
            }
        }
    }

    /// Burst mutation: rebuilds every genome as a Cauchy perturbation of
    /// `best`, the champion genome for this slot.
    ///
    /// Each call perturbs from `best` itself, never from the previous burst,
    /// so repeated bursts do not drift.
    pub fn deltify<R>(&mut self, best: &Neuron, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for neuron in &mut self.individuals {
            neuron.perturb_from(best, MUTATION_SCALE, rng);
        }
    }

    /// Resets fitness accumulators on every genome, at the start of a
    /// generation's evaluation pass.
    pub fn eval_reset(&mut self) {
        for neuron in &mut self.individuals {
            neuron.reset_fitness();
        }
    }

    /// Clears the participation markers on every genome.
    pub fn clear_tags(&mut self) {
        for neuron in &mut self.individuals {
            neuron.tag = false;
        }
    }

    /// Replaces the genome at rank `i`, keeping the max-id watermark current.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn set_individual(&mut self, i: usize, neuron: Neuron) {
        assert!(
            i < self.individuals.len(),
            "index {i} out of bounds in SubPopulation::set_individual"
        );
        self.admit(neuron.id());
        self.individuals[i] = neuron;
    }

    /// Appends a genome to the pool.
    pub fn push(&mut self, neuron: Neuron) {
        self.admit(neuron.id());
        self.individuals.push(neuron);
    }

    /// Removes and returns the last genome, if any.
    pub fn pop(&mut self) -> Option<Neuron> {
        self.individuals.pop()
    }

    fn admit(&mut self, id: NeuronId) {
        if self.max_id.is_none_or(|max| id > max) {
            self.max_id = Some(id);
        }
    }

    /// Number of top-ranked genomes that breed each generation.
    #[must_use]
    pub fn num_breed(&self) -> usize {
        self.num_breed
    }

    pub fn set_num_breed(&mut self, num_breed: usize) {
        if num_breed > 0 {
            self.num_breed = num_breed;
        }
    }

    /// Highest genome id ever admitted to the pool.
    #[must_use]
    pub fn max_id(&self) -> Option<NeuronId> {
        self.max_id
    }

    /// Whether the pool participates in breeding (fixed at construction).
    #[must_use]
    pub fn evolvable(&self) -> bool {
        self.evolvable
    }

    /// Mean effective fitness across the pool.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn average_fitness(&self) -> f64 {
        assert!(
            !self.individuals.is_empty(),
            "empty pool in SubPopulation::average_fitness"
        );
        let sum: f64 = self.individuals.iter().map(Neuron::fitness).sum();
        sum / self.individuals.len() as f64
    }

    /// Inserts a `1.0` connection weight at `locus` in every genome, after a
    /// hidden unit was added to a recurrent topology.
    pub fn add_connection(&mut self, locus: usize) {
        for neuron in &mut self.individuals {
            neuron.add_connection(locus);
        }
    }

    /// Erases the connection weight at `locus` in every genome, after a
    /// hidden unit was removed from a recurrent topology.
    pub fn remove_connection(&mut self, locus: usize) {
        for neuron in &mut self.individuals {
            neuron.remove_connection(locus);
        }
    }
}
