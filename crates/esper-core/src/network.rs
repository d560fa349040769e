use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::neuron::Neuron;

static NEXT_NETWORK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide identifier of an assembled network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct NetworkId(u64);

impl NetworkId {
    fn next() -> Self {
        Self(NEXT_NETWORK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Activation variant of a network.
///
/// The variant fixes the gene layout of every hidden unit: how many incoming
/// weights a genome carries and what each position connects to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
pub enum NetworkKind {
    /// Hidden units read the inputs only.
    ///
    /// Gene layout: `[input weights | output weights]`,
    /// `gene_size = num_inputs + num_outputs`.
    FeedForward,
    /// Hidden units additionally read the previous activation vector.
    ///
    /// Gene layout: `[input weights | recurrent weights | output weights]`,
    /// `gene_size = num_inputs + num_hidden + num_outputs`.
    Recurrent,
}

impl NetworkKind {
    /// Weight-vector length of a hidden unit under this variant.
    #[must_use]
    pub fn gene_size(self, num_inputs: usize, num_hidden: usize, num_outputs: usize) -> usize {
        match self {
            Self::FeedForward => num_inputs + num_outputs,
            Self::Recurrent => num_inputs + num_hidden + num_outputs,
        }
    }

    /// Floor on the hidden-unit count for this variant.
    #[must_use]
    pub fn min_units(self) -> usize {
        1
    }

    /// Numeric code used by the plain-text dump format.
    #[must_use]
    pub fn type_code(self) -> u8 {
        match self {
            Self::FeedForward => 0,
            Self::Recurrent => 1,
        }
    }

    /// Inverse of [`Self::type_code`].
    #[must_use]
    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::FeedForward),
            1 => Some(Self::Recurrent),
            _ => None,
        }
    }
}

/// An assembled candidate network.
///
/// Owns clones of the hidden-unit genomes installed at assembly, the
/// recurrent activation buffer, and the trial statistics written by the
/// evaluator. The canonical genomes stay in their sub-populations; credit
/// flows back to them through the member indices the assembler records, not
/// through the network.
#[derive(Debug, Clone)]
pub struct Network {
    kind: NetworkKind,
    hidden: Vec<Neuron>,
    activation: Vec<f64>,
    bias: f64,
    num_inputs: usize,
    num_outputs: usize,
    fitness: f64,
    trials: u32,
    id: NetworkId,
    parent1: Option<NetworkId>,
    parent2: Option<NetworkId>,
}

impl Network {
    /// Creates a network of `num_hidden` zero-weight units.
    #[must_use]
    pub fn new(kind: NetworkKind, num_inputs: usize, num_hidden: usize, num_outputs: usize) -> Self {
        let gene_size = kind.gene_size(num_inputs, num_hidden, num_outputs);
        Self {
            kind,
            hidden: (0..num_hidden).map(|_| Neuron::new(gene_size)).collect(),
            activation: vec![0.0; num_hidden],
            bias: 0.0,
            num_inputs,
            num_outputs,
            fitness: 0.0,
            trials: 0,
            id: NetworkId::next(),
            parent1: None,
            parent2: None,
        }
    }

    /// Randomizes every hidden unit's weights.
    pub fn randomize<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for neuron in &mut self.hidden {
            neuron.randomize(rng);
        }
    }

    #[must_use]
    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    #[must_use]
    pub fn num_hidden(&self) -> usize {
        self.hidden.len()
    }

    /// Current weight-vector length of every hidden unit.
    #[must_use]
    pub fn gene_size(&self) -> usize {
        self.kind
            .gene_size(self.num_inputs, self.hidden.len(), self.num_outputs)
    }

    #[must_use]
    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    #[must_use]
    pub fn id(&self) -> NetworkId {
        self.id
    }

    /// Marks this network as a new genetic identity; recombination operators
    /// call this on offspring.
    pub fn refresh_id(&mut self) {
        self.id = NetworkId::next();
    }

    #[must_use]
    pub fn parents(&self) -> (Option<NetworkId>, Option<NetworkId>) {
        (self.parent1, self.parent2)
    }

    pub fn set_parents(&mut self, parent1: Option<NetworkId>, parent2: Option<NetworkId>) {
        self.parent1 = parent1;
        self.parent2 = parent2;
    }

    #[must_use]
    pub fn neurons(&self) -> &[Neuron] {
        &self.hidden
    }

    /// Returns the hidden unit at slot `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is out of range.
    #[must_use]
    pub fn neuron(&self, k: usize) -> &Neuron {
        assert!(
            k < self.hidden.len(),
            "slot {k} out of bounds in Network::neuron"
        );
        &self.hidden[k]
    }

    /// Mutable access to the hidden unit at slot `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is out of range.
    pub fn neuron_mut(&mut self, k: usize) -> &mut Neuron {
        assert!(
            k < self.hidden.len(),
            "slot {k} out of bounds in Network::neuron_mut"
        );
        &mut self.hidden[k]
    }

    /// Installs a genome at slot `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is out of range or the genome's gene size does not match
    /// this network's variant; both are assembly bugs.
    pub fn set_neuron(&mut self, k: usize, neuron: Neuron) {
        assert!(
            k < self.hidden.len(),
            "slot {k} out of bounds in Network::set_neuron"
        );
        assert_eq!(
            neuron.len(),
            self.gene_size(),
            "gene size mismatch in Network::set_neuron"
        );
        self.hidden[k] = neuron;
    }

    /// Records one trial's fitness.
    ///
    /// The evaluator bridge is the only intended caller; it is the single
    /// write path for network fitness.
    pub fn record_fitness(&mut self, fitness: f64) {
        self.fitness += fitness;
        self.trials += 1;
    }

    /// Effective fitness: the accumulator normalized by the trial count, or
    /// the raw accumulator when untried.
    #[must_use]
    pub fn fitness(&self) -> f64 {
        if self.trials > 0 {
            self.fitness / f64::from(self.trials)
        } else {
            self.fitness
        }
    }

    /// Un-normalized fitness accumulator. This is the amount credit
    /// assignment folds into every constituent genome.
    #[must_use]
    pub fn fitness_total(&self) -> f64 {
        self.fitness
    }

    #[must_use]
    pub fn trials(&self) -> u32 {
        self.trials
    }

    pub fn reset_fitness(&mut self) {
        self.fitness = 0.0;
        self.trials = 0;
    }

    /// Current recurrent activation state, one value per hidden unit.
    #[must_use]
    pub fn activation(&self) -> &[f64] {
        &self.activation
    }

    /// Zeroes the recurrent state. Called before every task trial.
    pub fn reset_activation(&mut self) {
        self.activation.fill(0.0);
    }

    /// Propagates one input vector through the network.
    ///
    /// Recurrent variants read the previous activation vector as additional
    /// inputs; the buffer is updated in place.
    ///
    /// # Panics
    ///
    /// Panics if the input or output slice length does not match the
    /// network's dimensions.
    pub fn activate(&mut self, inputs: &[f64], outputs: &mut [f64]) {
        assert_eq!(
            inputs.len(),
            self.num_inputs,
            "input length mismatch in Network::activate"
        );
        assert_eq!(
            outputs.len(),
            self.num_outputs,
            "output length mismatch in Network::activate"
        );
        match self.kind {
            NetworkKind::FeedForward => self.activate_feed_forward(inputs),
            NetworkKind::Recurrent => self.activate_recurrent(inputs),
        }
        let output_base = self.gene_size() - self.num_outputs;
        for (o, out) in outputs.iter_mut().enumerate() {
            let sum = self
                .hidden
                .iter()
                .zip(&self.activation)
                .map(|(neuron, act)| act * neuron.weight(output_base + o))
                .sum();
            *out = sigmoid(sum);
        }
    }

    fn activate_feed_forward(&mut self, inputs: &[f64]) {
        for (neuron, act) in self.hidden.iter().zip(&mut self.activation) {
            let weights = neuron.weights();
            let mut sum = self.bias;
            for (w, x) in weights[..self.num_inputs].iter().zip(inputs) {
                sum += w * x;
            }
            *act = sigmoid(sum);
        }
    }

    fn activate_recurrent(&mut self, inputs: &[f64]) {
        let previous = self.activation.clone();
        for (neuron, act) in self.hidden.iter().zip(&mut self.activation) {
            let weights = neuron.weights();
            let mut sum = self.bias;
            for (w, x) in weights[..self.num_inputs].iter().zip(inputs) {
                sum += w * x;
            }
            for (w, a) in weights[self.num_inputs..].iter().zip(&previous) {
                sum += w * a;
            }
            *act = sigmoid(sum);
        }
    }

    /// Grows the hidden layer by one randomized unit.
    ///
    /// Under the recurrent variant every existing unit gains a `1.0` weight
    /// at the new unit's recurrent locus, so all gene sizes stay consistent.
    pub fn add_neuron<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let old_hidden = self.hidden.len();
        if self.kind == NetworkKind::Recurrent {
            let locus = self.num_inputs + old_hidden;
            for neuron in &mut self.hidden {
                neuron.add_connection(locus);
            }
        }
        let gene_size = self
            .kind
            .gene_size(self.num_inputs, old_hidden + 1, self.num_outputs);
        self.hidden.push(Neuron::random(gene_size, rng));
        self.activation.push(0.0);
    }

    /// Removes the hidden unit at slot `k`.
    ///
    /// Under the recurrent variant the remaining units drop the removed
    /// unit's recurrent weight.
    ///
    /// # Panics
    ///
    /// Panics if `k` is out of range or the network is already at the
    /// variant's minimum unit count.
    pub fn remove_neuron(&mut self, k: usize) {
        assert!(
            k < self.hidden.len(),
            "slot {k} out of bounds in Network::remove_neuron"
        );
        assert!(
            self.hidden.len() > self.kind.min_units(),
            "hidden layer already at minimum size in Network::remove_neuron"
        );
        self.hidden.remove(k);
        self.activation.remove(k);
        if self.kind == NetworkKind::Recurrent {
            let locus = self.num_inputs + k;
            for neuron in &mut self.hidden {
                neuron.remove_connection(locus);
            }
        }
    }
}

/// Two networks are equal when they share a variant, dimensions, and
/// elementwise-equal hidden-unit weights; ids and fitness are ignored.
impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.num_inputs == other.num_inputs
            && self.num_outputs == other.num_outputs
            && self.hidden == other.hidden
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use crate::random::EspSeed;

    use super::*;

    #[test]
    fn gene_size_follows_the_variant() {
        assert_eq!(NetworkKind::FeedForward.gene_size(3, 5, 2), 5);
        assert_eq!(NetworkKind::Recurrent.gene_size(3, 5, 2), 10);
    }

    #[test]
    fn type_codes_round_trip() {
        for kind in [NetworkKind::FeedForward, NetworkKind::Recurrent] {
            assert_eq!(NetworkKind::from_type_code(kind.type_code()), Some(kind));
        }
        assert_eq!(NetworkKind::from_type_code(9), None);
    }

    #[test]
    fn feed_forward_activation_matches_hand_computation() {
        let mut net = Network::new(NetworkKind::FeedForward, 1, 1, 1);
        net.set_neuron(0, Neuron::from_weights(vec![2.0, 3.0]));

        let mut outputs = [0.0];
        net.activate(&[0.5], &mut outputs);

        let hidden = sigmoid(2.0 * 0.5);
        assert!((net.activation()[0] - hidden).abs() < 1e-12);
        assert!((outputs[0] - sigmoid(hidden * 3.0)).abs() < 1e-12);
    }

    #[test]
    fn bias_shifts_every_hidden_unit() {
        let mut net = Network::new(NetworkKind::FeedForward, 1, 1, 1);
        net.set_neuron(0, Neuron::from_weights(vec![0.0, 1.0]));
        net.set_bias(1.5);

        let mut outputs = [0.0];
        net.activate(&[0.0], &mut outputs);
        assert!((net.activation()[0] - sigmoid(1.5)).abs() < 1e-12);
    }

    #[test]
    fn recurrent_state_feeds_back_and_resets() {
        let mut net = Network::new(NetworkKind::Recurrent, 1, 1, 1);
        // [input weight | self-recurrent weight | output weight]
        net.set_neuron(0, Neuron::from_weights(vec![1.0, 4.0, 1.0]));

        let mut outputs = [0.0];
        net.activate(&[1.0], &mut outputs);
        let first = net.activation()[0];
        assert!((first - sigmoid(1.0)).abs() < 1e-12);

        net.activate(&[1.0], &mut outputs);
        let second = net.activation()[0];
        assert!((second - sigmoid(1.0 + 4.0 * first)).abs() < 1e-12);
        assert_ne!(first, second);

        net.reset_activation();
        assert_eq!(net.activation(), &[0.0]);
        net.activate(&[1.0], &mut outputs);
        assert!((net.activation()[0] - first).abs() < 1e-12);
    }

    #[test]
    fn add_neuron_grows_every_gene_under_recurrence() {
        let mut rng = EspSeed::from_u64(8).rng();
        let mut net = Network::new(NetworkKind::Recurrent, 2, 3, 1);
        net.randomize(&mut rng);
        assert_eq!(net.gene_size(), 6);

        net.add_neuron(&mut rng);
        assert_eq!(net.num_hidden(), 4);
        assert_eq!(net.gene_size(), 7);
        for k in 0..3 {
            assert_eq!(net.neuron(k).len(), 7);
            // The grown locus carries the neutral 1.0 weight.
            assert_eq!(net.neuron(k).weight(2 + 3), 1.0);
        }
        assert_eq!(net.neuron(3).len(), 7);
        assert_eq!(net.activation().len(), 4);
    }

    #[test]
    fn remove_neuron_shrinks_every_gene_under_recurrence() {
        let mut rng = EspSeed::from_u64(9).rng();
        let mut net = Network::new(NetworkKind::Recurrent, 2, 3, 1);
        net.randomize(&mut rng);

        net.remove_neuron(1);
        assert_eq!(net.num_hidden(), 2);
        assert_eq!(net.gene_size(), 5);
        for k in 0..2 {
            assert_eq!(net.neuron(k).len(), 5);
        }
    }

    #[test]
    fn remove_neuron_keeps_activation_aligned_with_slots() {
        let mut net = Network::new(NetworkKind::Recurrent, 1, 3, 1);
        // Distinct input weights give each unit a distinguishable activation.
        net.set_neuron(0, Neuron::from_weights(vec![-2.0, 0.0, 0.0, 0.0, 1.0]));
        net.set_neuron(1, Neuron::from_weights(vec![0.0, 0.0, 0.0, 0.0, 1.0]));
        net.set_neuron(2, Neuron::from_weights(vec![2.0, 0.0, 0.0, 0.0, 1.0]));

        let mut outputs = [0.0];
        net.activate(&[1.0], &mut outputs);
        let act_first = net.activation()[0];
        let act_last = net.activation()[2];

        net.remove_neuron(1);
        // Removing a middle slot must shift the state with the units: slot 1
        // now holds the old third unit's state, not the removed unit's.
        assert_eq!(net.activation(), &[act_first, act_last]);
    }

    #[test]
    #[should_panic(expected = "minimum size")]
    fn remove_neuron_respects_the_floor() {
        let mut net = Network::new(NetworkKind::Recurrent, 1, 1, 1);
        net.remove_neuron(0);
    }

    #[test]
    #[should_panic(expected = "gene size mismatch")]
    fn installing_a_mismatched_genome_is_fatal() {
        let mut net = Network::new(NetworkKind::FeedForward, 2, 1, 1);
        net.set_neuron(0, Neuron::from_weights(vec![1.0]));
    }

    #[test]
    fn effective_fitness_normalizes_by_trials() {
        let mut net = Network::new(NetworkKind::FeedForward, 1, 1, 1);
        net.record_fitness(3.0);
        net.record_fitness(5.0);
        assert_eq!(net.trials(), 2);
        assert_eq!(net.fitness_total(), 8.0);
        assert_eq!(net.fitness(), 4.0);
    }

    #[test]
    fn equality_compares_weights_not_bookkeeping() {
        let mut rng = EspSeed::from_u64(10).rng();
        let mut a = Network::new(NetworkKind::Recurrent, 1, 2, 1);
        a.randomize(&mut rng);
        let mut b = a.clone();
        b.record_fitness(7.0);
        b.refresh_id();
        assert_eq!(a, b);

        b.neuron_mut(0).set_weight(0, 42.0);
        assert_ne!(a, b);
    }
}
