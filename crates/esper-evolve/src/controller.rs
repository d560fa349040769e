//! The evolution controller: generations, trials, credit assignment,
//! burst mutation, and adaptive topology.
//!
//! [`Esp`] owns one [`SubPopulation`] per hidden-unit slot, the task, and a
//! seeded master generator. [`Esp::evolve_generation`] runs one full cycle
//! and returns a [`GenerationReport`]; [`Esp::run`] loops until the
//! evaluation budget, a stop request, or task success.
//!
//! # Trials and credit
//!
//! Each trial assembles a candidate by drawing one random genome per slot,
//! recording the drawn indices. The evaluator bridge resets the network's
//! activation, runs the task, applies the minimize transform to the stored
//! fitness only, and hands the raw score back. Credit assignment then folds
//! the network's accumulated fitness total into every constituent genome
//! through the recorded indices, so each slot's trial counts sum exactly to
//! the generation's trial count.
//!
//! # Parallel trials
//!
//! With `workers > 1` the trial loop fans out over scoped threads. Workers
//! read the shared sub-populations lock-free (no weight writes happen during
//! the trial phase), count evaluations through an atomic, and buffer their
//! trial records locally; the controller thread reduces the buffers after
//! the rendezvous, which keeps credit assignment single-threaded and the
//! run deterministic for a fixed seed and worker count.
//!
//! # Stagnation
//!
//! When the champion stops improving for `burst_threshold` generations,
//! every pool is rebuilt as Cauchy perturbations of the champion's genome
//! for that slot (burst mutation). When two consecutive bursts fail to help,
//! the hidden layer adapts: a unit is added (a fresh pool at the grown gene
//! size), or - if the previous adaptation was an add that did not help - the
//! worst-ranked slot is removed, never below the variant's minimum.

use std::{
    iter,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
};

use esper_core::{Network, NetworkKind, SubPopulation, random::EspSeed};
use esper_stats::summary::SampleSummary;
use esper_task::Task;
use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::operators::{self, CrossoverKind};

/// Evolution parameters.
#[derive(Debug, Clone)]
pub struct EspConfig {
    /// Network variant assembled for every trial.
    pub network: NetworkKind,
    /// Initial hidden-unit count (and sub-population count).
    pub num_hidden: usize,
    /// Genomes per sub-population.
    pub subpop_size: usize,
    /// Trials per generation; defaults to `10 × subpop_size` so each genome
    /// serves in roughly ten networks.
    pub trials_per_generation: Option<usize>,
    /// Probability of mutating an offspring or bottom-half genome.
    pub mutation_rate: f64,
    /// Stagnant generations tolerated before burst mutation.
    pub burst_threshold: u32,
    /// Neuron-level recombination used by the breeder.
    pub crossover: CrossoverKind,
    /// Treat raw task fitness as a cost: store `1 / (raw + 1)` instead.
    pub minimize: bool,
    /// Evaluation budget; [`Esp::run`] stops once reached.
    pub max_evaluations: u64,
    /// Worker threads for the trial phase; `1` keeps it sequential.
    pub workers: usize,
    /// Master seed; a random seed is drawn when absent.
    pub seed: Option<EspSeed>,
}

impl Default for EspConfig {
    fn default() -> Self {
        Self {
            network: NetworkKind::Recurrent,
            num_hidden: 5,
            subpop_size: 40,
            trials_per_generation: None,
            mutation_rate: 0.4,
            burst_threshold: 10,
            crossover: CrossoverKind::OnePoint,
            minimize: false,
            max_evaluations: 500_000,
            workers: 1,
            seed: None,
        }
    }
}

/// Hidden-layer adaptation performed by a stagnation escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyChange {
    /// A fresh sub-population was appended.
    AddedUnit,
    /// The worst-ranked slot was removed.
    RemovedUnit { slot: usize },
}

/// What one generation did, for progress reporting.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub generation: usize,
    /// Trials actually run (fewer than requested only after a stop request).
    pub trials: usize,
    /// Cumulative network evaluations across the whole run.
    pub evaluations: u64,
    /// Champion effective fitness (stored, maximized form).
    pub best_fitness: f64,
    /// Best raw task fitness seen this generation.
    pub best_raw: f64,
    /// Whether the champion improved this generation.
    pub improved: bool,
    /// Whether the task's success criterion fired.
    pub solved: bool,
    /// Whether an incremental task advanced to its next stage.
    pub advanced_task: bool,
    /// Trials whose raw fitness was not finite and was scored as zero.
    pub failures: usize,
    /// Distribution of network fitness over this generation's trials.
    pub fitness_stats: Option<SampleSummary>,
    /// Whether burst mutation ran.
    pub burst: bool,
    /// Hidden-layer adaptation, if any.
    pub topology: Option<TopologyChange>,
}

/// Summary of a completed [`Esp::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generations: usize,
    pub evaluations: u64,
    pub best_fitness: f64,
    pub solved: bool,
}

struct TrialRecord {
    members: Vec<usize>,
    network: Network,
    raw: f64,
    failed: bool,
}

struct TrialSummary {
    fitnesses: Vec<f64>,
    best_raw: f64,
    solved: bool,
    failures: usize,
}

/// The ESP evolution controller.
pub struct Esp<T> {
    task: T,
    config: EspConfig,
    kind: NetworkKind,
    num_inputs: usize,
    num_outputs: usize,
    subpops: Vec<SubPopulation>,
    rng: Pcg32,
    evaluations: AtomicU64,
    stop: Arc<AtomicBool>,
    best_ever: Option<Network>,
    best_fitness: f64,
    generation: usize,
    stagnation: u32,
    consecutive_bursts: u32,
    failed_adaptations: u32,
    last_topology_change: Option<TopologyChange>,
}

impl<T> Esp<T>
where
    T: Task,
{
    /// Creates a controller with freshly randomized sub-populations.
    ///
    /// The network dimensions come from the task; everything else from the
    /// config.
    pub fn new(task: T, config: EspConfig) -> Self {
        let num_inputs = task.input_dimension();
        let num_outputs = task.output_dimension();
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = seed.rng();
        let gene_size = config
            .network
            .gene_size(num_inputs, config.num_hidden, num_outputs);
        let subpops = (0..config.num_hidden)
            .map(|_| SubPopulation::new(config.subpop_size, gene_size, &mut rng))
            .collect();
        Self {
            kind: config.network,
            num_inputs,
            num_outputs,
            subpops,
            rng,
            evaluations: AtomicU64::new(0),
            stop: Arc::new(AtomicBool::new(false)),
            best_ever: None,
            best_fitness: f64::NEG_INFINITY,
            generation: 0,
            stagnation: 0,
            consecutive_bursts: 0,
            failed_adaptations: 0,
            last_topology_change: None,
            task,
            config,
        }
    }

    #[must_use]
    pub fn task(&self) -> &T {
        &self.task
    }

    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Total network evaluations so far.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn num_hidden(&self) -> usize {
        self.subpops.len()
    }

    #[must_use]
    pub fn subpopulations(&self) -> &[SubPopulation] {
        &self.subpops
    }

    /// The champion: the best assembled network so far, if any trial ran.
    #[must_use]
    pub fn best_network(&self) -> Option<&Network> {
        self.best_ever.as_ref()
    }

    /// Champion effective fitness (stored, maximized form).
    #[must_use]
    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Shared stop flag; setting it ends the run between trials.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Runs generations until the evaluation budget, a stop request, or task
    /// success.
    pub fn run(&mut self) -> RunSummary {
        let mut solved = false;
        while !self.stop.load(Ordering::Relaxed)
            && self.evaluations() < self.config.max_evaluations
        {
            let report = self.evolve_generation();
            if report.solved {
                solved = true;
                break;
            }
        }
        RunSummary {
            generations: self.generation,
            evaluations: self.evaluations(),
            best_fitness: self.best_fitness,
            solved,
        }
    }

    /// Runs one full generation cycle and reports what happened.
    pub fn evolve_generation(&mut self) -> GenerationReport {
        self.generation += 1;
        let previous_best = self.best_fitness;

        for pop in &mut self.subpops {
            pop.eval_reset();
        }

        let num_trials = self
            .config
            .trials_per_generation
            .unwrap_or(10 * self.config.subpop_size);
        let records = self.run_trials(num_trials);
        let trials = records.len();
        let summary = self.apply_trials(records);

        for pop in &mut self.subpops {
            pop.sort_by_fitness();
        }
        self.breed();
        for pop in &mut self.subpops {
            pop.mutate(self.config.mutation_rate, &mut self.rng);
        }

        let improved = self.best_fitness > previous_best;
        let mut burst = false;
        let mut topology = None;
        if improved {
            self.stagnation = 0;
            self.consecutive_bursts = 0;
            self.failed_adaptations = 0;
        } else {
            self.stagnation += 1;
            if self.stagnation >= self.config.burst_threshold {
                self.stagnation = 0;
                if self.consecutive_bursts >= 2 {
                    topology = Some(self.adapt_topology());
                    self.consecutive_bursts = 0;
                } else if self.burst_mutate() {
                    burst = true;
                    self.consecutive_bursts += 1;
                }
            }
        }

        let mut solved = summary.solved;
        let mut advanced_task = false;
        if solved && self.task.is_incremental() {
            // The staged task hardens instead of terminating the run; fitness
            // under the new stage is incomparable, so champion tracking
            // restarts.
            self.task.next_task();
            self.best_ever = None;
            self.best_fitness = f64::NEG_INFINITY;
            self.stagnation = 0;
            self.consecutive_bursts = 0;
            solved = false;
            advanced_task = true;
        }

        GenerationReport {
            generation: self.generation,
            trials,
            evaluations: self.evaluations(),
            best_fitness: self.best_fitness,
            best_raw: summary.best_raw,
            improved,
            solved,
            advanced_task,
            failures: summary.failures,
            fitness_stats: SampleSummary::of(&summary.fitnesses),
            burst,
            topology,
        }
    }

    fn run_trials(&mut self, num_trials: usize) -> Vec<TrialRecord> {
        let workers = self.config.workers.clamp(1, num_trials.max(1));
        if workers <= 1 {
            self.run_trials_sequential(num_trials)
        } else {
            self.run_trials_parallel(num_trials, workers)
        }
    }

    fn run_trials_sequential(&mut self, num_trials: usize) -> Vec<TrialRecord> {
        let mut records = Vec::with_capacity(num_trials);
        for _ in 0..num_trials {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            let (members, mut network) = assemble(
                self.kind,
                self.num_inputs,
                self.num_outputs,
                &self.subpops,
                &mut self.rng,
            );
            let outcome = evaluate_network(
                &self.task,
                &self.evaluations,
                self.config.minimize,
                &mut network,
            );
            records.push(TrialRecord {
                members,
                network,
                raw: outcome.raw,
                failed: outcome.failed,
            });
        }
        records
    }

    fn run_trials_parallel(&mut self, num_trials: usize, workers: usize) -> Vec<TrialRecord> {
        // Split one generator per worker off the master so the fan-out stays
        // reproducible.
        let worker_rngs: Vec<Pcg32> = (0..workers)
            .map(|_| Pcg32::from_rng(&mut self.rng))
            .collect();
        let base = num_trials / workers;
        let extra = num_trials % workers;

        let kind = self.kind;
        let num_inputs = self.num_inputs;
        let num_outputs = self.num_outputs;
        let minimize = self.config.minimize;
        let task = &self.task;
        let evaluations = &self.evaluations;
        let subpops = &self.subpops;
        let stop = &self.stop;

        let mut records = Vec::with_capacity(num_trials);
        thread::scope(|scope| {
            let handles: Vec<_> = worker_rngs
                .into_iter()
                .enumerate()
                .map(|(index, mut rng)| {
                    let count = base + usize::from(index < extra);
                    scope.spawn(move || {
                        let mut local = Vec::with_capacity(count);
                        for _ in 0..count {
                            if stop.load(Ordering::Relaxed) {
                                break;
                            }
                            let (members, mut network) =
                                assemble(kind, num_inputs, num_outputs, subpops, &mut rng);
                            let outcome =
                                evaluate_network(task, evaluations, minimize, &mut network);
                            local.push(TrialRecord {
                                members,
                                network,
                                raw: outcome.raw,
                                failed: outcome.failed,
                            });
                        }
                        local
                    })
                })
                .collect();
            for handle in handles {
                records.extend(handle.join().expect("trial worker panicked"));
            }
        });
        records
    }

    /// Credit assignment and champion tracking over one generation's trial
    /// records. Runs single-threaded regardless of how the trials were
    /// produced.
    fn apply_trials(&mut self, records: Vec<TrialRecord>) -> TrialSummary {
        let mut fitnesses = Vec::with_capacity(records.len());
        let mut best_raw = f64::NEG_INFINITY;
        let mut solved = false;
        let mut failures = 0;

        for record in records {
            let TrialRecord {
                members,
                network,
                raw,
                failed,
            } = record;

            // Fold the network's accumulated total (not one trial's delta)
            // into every constituent genome.
            let credit = network.fitness_total();
            for (pop, &member) in iter::zip(&mut self.subpops, &members) {
                pop.individual_mut(member).add_fitness(credit);
            }
            self.mark_participants(&members);

            fitnesses.push(network.fitness());
            failures += usize::from(failed);
            if raw > best_raw {
                best_raw = raw;
            }
            solved = solved || self.task.solved(raw);

            if network.fitness() > self.best_fitness {
                self.best_fitness = network.fitness();
                self.best_ever = Some(network);
            }
        }

        TrialSummary {
            fitnesses,
            best_raw,
            solved,
            failures,
        }
    }

    fn mark_participants(&mut self, members: &[usize]) {
        for pop in &mut self.subpops {
            pop.clear_tags();
        }
        for (pop, &member) in iter::zip(&mut self.subpops, members) {
            pop.individual_mut(member).tag = true;
        }
    }

    /// Breeding pass over every sub-population: parent A walks the top
    /// quartile rank by rank, parent B is drawn uniformly from the quartile,
    /// and each mating's two offspring overwrite the ranks below the
    /// quartile.
    fn breed(&mut self) {
        let crossover = self.config.crossover;
        let mutrate = self.config.mutation_rate;
        for pop in &mut self.subpops {
            if !pop.evolvable() {
                continue;
            }
            let num_breed = pop.num_breed();
            for i in 0..num_breed {
                let mate = self.rng.random_range(0..num_breed);
                let (mut child1, mut child2) = operators::crossover(
                    crossover,
                    pop.individual(i),
                    pop.individual(mate),
                    &mut self.rng,
                );
                operators::mutate_offspring(&mut child1, mutrate, &mut self.rng);
                operators::mutate_offspring(&mut child2, mutrate, &mut self.rng);
                pop.set_individual(num_breed + 2 * i, child1);
                pop.set_individual(num_breed + 2 * i + 1, child2);
            }
        }
    }

    /// Burst mutation: every pool becomes Cauchy perturbations of the
    /// champion's genome for that slot. A no-op before the first champion
    /// exists.
    fn burst_mutate(&mut self) -> bool {
        let Some(best) = &self.best_ever else {
            return false;
        };
        for (slot, pop) in self.subpops.iter_mut().enumerate() {
            pop.deltify(best.neuron(slot), &mut self.rng);
        }
        true
    }

    fn adapt_topology(&mut self) -> TopologyChange {
        let shrinkable = self.subpops.len() > self.kind.min_units();
        let change = if shrinkable
            && matches!(self.last_topology_change, Some(TopologyChange::AddedUnit))
        {
            // The previous add did not help; try the other direction.
            self.remove_worst_unit()
        } else {
            self.add_unit()
        };
        self.last_topology_change = Some(change);

        if self.task.is_incremental() {
            self.failed_adaptations += 1;
            if self.failed_adaptations >= 2 {
                self.task.simplify_task();
                self.failed_adaptations = 0;
            }
        }
        change
    }

    /// Appends a hidden unit: existing pools (and the champion) grow a `1.0`
    /// weight at the new recurrent locus, and a fresh randomized pool joins
    /// at the new gene size.
    fn add_unit(&mut self) -> TopologyChange {
        let old_hidden = self.subpops.len();
        if self.kind == NetworkKind::Recurrent {
            let locus = self.num_inputs + old_hidden;
            for pop in &mut self.subpops {
                pop.add_connection(locus);
            }
        }
        let gene_size = self
            .kind
            .gene_size(self.num_inputs, old_hidden + 1, self.num_outputs);
        self.subpops.push(SubPopulation::new(
            self.config.subpop_size,
            gene_size,
            &mut self.rng,
        ));
        if let Some(best) = &mut self.best_ever {
            best.add_neuron(&mut self.rng);
        }
        TopologyChange::AddedUnit
    }

    /// Removes the slot whose best genome ranks worst across pools.
    fn remove_worst_unit(&mut self) -> TopologyChange {
        let slot = (0..self.subpops.len())
            .min_by(|&a, &b| {
                self.subpops[a]
                    .best_individual()
                    .fitness()
                    .total_cmp(&self.subpops[b].best_individual().fitness())
            })
            .expect("at least one sub-population");
        self.subpops.remove(slot);
        if self.kind == NetworkKind::Recurrent {
            let locus = self.num_inputs + slot;
            for pop in &mut self.subpops {
                pop.remove_connection(locus);
            }
        }
        if let Some(best) = &mut self.best_ever {
            best.remove_neuron(slot);
        }
        TopologyChange::RemovedUnit { slot }
    }
}

struct EvalOutcome {
    raw: f64,
    failed: bool,
}

/// The evaluator bridge: the single path through which networks acquire
/// fitness.
///
/// Counts the evaluation, resets the recurrent state, runs the task, and
/// stores the (possibly minimize-transformed) fitness on the network. The
/// raw score is returned unaltered; a non-finite score counts as a task
/// failure and is scored as zero.
fn evaluate_network<T>(
    task: &T,
    evaluations: &AtomicU64,
    minimize: bool,
    network: &mut Network,
) -> EvalOutcome
where
    T: Task,
{
    evaluations.fetch_add(1, Ordering::Relaxed);
    network.reset_activation();
    let raw = task.eval_net(network);
    let failed = !raw.is_finite();
    let raw = if failed { 0.0 } else { raw };
    let fitness = if minimize { 1.0 / (raw + 1.0) } else { raw };
    network.record_fitness(fitness);
    EvalOutcome { raw, failed }
}

/// Draws one genome per slot and installs clones into a fresh network,
/// returning the drawn indices for credit assignment.
fn assemble<R>(
    kind: NetworkKind,
    num_inputs: usize,
    num_outputs: usize,
    subpops: &[SubPopulation],
    rng: &mut R,
) -> (Vec<usize>, Network)
where
    R: Rng + ?Sized,
{
    let mut network = Network::new(kind, num_inputs, subpops.len(), num_outputs);
    let members: Vec<usize> = subpops.iter().map(|pop| pop.select_rnd(rng)).collect();
    for (slot, (&member, pop)) in iter::zip(&members, subpops).enumerate() {
        network.set_neuron(slot, pop.individual(member).clone());
    }
    (members, network)
}
