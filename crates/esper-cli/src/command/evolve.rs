use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use esper_core::{NetworkKind, random::EspSeed};
use esper_evolve::{
    controller::{Esp, EspConfig, GenerationReport, TopologyChange},
    operators::CrossoverKind,
};
use esper_task::{CartPole, Task};

use crate::model::{self, ChampionModel};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
enum TaskKind {
    #[default]
    CartPole,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvolveArg {
    /// Task to evolve a controller for
    #[arg(long, default_value = "cartpole")]
    task: TaskKind,
    /// Network variant
    #[arg(long, default_value = "recurrent")]
    network: NetworkKind,
    /// Initial hidden-unit count
    #[arg(long, default_value_t = 5)]
    hidden: usize,
    /// Genomes per sub-population
    #[arg(long, default_value_t = 40)]
    subpop_size: usize,
    /// Generation limit
    #[arg(long, default_value_t = 200)]
    generations: usize,
    /// Network evaluation budget
    #[arg(long, default_value_t = 500_000)]
    max_evaluations: u64,
    /// Mutation probability for offspring and the bottom half
    #[arg(long, default_value_t = 0.4)]
    mutation_rate: f64,
    /// Stagnant generations tolerated before burst mutation
    #[arg(long, default_value_t = 10)]
    burst_threshold: u32,
    /// Neuron-level crossover operator
    #[arg(long, default_value = "onepoint")]
    crossover: CrossoverKind,
    /// Treat raw task fitness as a cost to minimize
    #[arg(long)]
    minimize: bool,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads for trial evaluation
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// Champion model output path (JSON); stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
    /// Plain-text network dump path
    #[arg(long)]
    dump: Option<PathBuf>,
}

pub(crate) fn run(arg: &EvolveArg) -> anyhow::Result<()> {
    let task = match arg.task {
        TaskKind::CartPole => CartPole::default(),
    };
    let task_name = task.name().to_owned();

    let config = EspConfig {
        network: arg.network,
        num_hidden: arg.hidden,
        subpop_size: arg.subpop_size,
        trials_per_generation: None,
        mutation_rate: arg.mutation_rate,
        burst_threshold: arg.burst_threshold,
        crossover: arg.crossover,
        minimize: arg.minimize,
        max_evaluations: arg.max_evaluations,
        workers: arg.workers,
        seed: arg.seed.map(EspSeed::from_u64),
    };

    eprintln!(
        "Evolving {} controller for {task_name} ({} hidden units, {} genomes per pool)",
        arg.network, arg.hidden, arg.subpop_size
    );

    let mut esp = Esp::new(task, config);
    let mut solved = false;
    for _ in 0..arg.generations {
        let report = esp.evolve_generation();
        print_report(&report);
        if report.solved {
            solved = true;
            break;
        }
        if esp.evaluations() >= arg.max_evaluations {
            eprintln!("Evaluation budget reached.");
            break;
        }
    }

    let mut champion = esp
        .best_network()
        .cloned()
        .context("no champion network was produced")?;

    let generalization = esp.task().generalization_test(&mut champion);
    eprintln!();
    eprintln!("{task_name} evolution completed.");
    eprintln!("  Solved: {solved}");
    eprintln!("  Generations: {}", esp.generation());
    eprintln!("  Evaluations: {}", esp.evaluations());
    eprintln!("  Champion fitness: {:.3}", esp.best_fitness());
    eprintln!("  Generalization: {generalization:.1}");

    let model = ChampionModel {
        task: task_name,
        network: champion.kind(),
        trained_at: Utc::now(),
        solved,
        generations: esp.generation(),
        evaluations: esp.evaluations(),
        fitness: esp.best_fitness(),
        generalization,
        num_inputs: champion.num_inputs(),
        num_hidden: champion.num_hidden(),
        num_outputs: champion.num_outputs(),
        weights: champion
            .neurons()
            .iter()
            .map(|n| n.weights().to_vec())
            .collect(),
    };
    model::save_json(&model, arg.output.as_deref())?;
    if let Some(path) = &arg.output {
        eprintln!("Champion model saved to {}", path.display());
    }

    if let Some(path) = &arg.dump {
        // Dump failures are recoverable: report and keep the results.
        match champion.save_text(path) {
            Ok(()) => eprintln!("Network dump saved to {}", path.display()),
            Err(err) => eprintln!("warning: network dump failed: {err}"),
        }
    }

    Ok(())
}

fn print_report(report: &GenerationReport) {
    eprintln!("Generation #{}:", report.generation);
    eprintln!(
        "  Trials: {} ({} evaluations total)",
        report.trials, report.evaluations
    );
    if let Some(stats) = &report.fitness_stats {
        eprintln!(
            "  Fitness: min {:.3} / mean {:.3} / max {:.3}",
            stats.min, stats.mean, stats.max
        );
    }
    eprintln!(
        "  Champion: {:.3}{}",
        report.best_fitness,
        if report.improved { " (improved)" } else { "" }
    );
    if report.failures > 0 {
        eprintln!("  Failed trials: {}", report.failures);
    }
    if report.burst {
        eprintln!("  Burst mutation around the champion");
    }
    match report.topology {
        Some(TopologyChange::AddedUnit) => eprintln!("  Added a hidden unit"),
        Some(TopologyChange::RemovedUnit { slot }) => {
            eprintln!("  Removed hidden unit {slot}");
        }
        None => {}
    }
    if report.advanced_task {
        eprintln!("  Task advanced to its next stage");
    }
}
