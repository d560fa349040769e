//! Task environments evaluated by the evolution engine.
//!
//! A task is a black box to the engine: it receives an assembled network,
//! runs one trial, and returns a scalar raw fitness. Everything else -
//! assembly, credit assignment, breeding - happens on the engine side of the
//! [`Task`] boundary, so new control problems plug in without touching the
//! evolutionary machinery.
//!
//! Tasks must be `Send + Sync`: the trial loop may fan evaluations out
//! across worker threads, each activating its own candidate network against
//! a shared task value.

pub use self::cart_pole::CartPole;

mod cart_pole;

use esper_core::Network;

/// A control problem that scores candidate networks.
pub trait Task: Send + Sync {
    /// Human-readable task name, for reports and saved models.
    fn name(&self) -> &str;

    /// Number of sensor values fed to the network each step.
    fn input_dimension(&self) -> usize;

    /// Number of action values read back from the network each step.
    fn output_dimension(&self) -> usize;

    /// Performance threshold meaningful to this task, e.g. the level at
    /// which an incremental task advances. Zero when unused.
    fn tolerance(&self) -> f64 {
        0.0
    }

    /// Whether the task is a staged curriculum that hardens via
    /// [`Self::next_task`] once the current stage is solved.
    fn is_incremental(&self) -> bool {
        false
    }

    /// Runs one trial and returns the raw fitness.
    ///
    /// The engine resets the network's activation before every trial; the
    /// task only drives `activate` and scores the behaviour.
    fn eval_net(&self, net: &mut Network) -> f64;

    /// Whether a raw fitness satisfies the task's success criterion.
    fn solved(&self, _raw_fitness: f64) -> bool {
        false
    }

    /// Advances an incremental task to its next, harder stage.
    fn next_task(&mut self) {}

    /// Relaxes an incremental task after the engine fails to make progress.
    fn simplify_task(&mut self) {}

    /// Scores a network on held-out conditions the engine never trains on.
    /// Tasks without a generalization set return zero.
    fn generalization_test(&self, _net: &mut Network) -> f64 {
        0.0
    }
}
