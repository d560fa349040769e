//! Genetic substrate for Enforced Sub-Populations (ESP) neuroevolution.
//!
//! ESP evolves recurrent neural network controllers at the level of single
//! neurons: one fixed-size pool of neuron genomes is kept per hidden-unit
//! slot, and candidate networks are assembled by drawing one genome from each
//! pool. This crate provides that substrate:
//!
//! - [`Neuron`] - one hidden unit's weight vector plus fitness bookkeeping
//! - [`SubPopulation`] - the fixed-size genome pool for one hidden-unit slot
//! - [`Network`] - an assembled candidate with a variant-specific activation
//!   function ([`NetworkKind`]), recurrent state, and trial statistics
//! - [`random`] - the shared seeded randomness sources (uniform weight
//!   initialization, the truncated Cauchy sampler used by every mutation)
//! - [`persist`] - the plain-text network dump format
//!
//! # Ownership
//!
//! Sub-populations are the sole owners of the canonical genomes. An assembled
//! [`Network`] owns cheap *clones* of the drawn neurons for activation; credit
//! flows back to the canonical genomes through the member indices recorded by
//! the caller at assembly time. A champion snapshot is simply an owned
//! `Network` value. There is no shared-ownership edge between pools and
//! networks anywhere.
//!
//! The breeding loop itself - selection, crossover, burst mutation, trial
//! scheduling - lives in the `esper-evolve` crate.

pub use self::{
    network::{Network, NetworkId, NetworkKind},
    neuron::{Neuron, NeuronId},
    subpopulation::SubPopulation,
};

mod network;
mod neuron;
pub mod persist;
pub mod random;
mod subpopulation;
