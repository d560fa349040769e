//! Enforced Sub-Populations (ESP) neuroevolution.
//!
//! ESP evolves a recurrent neural network controller by coevolving its
//! hidden units: one sub-population of neuron genomes is kept per
//! hidden-unit slot, candidate networks are assembled by drawing one genome
//! from each slot, and a genome's fitness is the average fitness of the
//! networks it served in. Cooperation is therefore selected for directly -
//! a genome only scores well alongside compatible genomes from the other
//! slots.
//!
//! # One generation
//!
//! 1. **Reset** - zero every genome's fitness accumulator
//! 2. **Trials** - assemble and evaluate `10 × M` random networks, folding
//!    each network's fitness back into its constituent genomes
//! 3. **Sort** - order every sub-population by effective fitness
//! 4. **Breed** - the top quartile recombines; offspring overwrite the
//!    ranks below the quartile
//! 5. **Mutate** - Cauchy noise over the bottom half
//! 6. **Stagnation** - burst mutation around the champion when progress
//!    stalls, and adaptive growth or shrinkage of the hidden layer when
//!    bursts stop helping
//!
//! The [`controller`] module drives this cycle; [`operators`] hosts the
//! neuron- and network-level recombination operators it draws from.
//!
//! # Credit assignment
//!
//! After a trial, the network's *accumulated* fitness total is added to
//! every constituent genome and each genome's trial count is incremented.
//! Over a generation a genome therefore accumulates the summed fitness of
//! every network it participated in, normalized by its own trial count -
//! no per-trial bookkeeping of who served where is needed beyond the member
//! indices recorded at assembly.
//!
//! # Determinism
//!
//! All randomness flows from one seeded `Pcg32`. The parallel trial path
//! splits per-worker generators from the master and reduces per-worker
//! trial buffers on the controller thread, so a run is reproducible for a
//! fixed seed and worker count.

pub mod controller;
pub mod operators;
