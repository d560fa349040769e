//! Recombination operators over neuron genomes and whole networks.
//!
//! Every operator produces two offspring from two parents. Offspring always
//! start as new genetic identities: fresh ids, recorded parent ids, zeroed
//! fitness. Neuron-level operators tolerate parents of different gene sizes
//! where the cut semantics allow it; network-level operators require both
//! parents to share a variant and shape and abort otherwise.

use esper_core::{Network, Neuron};
use rand::Rng;

/// Neuron-level recombination applied by the breeder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display, derive_more::FromStr,
)]
pub enum CrossoverKind {
    /// Swap weight-vector prefixes at one random cut.
    #[default]
    OnePoint,
    /// Pointwise `0.25 / 0.75` blend of both parents.
    Arithmetic,
    /// Pointwise blend with exploration beyond the parent interval.
    Blend,
}

/// Applies the selected neuron-level crossover.
pub fn crossover<R>(kind: CrossoverKind, p1: &Neuron, p2: &Neuron, rng: &mut R) -> (Neuron, Neuron)
where
    R: Rng + ?Sized,
{
    match kind {
        CrossoverKind::OnePoint => crossover_one_point(p1, p2, rng),
        CrossoverKind::Arithmetic => crossover_arithmetic(p1, p2),
        CrossoverKind::Blend => crossover_blend(p1, p2, rng),
    }
}

/// One-point crossover: a cut `c` is drawn uniformly from
/// `[1, min(L1, L2) - 1]` and the children swap prefixes of length `c`.
///
/// Child one keeps `p1`'s prefix and `p2`'s suffix; child two the reverse.
/// Total gene count is preserved even for parents of unequal length.
///
/// # Panics
///
/// Panics if either parent has fewer than two genes; there is no cut to
/// draw.
pub fn crossover_one_point<R>(p1: &Neuron, p2: &Neuron, rng: &mut R) -> (Neuron, Neuron)
where
    R: Rng + ?Sized,
{
    let min_len = p1.len().min(p2.len());
    assert!(
        min_len >= 2,
        "parents too short in operators::crossover_one_point"
    );
    let cut = rng.random_range(1..min_len);

    let mut w1 = p1.weights()[..cut].to_vec();
    w1.extend_from_slice(&p2.weights()[cut..]);
    let mut w2 = p2.weights()[..cut].to_vec();
    w2.extend_from_slice(&p1.weights()[cut..]);

    (offspring(w1, p1, p2), offspring(w2, p1, p2))
}

/// Arithmetic crossover: `c1 = 0.25·p1 + 0.75·p2` and symmetrically for
/// `c2`, pointwise. The children sum to the parents.
///
/// # Panics
///
/// Panics if the parents have different gene sizes.
pub fn crossover_arithmetic(p1: &Neuron, p2: &Neuron) -> (Neuron, Neuron) {
    assert_eq!(
        p1.len(),
        p2.len(),
        "gene size mismatch in operators::crossover_arithmetic"
    );
    let (a, b) = (0.25, 0.75);
    let w1 = p1
        .weights()
        .iter()
        .zip(p2.weights())
        .map(|(x1, x2)| a * x1 + b * x2)
        .collect();
    let w2 = p1
        .weights()
        .iter()
        .zip(p2.weights())
        .map(|(x1, x2)| a * x2 + b * x1)
        .collect();
    (offspring(w1, p1, p2), offspring(w2, p1, p2))
}

/// Blend crossover: for each gene, `c = p1 + (U·(2d + 1) − d)·(p2 − p1)`
/// with `d = 0.4` and an independent uniform draw per gene per child, so
/// offspring can land up to `d` beyond either parent.
///
/// # Panics
///
/// Panics if the parents have different gene sizes.
pub fn crossover_blend<R>(p1: &Neuron, p2: &Neuron, rng: &mut R) -> (Neuron, Neuron)
where
    R: Rng + ?Sized,
{
    assert_eq!(
        p1.len(),
        p2.len(),
        "gene size mismatch in operators::crossover_blend"
    );
    const D: f64 = 0.4;
    let span = 2.0 * D + 1.0;
    let mut blend = |from: f64, toward: f64| from + (span * rng.random::<f64>() - D) * (toward - from);

    let w1 = p1
        .weights()
        .iter()
        .zip(p2.weights())
        .map(|(&x1, &x2)| blend(x1, x2))
        .collect();
    let w2 = p1
        .weights()
        .iter()
        .zip(p2.weights())
        .map(|(&x1, &x2)| blend(x2, x1))
        .collect();
    (offspring(w1, p1, p2), offspring(w2, p1, p2))
}

fn offspring(weights: Vec<f64>, p1: &Neuron, p2: &Neuron) -> Neuron {
    let mut child = Neuron::from_weights(weights);
    child.set_parents(Some(p1.id()), Some(p2.id()));
    child
}

/// Post-crossover mutation: with probability `mutrate`, one Cauchy
/// perturbation of one random gene.
pub fn mutate_offspring<R>(child: &mut Neuron, mutrate: f64, rng: &mut R)
where
    R: Rng + ?Sized,
{
    if rng.random_bool(mutrate) {
        child.mutate(rng);
    }
}

/// Network one-point crossover: one random slot is crossed with
/// [`crossover_one_point`]; all other slots are inherited unchanged from the
/// respective parent.
///
/// # Panics
///
/// Panics if the parents differ in variant or shape.
pub fn crossover_network_one_point<R>(
    p1: &Network,
    p2: &Network,
    rng: &mut R,
) -> (Network, Network)
where
    R: Rng + ?Sized,
{
    assert_same_shape(p1, p2, "operators::crossover_network_one_point");
    let slot = rng.random_range(0..p1.num_hidden());
    let (n1, n2) = crossover_one_point(p1.neuron(slot), p2.neuron(slot), rng);

    let mut c1 = network_offspring(p1, p2);
    let mut c2 = network_offspring(p2, p1);
    c2.set_parents(Some(p1.id()), Some(p2.id()));
    c1.set_neuron(slot, n1);
    c2.set_neuron(slot, n2);
    (c1, c2)
}

/// Network n-point crossover: every slot is crossed independently with
/// [`crossover_one_point`].
///
/// # Panics
///
/// Panics if the parents differ in variant or shape.
pub fn crossover_network_n_point<R>(p1: &Network, p2: &Network, rng: &mut R) -> (Network, Network)
where
    R: Rng + ?Sized,
{
    assert_same_shape(p1, p2, "operators::crossover_network_n_point");
    let mut c1 = network_offspring(p1, p2);
    let mut c2 = network_offspring(p2, p1);
    c2.set_parents(Some(p1.id()), Some(p2.id()));
    for slot in 0..p1.num_hidden() {
        let (n1, n2) = crossover_one_point(p1.neuron(slot), p2.neuron(slot), rng);
        c1.set_neuron(slot, n1);
        c2.set_neuron(slot, n2);
    }
    (c1, c2)
}

/// Network arithmetic crossover: every slot is blended with
/// [`crossover_arithmetic`].
///
/// # Panics
///
/// Panics if the parents differ in variant or shape.
pub fn crossover_network_arithmetic(p1: &Network, p2: &Network) -> (Network, Network) {
    assert_same_shape(p1, p2, "operators::crossover_network_arithmetic");
    let mut c1 = network_offspring(p1, p2);
    let mut c2 = network_offspring(p2, p1);
    c2.set_parents(Some(p1.id()), Some(p2.id()));
    for slot in 0..p1.num_hidden() {
        let (n1, n2) = crossover_arithmetic(p1.neuron(slot), p2.neuron(slot));
        c1.set_neuron(slot, n1);
        c2.set_neuron(slot, n2);
    }
    (c1, c2)
}

fn network_offspring(template: &Network, other: &Network) -> Network {
    let mut child = template.clone();
    child.reset_fitness();
    child.reset_activation();
    child.refresh_id();
    child.set_parents(Some(template.id()), Some(other.id()));
    child
}

fn assert_same_shape(p1: &Network, p2: &Network, operation: &str) {
    assert_eq!(p1.kind(), p2.kind(), "variant mismatch in {operation}");
    assert_eq!(
        p1.num_hidden(),
        p2.num_hidden(),
        "hidden-layer mismatch in {operation}"
    );
    assert_eq!(
        p1.gene_size(),
        p2.gene_size(),
        "gene size mismatch in {operation}"
    );
}

#[cfg(test)]
mod tests {
    use esper_core::{NetworkKind, random::EspSeed};

    use super::*;

    #[test]
    fn one_point_swaps_prefixes_at_the_cut() {
        let mut rng = EspSeed::from_u64(31).rng();
        let p1 = Neuron::from_weights(vec![1.0, 2.0, 3.0, 4.0]);
        let p2 = Neuron::from_weights(vec![10.0, 20.0, 30.0, 40.0]);

        for _ in 0..50 {
            let (c1, c2) = crossover_one_point(&p1, &p2, &mut rng);
            // Recover the cut from child one and check both children agree.
            let cut = c1
                .weights()
                .iter()
                .zip(p1.weights())
                .take_while(|(a, b)| a == b)
                .count();
            assert!((1..4).contains(&cut));
            let mut expected1 = p1.weights()[..cut].to_vec();
            expected1.extend_from_slice(&p2.weights()[cut..]);
            let mut expected2 = p2.weights()[..cut].to_vec();
            expected2.extend_from_slice(&p1.weights()[cut..]);
            assert_eq!(c1.weights(), expected1.as_slice());
            assert_eq!(c2.weights(), expected2.as_slice());
        }
    }

    #[test]
    fn one_point_at_cut_two_produces_the_expected_children() {
        let p1 = Neuron::from_weights(vec![1.0, 2.0, 3.0, 4.0]);
        let p2 = Neuron::from_weights(vec![10.0, 20.0, 30.0, 40.0]);

        // Draw until the cut lands on 2; the children are then fixed.
        let mut rng = EspSeed::from_u64(0).rng();
        loop {
            let (c1, c2) = crossover_one_point(&p1, &p2, &mut rng);
            if c1.weights()[..2] == [1.0, 2.0] && c1.weights()[2] == 30.0 {
                assert_eq!(c1.weights(), &[1.0, 2.0, 30.0, 40.0]);
                assert_eq!(c2.weights(), &[10.0, 20.0, 3.0, 4.0]);
                break;
            }
        }
    }

    #[test]
    fn one_point_preserves_total_gene_count_for_unequal_parents() {
        let mut rng = EspSeed::from_u64(32).rng();
        let p1 = Neuron::from_weights(vec![1.0; 5]);
        let p2 = Neuron::from_weights(vec![2.0; 8]);
        let (c1, c2) = crossover_one_point(&p1, &p2, &mut rng);
        assert_eq!(c1.len() + c2.len(), p1.len() + p2.len());
    }

    #[test]
    fn offspring_are_fresh_identities_with_recorded_parents() {
        let mut rng = EspSeed::from_u64(33).rng();
        let p1 = Neuron::from_weights(vec![1.0, 2.0, 3.0]);
        let p2 = Neuron::from_weights(vec![4.0, 5.0, 6.0]);
        let (c1, c2) = crossover_one_point(&p1, &p2, &mut rng);

        for child in [&c1, &c2] {
            assert_eq!(child.parents(), (Some(p1.id()), Some(p2.id())));
            assert_eq!(child.trials(), 0);
            assert_eq!(child.fitness(), 0.0);
            assert_ne!(child.id(), p1.id());
            assert_ne!(child.id(), p2.id());
        }
    }

    #[test]
    fn arithmetic_blends_at_a_quarter() {
        let p1 = Neuron::from_weights(vec![0.0, 0.0, 0.0]);
        let p2 = Neuron::from_weights(vec![1.0, 1.0, 1.0]);
        let (c1, c2) = crossover_arithmetic(&p1, &p2);
        assert_eq!(c1.weights(), &[0.75, 0.75, 0.75]);
        assert_eq!(c2.weights(), &[0.25, 0.25, 0.25]);
    }

    #[test]
    fn arithmetic_children_sum_to_the_parents() {
        let p1 = Neuron::from_weights(vec![3.0, -1.5, 0.25]);
        let p2 = Neuron::from_weights(vec![-2.0, 4.0, 8.0]);
        let (c1, c2) = crossover_arithmetic(&p1, &p2);
        for i in 0..3 {
            let parents = p1.weight(i) + p2.weight(i);
            let children = c1.weight(i) + c2.weight(i);
            assert!((parents - children).abs() < 1e-12);
        }
    }

    #[test]
    fn blend_stays_within_the_expanded_interval() {
        let mut rng = EspSeed::from_u64(34).rng();
        let p1 = Neuron::from_weights(vec![0.0, 10.0]);
        let p2 = Neuron::from_weights(vec![1.0, -10.0]);
        for _ in 0..100 {
            let (c1, c2) = crossover_blend(&p1, &p2, &mut rng);
            for child in [&c1, &c2] {
                for i in 0..2 {
                    let lo = p1.weight(i).min(p2.weight(i));
                    let hi = p1.weight(i).max(p2.weight(i));
                    let d = 0.4 * (hi - lo);
                    assert!(child.weight(i) >= lo - d - 1e-12);
                    assert!(child.weight(i) <= hi + d + 1e-12);
                }
            }
        }
    }

    #[test]
    fn mutate_offspring_respects_the_rate_extremes() {
        let mut rng = EspSeed::from_u64(35).rng();
        let mut child = Neuron::from_weights(vec![1.0, 2.0]);
        mutate_offspring(&mut child, 0.0, &mut rng);
        assert_eq!(child.weights(), &[1.0, 2.0]);
        mutate_offspring(&mut child, 1.0, &mut rng);
        assert_ne!(child.weights(), &[1.0, 2.0]);
    }

    fn random_network(kind: NetworkKind, seed: u64) -> Network {
        let mut rng = EspSeed::from_u64(seed).rng();
        let mut net = Network::new(kind, 2, 3, 1);
        net.randomize(&mut rng);
        net
    }

    #[test]
    fn network_one_point_crosses_exactly_one_slot() {
        let mut rng = EspSeed::from_u64(36).rng();
        let p1 = random_network(NetworkKind::Recurrent, 1);
        let p2 = random_network(NetworkKind::Recurrent, 2);
        let (c1, c2) = crossover_network_one_point(&p1, &p2, &mut rng);

        let changed1 = (0..3).filter(|&k| c1.neuron(k) != p1.neuron(k)).count();
        let changed2 = (0..3).filter(|&k| c2.neuron(k) != p2.neuron(k)).count();
        assert_eq!(changed1, 1);
        assert_eq!(changed2, 1);
        assert_eq!(c1.parents(), (Some(p1.id()), Some(p2.id())));
        assert_eq!(c1.trials(), 0);
    }

    #[test]
    fn network_arithmetic_blends_every_slot() {
        let p1 = random_network(NetworkKind::FeedForward, 3);
        let p2 = random_network(NetworkKind::FeedForward, 4);
        let (c1, c2) = crossover_network_arithmetic(&p1, &p2);
        for k in 0..3 {
            for i in 0..p1.gene_size() {
                let parents = p1.neuron(k).weight(i) + p2.neuron(k).weight(i);
                let children = c1.neuron(k).weight(i) + c2.neuron(k).weight(i);
                assert!((parents - children).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn network_n_point_crosses_every_slot() {
        let mut rng = EspSeed::from_u64(37).rng();
        let p1 = random_network(NetworkKind::Recurrent, 5);
        let p2 = random_network(NetworkKind::Recurrent, 6);
        let (c1, _c2) = crossover_network_n_point(&p1, &p2, &mut rng);
        for k in 0..3 {
            // Every slot holds a prefix of parent one and a suffix of parent two.
            let prefix = c1
                .neuron(k)
                .weights()
                .iter()
                .zip(p1.neuron(k).weights())
                .take_while(|(a, b)| a == b)
                .count();
            assert!(prefix >= 1);
        }
    }

    #[test]
    #[should_panic(expected = "variant mismatch")]
    fn crossing_different_variants_is_fatal() {
        let p1 = random_network(NetworkKind::FeedForward, 7);
        let p2 = random_network(NetworkKind::Recurrent, 8);
        let _ = crossover_network_arithmetic(&p1, &p2);
    }
}
