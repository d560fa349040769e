use std::path::PathBuf;

use anyhow::Context as _;
use esper_core::Network;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ShowArg {
    /// Path to a plain-text network dump
    path: PathBuf,
}

pub(crate) fn run(arg: &ShowArg) -> anyhow::Result<()> {
    let network = Network::load_text(&arg.path)
        .with_context(|| format!("cannot load network dump {}", arg.path.display()))?;

    println!("{} network", network.kind());
    println!(
        "  {} inputs, {} hidden units, {} outputs ({} weights per unit)",
        network.num_inputs(),
        network.num_hidden(),
        network.num_outputs(),
        network.gene_size()
    );
    for (slot, neuron) in network.neurons().iter().enumerate() {
        let weights = neuron
            .weights()
            .iter()
            .map(|w| format!("{w:.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  unit {slot}: {weights}");
    }
    Ok(())
}
