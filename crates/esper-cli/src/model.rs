use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use esper_core::NetworkKind;
use serde::Serialize;

/// Saved champion: run metadata plus the full weight matrix, enough to
/// rebuild and re-evaluate the network later.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChampionModel {
    pub task: String,
    pub network: NetworkKind,
    pub trained_at: DateTime<Utc>,
    pub solved: bool,
    pub generations: usize,
    pub evaluations: u64,
    pub fitness: f64,
    pub generalization: f64,
    pub num_inputs: usize,
    pub num_hidden: usize,
    pub num_outputs: usize,
    pub weights: Vec<Vec<f64>>,
}

/// Serializes a value as pretty JSON to `path`, or to stdout when no path is
/// given.
pub(crate) fn save_json<T>(value: &T, path: Option<&Path>) -> anyhow::Result<()>
where
    T: Serialize,
{
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
