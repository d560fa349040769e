//! Plain-text network dumps.
//!
//! The format is line oriented: a numeric variant code, the three layer
//! dimensions, then one line of whitespace-separated weights per hidden
//! unit. Weights are written with shortest round-trip formatting, so a dump
//! reloads to a network whose weights compare equal elementwise.
//!
//! ```text
//! 1
//! 2
//! 3
//! 1
//! 0.5 -1.25 ... (gene_size weights)
//! ...
//! ```

use std::{
    fmt::Write as _,
    fs::File,
    io::{self, BufRead as _, BufReader, Write as _},
    path::Path,
};

use crate::{Network, NetworkKind, Neuron};

/// Failure while writing or reading a network dump.
///
/// Dump failures are recoverable: callers report them and keep evolving.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PersistError {
    /// The underlying file could not be read or written.
    #[display("i/o failure on network dump: {source}")]
    Io { source: io::Error },
    /// The dump's contents do not describe a network.
    #[display("malformed network dump at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl From<io::Error> for PersistError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl Network {
    /// Writes the plain-text dump to `writer`.
    pub fn write_text<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: io::Write,
    {
        writeln!(writer, "{}", self.kind().type_code())?;
        writeln!(writer, "{}", self.num_inputs())?;
        writeln!(writer, "{}", self.num_hidden())?;
        writeln!(writer, "{}", self.num_outputs())?;
        for neuron in self.neurons() {
            let mut line = String::new();
            for (i, w) in neuron.weights().iter().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                // {:?} emits the shortest representation that parses back
                // to the same f64.
                let _ = write!(line, "{w:?}");
            }
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    /// Writes the plain-text dump to a file at `path`.
    pub fn save_text<P>(&self, path: P) -> Result<(), PersistError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::create(path)?;
        self.write_text(&mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Parses a plain-text dump from `reader`.
    pub fn read_text<R>(reader: R) -> Result<Self, PersistError>
    where
        R: io::Read,
    {
        let mut lines = BufReader::new(reader).lines().enumerate();
        let mut next_line = move || -> Result<(usize, String), PersistError> {
            match lines.next() {
                Some((index, line)) => Ok((index + 1, line?)),
                None => Err(PersistError::Malformed {
                    line: 0,
                    reason: "unexpected end of dump".to_owned(),
                }),
            }
        };

        let type_code: u8 = parse_field(next_line()?, "variant code")?;
        let kind =
            NetworkKind::from_type_code(type_code).ok_or_else(|| PersistError::Malformed {
                line: 1,
                reason: format!("unknown variant code {type_code}"),
            })?;
        let num_inputs = parse_field(next_line()?, "input count")?;
        let num_hidden = parse_field(next_line()?, "hidden count")?;
        let num_outputs = parse_field(next_line()?, "output count")?;

        let mut network = Network::new(kind, num_inputs, num_hidden, num_outputs);
        let gene_size = network.gene_size();
        for k in 0..num_hidden {
            let (line_no, line) = next_line()?;
            let weights = line
                .split_whitespace()
                .map(|field| {
                    field.parse().map_err(|_| PersistError::Malformed {
                        line: line_no,
                        reason: format!("invalid weight `{field}`"),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if weights.len() != gene_size {
                return Err(PersistError::Malformed {
                    line: line_no,
                    reason: format!(
                        "expected {gene_size} weights, found {}",
                        weights.len()
                    ),
                });
            }
            network.set_neuron(k, Neuron::from_weights(weights));
        }
        Ok(network)
    }

    /// Loads a plain-text dump from a file at `path`.
    pub fn load_text<P>(path: P) -> Result<Self, PersistError>
    where
        P: AsRef<Path>,
    {
        Self::read_text(File::open(path)?)
    }
}

fn parse_field<T>((line_no, line): (usize, String), what: &str) -> Result<T, PersistError>
where
    T: std::str::FromStr,
{
    line.trim().parse().map_err(|_| PersistError::Malformed {
        line: line_no,
        reason: format!("invalid {what} `{}`", line.trim()),
    })
}

#[cfg(test)]
mod tests {
    use crate::random::EspSeed;

    use super::*;

    #[test]
    fn dump_round_trips_to_an_equal_network() {
        let mut rng = EspSeed::from_u64(21).rng();
        let mut net = Network::new(NetworkKind::Recurrent, 3, 4, 2);
        net.randomize(&mut rng);

        let mut buffer = Vec::new();
        net.write_text(&mut buffer).unwrap();
        let restored = Network::read_text(buffer.as_slice()).unwrap();

        assert_eq!(net, restored);
        assert_eq!(restored.num_inputs(), 3);
        assert_eq!(restored.num_hidden(), 4);
        assert_eq!(restored.num_outputs(), 2);
    }

    #[test]
    fn feed_forward_dump_round_trips() {
        let mut rng = EspSeed::from_u64(22).rng();
        let mut net = Network::new(NetworkKind::FeedForward, 2, 3, 1);
        net.randomize(&mut rng);

        let mut buffer = Vec::new();
        net.write_text(&mut buffer).unwrap();
        assert_eq!(Network::read_text(buffer.as_slice()).unwrap(), net);
    }

    #[test]
    fn unknown_variant_code_is_rejected() {
        let dump = "7\n1\n1\n1\n0.0 0.0\n";
        let err = Network::read_text(dump.as_bytes()).unwrap_err();
        assert!(matches!(err, PersistError::Malformed { line: 1, .. }));
    }

    #[test]
    fn wrong_weight_count_is_rejected() {
        // Recurrent 1-1-1 needs 3 weights per unit.
        let dump = "1\n1\n1\n1\n0.5 0.5\n";
        let err = Network::read_text(dump.as_bytes()).unwrap_err();
        assert!(matches!(err, PersistError::Malformed { line: 5, .. }));
    }

    #[test]
    fn truncated_dump_is_rejected() {
        let dump = "1\n2\n";
        assert!(Network::read_text(dump.as_bytes()).is_err());
    }
}
