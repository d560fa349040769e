//! Statistical summaries for evolution progress reporting.
//!
//! The evolution controller condenses every generation's network fitness
//! values into a [`summary::SampleSummary`] so that callers can watch
//! convergence and population diversity without re-deriving the numbers
//! themselves.

pub mod summary;
