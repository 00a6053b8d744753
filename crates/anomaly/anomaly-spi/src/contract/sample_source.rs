//! Sample source trait definition.

use crate::error::Result;

/// Produces one scalar reading per call, e.g. a `SELECT COUNT(*)` query.
///
/// Fetch failures are reported as errors and are never turned into samples.
pub trait SampleSource: Send {
    /// Display name of the source.
    fn name(&self) -> &str;

    /// Fetch the current value.
    fn fetch(&mut self) -> Result<f64>;
}
