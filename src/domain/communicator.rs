//! Boundary between "what is needed" and "how it is computed".
//!
//! The combiner only ever talks to this trait. Requests are declared first,
//! analyzers then report results, and the combiner reads them back.

use crate::domain::{DomainResult, GradientField};

/// Per-iteration request and result store for named responses.
pub trait Communicator {
    fn is_value_requested(&self, id: &str) -> bool;

    fn is_gradient_requested(&self, id: &str) -> bool;

    fn request_value(&mut self, id: &str);

    fn request_gradient(&mut self, id: &str);

    /// Store a raw (unstandardized) value.
    fn report_value(&mut self, id: &str, value: f64);

    /// Store a raw (unstandardized) gradient field.
    fn report_gradient(&mut self, id: &str, gradient: GradientField);

    /// Raw value as reported.
    ///
    /// # Errors
    /// `MissingResponse` if nothing was reported for `id` this iteration.
    fn get_value(&self, id: &str) -> DomainResult<f64>;

    /// Value in the common sign convention.
    ///
    /// # Errors
    /// `MissingResponse` if nothing was reported for `id` this iteration.
    fn get_standardized_value(&self, id: &str) -> DomainResult<f64>;

    /// Gradient in the common sign convention. Returns an owned copy.
    ///
    /// # Errors
    /// `MissingResponse` if nothing was reported for `id` this iteration.
    fn get_standardized_gradient(&self, id: &str) -> DomainResult<GradientField>;
}
