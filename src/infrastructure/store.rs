//! In-memory communicator.
//!
//! Holds one iteration's requests and results. Results are stored raw and
//! standardized on read with the sign of the response's declared type.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::{Communicator, DomainError, DomainResult, GradientField, ResponseId, ResponseType};

#[derive(Debug, Clone, Default)]
pub struct ResponseStore {
    types: BTreeMap<ResponseId, ResponseType>,
    value_requests: BTreeSet<ResponseId>,
    gradient_requests: BTreeSet<ResponseId>,
    values: BTreeMap<ResponseId, f64>,
    gradients: BTreeMap<ResponseId, GradientField>,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that standardizes responses according to their declared types.
    pub fn with_types(types: BTreeMap<ResponseId, ResponseType>) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    pub fn register_type(&mut self, id: impl Into<ResponseId>, response_type: ResponseType) {
        self.types.insert(id.into(), response_type);
    }

    /// Start a new iteration: drop all requests and results.
    pub fn clear_requests(&mut self) {
        debug!(
            "clear_requests: {} values, {} gradients",
            self.values.len(),
            self.gradients.len()
        );
        self.value_requests.clear();
        self.gradient_requests.clear();
        self.values.clear();
        self.gradients.clear();
    }

    pub fn has_value(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn has_gradient(&self, id: &str) -> bool {
        self.gradients.contains_key(id)
    }

    /// Raw gradient as reported.
    pub fn get_gradient(&self, id: &str) -> DomainResult<&GradientField> {
        self.gradients
            .get(id)
            .ok_or_else(|| DomainError::MissingResponse(id.to_string()))
    }

    pub fn requested_values(&self) -> impl Iterator<Item = &str> {
        self.value_requests.iter().map(String::as_str)
    }

    pub fn requested_gradients(&self) -> impl Iterator<Item = &str> {
        self.gradient_requests.iter().map(String::as_str)
    }

    fn factor(&self, id: &str) -> f64 {
        self.types
            .get(id)
            .map(|t| t.standardization_factor())
            .unwrap_or(1.0)
    }
}

impl Communicator for ResponseStore {
    fn is_value_requested(&self, id: &str) -> bool {
        self.value_requests.contains(id)
    }

    fn is_gradient_requested(&self, id: &str) -> bool {
        self.gradient_requests.contains(id)
    }

    fn request_value(&mut self, id: &str) {
        self.value_requests.insert(id.to_string());
    }

    fn request_gradient(&mut self, id: &str) {
        self.gradient_requests.insert(id.to_string());
    }

    fn report_value(&mut self, id: &str, value: f64) {
        self.values.insert(id.to_string(), value);
    }

    fn report_gradient(&mut self, id: &str, gradient: GradientField) {
        self.gradients.insert(id.to_string(), gradient);
    }

    fn get_value(&self, id: &str) -> DomainResult<f64> {
        self.values
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::MissingResponse(id.to_string()))
    }

    fn get_standardized_value(&self, id: &str) -> DomainResult<f64> {
        Ok(self.factor(id) * self.get_value(id)?)
    }

    fn get_standardized_gradient(&self, id: &str) -> DomainResult<GradientField> {
        let factor = self.factor(id);
        let mut gradient = self.get_gradient(id)?.clone();
        if factor != 1.0 {
            for vector in gradient.values_mut() {
                vector.iter_mut().for_each(|c| *c *= factor);
            }
        }
        Ok(gradient)
    }
}
