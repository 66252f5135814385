//! Peak nodal gradient norm per response, refreshed every iteration.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{
    vector_norm, Communicator, DependencyGraph, DomainError, DomainResult, GradientField,
    ResponseId,
};

/// Last iteration's max gradient norm of every node in the dependency graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormTracker {
    max_norms: BTreeMap<ResponseId, f64>,
}

impl NormTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the norm of every node, parents before children.
    ///
    /// Existing entries are overwritten, never accumulated.
    ///
    /// # Errors
    /// `MissingResponse` if a node has no gradient this iteration,
    /// `EmptyGradient` if its gradient has no points.
    pub fn update<C>(&mut self, graph: &DependencyGraph, communicator: &C) -> DomainResult<()>
    where
        C: Communicator + ?Sized,
    {
        for node in graph.pre_order() {
            let gradient = communicator.get_standardized_gradient(node.id())?;
            let norm = max_nodal_norm(node.id(), &gradient)?;
            debug!("max gradient norm: {} = {}", node.id(), norm);
            self.max_norms.insert(node.id().to_string(), norm);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.max_norms.get(id).copied()
    }

    pub fn max_norms(&self) -> &BTreeMap<ResponseId, f64> {
        &self.max_norms
    }
}

/// Largest Euclidean norm over all points of `gradient`, NaN if any point's
/// norm is NaN.
///
/// # Errors
/// `EmptyGradient` if the field has no points.
pub fn max_nodal_norm(id: &str, gradient: &GradientField) -> DomainResult<f64> {
    let mut norms = gradient.values().map(vector_norm);
    let first = norms
        .next()
        .ok_or_else(|| DomainError::EmptyGradient(id.to_string()))?;

    Ok(norms.fold(first, |max, norm| {
        if max.is_nan() || norm.is_nan() {
            f64::NAN
        } else {
            max.max(norm)
        }
    }))
}
